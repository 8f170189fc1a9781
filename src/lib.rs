//! # Chat Safety and Ingestion Core
//!
//! The moderation-critical core of a multi-platform chat bot: every inbound
//! message is normalized, matched against mutable banned-word policies
//! (global and per-channel), and processed under a per-user gate so that no
//! two concurrent messages from the same user can corrupt shared state.
//!
//! ## Features
//!
//! - **Obfuscation defeat**: duplicate collapsing, space stripping, keyboard
//!   layout transliteration, and a homoglyph/leet-speak replacement map feed
//!   an ordered 8-stage check that short-circuits on the first violation
//! - **Fail-closed safety**: any internal error during a check is logged and
//!   treated as a violation; unfiltered text never passes
//! - **Per-user serialization**: one in-flight processing step per user,
//!   independent users fully parallel, idle lock entries evicted
//! - **AFK lifecycle**: away-state machine with elapsed-time message buckets
//!   and safety-checked welcome-back lines
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chatguard::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let policy = Arc::new(InMemoryPolicyStore::new());
//!     policy
//!         .set_global(BanWordPolicy::new(vec!["idiot".into()], vec!["kys".into()]))
//!         .await;
//!
//!     let checker = Arc::new(SafetyChecker::new(policy));
//!     let result = checker.check("hello world", Platform::Twitch, "mychannel").await;
//!     assert!(result.passed());
//!     Ok(())
//! }
//! ```

pub mod bot;
pub mod config;
pub mod policy;
pub mod safety;
pub mod types;

// Re-export commonly used items
pub mod prelude {
    pub use crate::bot::afk::{
        AfkLifecycle, InMemoryUserProfileStore, StaticTemplates, TemplateSource, UserProfileStore,
    };
    pub use crate::bot::gate::{GateError, UserGate};
    pub use crate::bot::{IngestError, MessageProcessor};
    pub use crate::config::{AfkSettings, CoreConfig, GateSettings};
    pub use crate::policy::{InMemoryPolicyStore, PolicyError, PolicyStore};
    pub use crate::safety::SafetyChecker;
    pub use crate::types::{
        AfkKind, AfkState, BanWordPolicy, ChatMessage, CheckResult, CheckStage, Platform,
    };
    pub use anyhow::Result;
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
