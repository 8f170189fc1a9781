// src/bot/mod.rs - Gated message ingestion pipeline

use log::warn;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::safety::SafetyChecker;
use crate::types::{ChatMessage, CheckResult, Platform};

pub mod afk;
pub mod gate;

use afk::{AfkLifecycle, ProfileError};
use gate::{GateError, UserGate};

/// Errors from a single ingestion step. Lock failures and profile-store
/// failures are surfaced so the caller knows the message was not processed;
/// content-safety failures never appear here (they fail closed inside the
/// checker).
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error(transparent)]
    Gate(#[from] GateError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
}

/// Best-effort pipeline counters, incremented outside any lock with relaxed
/// ordering. Statistics, not correctness.
#[derive(Default)]
pub struct IngestStats {
    messages_processed: AtomicU64,
    welcome_backs: AtomicU64,
    outbound_blocked: AtomicU64,
}

impl IngestStats {
    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "messages_processed": self.messages_processed.load(Ordering::Relaxed),
            "welcome_backs": self.welcome_backs.load(Ordering::Relaxed),
            "outbound_blocked": self.outbound_blocked.load(Ordering::Relaxed),
        })
    }
}

/// Entry point for inbound messages: serializes per-user processing through
/// the gate, runs the AFK resume check inside the lock, and offers the safety
/// gate for outbound bot replies.
pub struct MessageProcessor {
    gate: Arc<UserGate>,
    afk: Arc<AfkLifecycle>,
    checker: Arc<SafetyChecker>,
    stats: IngestStats,
}

impl MessageProcessor {
    pub fn new(gate: Arc<UserGate>, afk: Arc<AfkLifecycle>, checker: Arc<SafetyChecker>) -> Self {
        Self {
            gate,
            afk,
            checker,
            stats: IngestStats::default(),
        }
    }

    /// Process one inbound message under the author's gate.
    ///
    /// Returns the welcome-back line to send, if the author was away and the
    /// stored AFK text passed the safety check.
    pub async fn process_message(
        &self,
        message: &ChatMessage,
    ) -> Result<Option<String>, IngestError> {
        let afk = Arc::clone(&self.afk);
        let resume = self
            .gate
            .with_user_lock(&message.user_id, || async move {
                afk.resume_on_message(message).await
            })
            .await?;
        let reply = resume?;

        self.stats.messages_processed.fetch_add(1, Ordering::Relaxed);
        if reply.is_some() {
            self.stats.welcome_backs.fetch_add(1, Ordering::Relaxed);
        }
        Ok(reply)
    }

    /// Safety-gate an outbound bot reply before transmission. Callers drop
    /// the reply on a non-passing verdict; nothing is partially redacted.
    pub async fn check_outbound(
        &self,
        text: &str,
        platform: Platform,
        channel: &str,
    ) -> CheckResult {
        let result = self.checker.check(text, platform, channel).await;
        if !result.passed() {
            warn!(
                "outbound reply blocked for {}#{} at stage {:?}",
                platform,
                channel,
                result.failed_stage()
            );
            self.stats.outbound_blocked.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    pub fn gate(&self) -> &Arc<UserGate> {
        &self.gate
    }

    pub fn afk(&self) -> &Arc<AfkLifecycle> {
        &self.afk
    }
}
