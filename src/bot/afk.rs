// src/bot/afk.rs - Away-status state machine and welcome-back selection

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::AfkSettings;
use crate::safety::SafetyChecker;
use crate::types::{AfkKind, AfkState, ChatMessage};

/// Errors from the user profile store backing the AFK state.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("profile store unavailable: {0}")]
    Unavailable(String),
}

/// External store owning per-user AFK records.
#[async_trait]
pub trait UserProfileStore: Send + Sync {
    async fn afk_state(&self, user_id: &str) -> Result<Option<AfkState>, ProfileError>;
    async fn set_afk_state(&self, user_id: &str, state: AfkState) -> Result<(), ProfileError>;
}

/// In-memory profile store for tests and the demo binary.
#[derive(Default)]
pub struct InMemoryUserProfileStore {
    states: RwLock<HashMap<String, AfkState>>,
}

impl InMemoryUserProfileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserProfileStore for InMemoryUserProfileStore {
    async fn afk_state(&self, user_id: &str) -> Result<Option<AfkState>, ProfileError> {
        Ok(self.states.read().await.get(user_id).cloned())
    }

    async fn set_afk_state(&self, user_id: &str, state: AfkState) -> Result<(), ProfileError> {
        self.states.write().await.insert(user_id.to_string(), state);
        Ok(())
    }
}

/// Localized template lookup, string-in/string-out. Storage and loading of
/// translations live outside this core.
pub trait TemplateSource: Send + Sync {
    fn template(&self, key: &str) -> Option<String>;
}

/// Fixed template table; enough for tests and the demo binary.
pub struct StaticTemplates {
    templates: HashMap<String, String>,
}

impl StaticTemplates {
    pub fn new(templates: HashMap<String, String>) -> Self {
        Self { templates }
    }
}

impl Default for StaticTemplates {
    fn default() -> Self {
        let mut templates = HashMap::new();
        templates.insert(
            "afk.sleep.8h".to_string(),
            "{user} finally woke up after {duration}: {text}".to_string(),
        );
        templates.insert(
            "afk.poop.1h".to_string(),
            "{user} is back after {duration}. everything alright in there? {text}".to_string(),
        );
        Self { templates }
    }
}

impl TemplateSource for StaticTemplates {
    fn template(&self, key: &str) -> Option<String> {
        self.templates.get(key).cloned()
    }
}

const FALLBACK_TEMPLATE: &str = "{user} is back ({duration} away): {text}";

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;

/// Elapsed-time bucket boundaries per away kind. The largest boundary not
/// exceeding the elapsed time names the template; below the first boundary
/// (or with a skewed negative elapsed) the default "back" key is used.
fn buckets(kind: AfkKind) -> &'static [(i64, &'static str)] {
    match kind {
        AfkKind::Sleep => &[
            (2 * HOUR, "2h"),
            (5 * HOUR, "5h"),
            (8 * HOUR, "8h"),
            (12 * HOUR, "12h"),
            (DAY, "1d"),
            (3 * DAY, "3d"),
            (7 * DAY, "7d"),
            (31 * DAY, "31d"),
            (364 * DAY, "364d"),
        ],
        AfkKind::Poop => &[(MINUTE, "1m"), (HOUR, "1h"), (8 * HOUR, "8h")],
        AfkKind::Afk => &[
            (5 * MINUTE, "5m"),
            (30 * MINUTE, "30m"),
            (HOUR, "1h"),
            (4 * HOUR, "4h"),
            (12 * HOUR, "12h"),
            (DAY, "1d"),
            (7 * DAY, "7d"),
        ],
        AfkKind::Draw => &[
            (30 * MINUTE, "30m"),
            (2 * HOUR, "2h"),
            (6 * HOUR, "6h"),
            (12 * HOUR, "12h"),
        ],
        AfkKind::Rest => &[
            (15 * MINUTE, "15m"),
            (HOUR, "1h"),
            (3 * HOUR, "3h"),
            (8 * HOUR, "8h"),
        ],
        AfkKind::Lurk => &[(HOUR, "1h"), (6 * HOUR, "6h"), (DAY, "1d"), (7 * DAY, "7d")],
        AfkKind::Study => &[
            (30 * MINUTE, "30m"),
            (2 * HOUR, "2h"),
            (4 * HOUR, "4h"),
            (8 * HOUR, "8h"),
            (DAY, "1d"),
        ],
        AfkKind::Shower => &[
            (10 * MINUTE, "10m"),
            (30 * MINUTE, "30m"),
            (HOUR, "1h"),
            (3 * HOUR, "3h"),
        ],
    }
}

/// Template key for an away period of `elapsed_seconds`.
fn template_key(kind: AfkKind, elapsed_seconds: i64) -> String {
    let mut selected = None;
    for (boundary, label) in buckets(kind) {
        if elapsed_seconds >= *boundary {
            selected = Some(*label);
        } else {
            break;
        }
    }
    match selected {
        Some(label) => format!("afk.{}.{}", kind, label),
        None => format!("afk.{}.back", kind),
    }
}

fn format_duration(elapsed_seconds: i64) -> String {
    let secs = elapsed_seconds.max(0);
    if secs >= DAY {
        format!("{}d {}h", secs / DAY, (secs % DAY) / HOUR)
    } else if secs >= HOUR {
        format!("{}h {}m", secs / HOUR, (secs % HOUR) / MINUTE)
    } else if secs >= MINUTE {
        format!("{}m", secs / MINUTE)
    } else {
        format!("{}s", secs)
    }
}

fn render(template: &str, username: &str, elapsed_seconds: i64, afk_text: &str) -> String {
    template
        .replace("{user}", username)
        .replace("{duration}", &format_duration(elapsed_seconds))
        .replace("{text}", afk_text)
        .trim()
        .to_string()
}

/// Tracks users' away periods and produces the one-shot welcome-back line
/// when they return. Invoked from inside the gated ingestion path, so state
/// transitions for a given user are race-free.
pub struct AfkLifecycle {
    profiles: Arc<dyn UserProfileStore>,
    templates: Arc<dyn TemplateSource>,
    checker: Arc<SafetyChecker>,
    settings: AfkSettings,
}

impl AfkLifecycle {
    pub fn new(
        profiles: Arc<dyn UserProfileStore>,
        templates: Arc<dyn TemplateSource>,
        checker: Arc<SafetyChecker>,
        settings: AfkSettings,
    ) -> Self {
        Self {
            profiles,
            templates,
            checker,
            settings,
        }
    }

    /// Mark the user away. Invoked by the external go-away command path.
    pub async fn begin(
        &self,
        user_id: &str,
        kind: AfkKind,
        text: String,
    ) -> Result<(), ProfileError> {
        debug!("user {} going away ({})", user_id, kind);
        self.profiles
            .set_afk_state(user_id, AfkState::new(kind, text, Utc::now()))
            .await
    }

    /// End the away period if the message's author is away.
    ///
    /// Returns the welcome-back line to send, or `None` when the user was not
    /// away or the stored AFK text failed the safety check. The away flag is
    /// cleared in either case; banned content is never echoed back into chat.
    pub async fn resume_on_message(
        &self,
        message: &ChatMessage,
    ) -> Result<Option<String>, ProfileError> {
        let Some(mut state) = self.profiles.afk_state(&message.user_id).await? else {
            return Ok(None);
        };
        if !state.is_away() {
            return Ok(None);
        }

        let now = Utc::now();
        let elapsed_seconds = (now - state.since).num_seconds();
        let verdict = self
            .checker
            .check(&state.text, message.platform, &message.channel)
            .await;

        let reply = if verdict.passed() {
            let key = template_key(state.kind, elapsed_seconds);
            let template = self
                .templates
                .template(&key)
                .unwrap_or_else(|| FALLBACK_TEMPLATE.to_string());
            Some(render(
                &template,
                &message.username,
                elapsed_seconds,
                &state.text,
            ))
        } else {
            warn!(
                "suppressing welcome-back for {}: stored afk text flagged at stage {:?}",
                message.username,
                verdict.failed_stage()
            );
            None
        };

        state.returned_at = Some(now);
        state.resume_count = 0;
        self.profiles.set_afk_state(&message.user_id, state).await?;
        Ok(reply)
    }

    /// Re-enter the most recently ended away period. Invoked by the external
    /// resume command path.
    ///
    /// Returns `true` when the user was put back away. A user with no AFK
    /// record, one who is still away, or one who has already resumed
    /// `max_resume_count` times since last going away is left untouched.
    pub async fn resume_away(&self, user_id: &str) -> Result<bool, ProfileError> {
        let Some(mut state) = self.profiles.afk_state(user_id).await? else {
            return Ok(false);
        };
        if state.is_away() {
            return Ok(false);
        }
        if state.resume_count >= self.settings.max_resume_count {
            debug!(
                "user {} hit the resume cap ({}), not re-entering away state",
                user_id, self.settings.max_resume_count
            );
            return Ok(false);
        }

        state.resume_count += 1;
        state.returned_at = None;
        self.profiles.set_afk_state(user_id, state).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::InMemoryPolicyStore;
    use crate::types::{BanWordPolicy, Platform};

    fn message(user_id: &str) -> ChatMessage {
        ChatMessage {
            platform: Platform::Twitch,
            channel: "chan".to_string(),
            user_id: user_id.to_string(),
            username: "alice".to_string(),
            content: "hi".to_string(),
            timestamp: Utc::now(),
        }
    }

    async fn lifecycle_with_banned(substrings: &[&str]) -> AfkLifecycle {
        let store = InMemoryPolicyStore::new();
        store
            .set_global(BanWordPolicy::new(
                substrings.iter().map(|s| s.to_string()).collect(),
                vec![],
            ))
            .await;
        AfkLifecycle::new(
            Arc::new(InMemoryUserProfileStore::new()),
            Arc::new(StaticTemplates::default()),
            Arc::new(SafetyChecker::new(Arc::new(store))),
            AfkSettings::default(),
        )
    }

    #[test]
    fn sleep_buckets_follow_boundaries() {
        assert_eq!(template_key(AfkKind::Sleep, HOUR), "afk.sleep.back");
        assert_eq!(template_key(AfkKind::Sleep, 2 * HOUR), "afk.sleep.2h");
        assert_eq!(template_key(AfkKind::Sleep, 6 * HOUR), "afk.sleep.5h");
        assert_eq!(template_key(AfkKind::Sleep, 400 * DAY), "afk.sleep.364d");
    }

    #[test]
    fn poop_buckets_follow_boundaries() {
        assert_eq!(template_key(AfkKind::Poop, 30), "afk.poop.back");
        assert_eq!(template_key(AfkKind::Poop, 90), "afk.poop.1m");
        assert_eq!(template_key(AfkKind::Poop, 2 * HOUR), "afk.poop.1h");
        assert_eq!(template_key(AfkKind::Poop, 9 * HOUR), "afk.poop.8h");
    }

    #[test]
    fn negative_elapsed_falls_back_to_default_key() {
        // Clock skew must never error out.
        assert_eq!(template_key(AfkKind::Sleep, -100), "afk.sleep.back");
        assert_eq!(format_duration(-100), "0s");
    }

    #[test]
    fn duration_formatting() {
        assert_eq!(format_duration(42), "42s");
        assert_eq!(format_duration(5 * MINUTE), "5m");
        assert_eq!(format_duration(2 * HOUR + 12 * MINUTE), "2h 12m");
        assert_eq!(format_duration(3 * DAY + 4 * HOUR), "3d 4h");
    }

    #[test]
    fn render_fills_placeholders() {
        let line = render(FALLBACK_TEMPLATE, "alice", 90, "brb tea");
        assert_eq!(line, "alice is back (1m away): brb tea");
    }

    #[tokio::test]
    async fn resume_returns_welcome_back_and_clears_flag() {
        let lifecycle = lifecycle_with_banned(&["idiot"]).await;
        lifecycle
            .begin("u1", AfkKind::Afk, "making tea".to_string())
            .await
            .unwrap();

        let reply = lifecycle.resume_on_message(&message("u1")).await.unwrap();
        let line = reply.expect("clean afk text should produce a welcome-back");
        assert!(line.contains("alice"));
        assert!(line.contains("making tea"));

        // Second message: no longer away, no second welcome-back.
        let reply = lifecycle.resume_on_message(&message("u1")).await.unwrap();
        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn banned_afk_text_is_suppressed_but_flag_still_clears() {
        let lifecycle = lifecycle_with_banned(&["idiot"]).await;
        lifecycle
            .begin("u2", AfkKind::Afk, "bye idiot chat".to_string())
            .await
            .unwrap();

        let reply = lifecycle.resume_on_message(&message("u2")).await.unwrap();
        assert!(reply.is_none(), "banned afk text must not be echoed");

        // Flag was still cleared.
        let reply = lifecycle.resume_on_message(&message("u2")).await.unwrap();
        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn message_from_active_user_is_ignored() {
        let lifecycle = lifecycle_with_banned(&[]).await;
        let reply = lifecycle.resume_on_message(&message("nobody")).await.unwrap();
        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn resume_away_re_enters_until_cap() {
        let lifecycle = lifecycle_with_banned(&[]).await;
        lifecycle
            .begin("u1", AfkKind::Afk, "brb".to_string())
            .await
            .unwrap();

        // Still away: nothing to resume.
        assert!(!lifecycle.resume_away("u1").await.unwrap());

        // Return, resume, return, resume... until the configured cap.
        let cap = AfkSettings::default().max_resume_count;
        for _ in 0..cap {
            lifecycle.resume_on_message(&message("u1")).await.unwrap();
            assert!(lifecycle.resume_away("u1").await.unwrap());
        }

        // resume_on_message resets the counter, so exhaust it without
        // intervening returns.
        lifecycle.resume_on_message(&message("u1")).await.unwrap();
        let profiles = Arc::clone(&lifecycle.profiles);
        let mut state = profiles.afk_state("u1").await.unwrap().unwrap();
        state.resume_count = cap;
        profiles.set_afk_state("u1", state).await.unwrap();

        assert!(!lifecycle.resume_away("u1").await.unwrap());
    }

    #[tokio::test]
    async fn resume_away_increments_counter_and_restores_away_flag() {
        let lifecycle = lifecycle_with_banned(&[]).await;
        let profiles = Arc::clone(&lifecycle.profiles);
        lifecycle
            .begin("u1", AfkKind::Study, "homework".to_string())
            .await
            .unwrap();
        lifecycle.resume_on_message(&message("u1")).await.unwrap();

        assert!(lifecycle.resume_away("u1").await.unwrap());
        let state = profiles.afk_state("u1").await.unwrap().unwrap();
        assert!(state.is_away());
        assert_eq!(state.resume_count, 1);

        // The next message produces a welcome-back again.
        let reply = lifecycle.resume_on_message(&message("u1")).await.unwrap();
        assert!(reply.unwrap().contains("homework"));
    }

    #[tokio::test]
    async fn resume_away_without_record_is_a_no_op() {
        let lifecycle = lifecycle_with_banned(&[]).await;
        assert!(!lifecycle.resume_away("nobody").await.unwrap());
    }

    #[tokio::test]
    async fn resume_count_resets_on_return() {
        let lifecycle = lifecycle_with_banned(&[]).await;
        let profiles = Arc::clone(&lifecycle.profiles);
        lifecycle
            .begin("u1", AfkKind::Lurk, "lurking".to_string())
            .await
            .unwrap();

        // Simulate the external resume command having bumped the counter.
        let mut state = profiles.afk_state("u1").await.unwrap().unwrap();
        state.resume_count = 2;
        profiles.set_afk_state("u1", state).await.unwrap();

        lifecycle.resume_on_message(&message("u1")).await.unwrap();
        let state = profiles.afk_state("u1").await.unwrap().unwrap();
        assert_eq!(state.resume_count, 0);
        assert!(state.returned_at.is_some());
    }
}
