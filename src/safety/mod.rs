// src/safety/mod.rs - Multi-stage safety check over normalized message variants

use log::{debug, error};
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use crate::policy::{PolicyError, PolicyStore};
use crate::types::{BanWordPolicy, CheckResult, CheckStage, Platform};

pub mod matcher;
pub mod normalize;
pub mod substitution;

/// Runs the ordered stage sequence against a message, fetching policy fresh
/// on every call. Usable both for inbound AFK-text validation and for
/// outbound bot replies before transmission.
///
/// `check` never returns an error and never panics: any internal failure is
/// logged and converted to a fail-closed verdict.
pub struct SafetyChecker {
    policy: Arc<dyn PolicyStore>,
}

impl SafetyChecker {
    pub fn new(policy: Arc<dyn PolicyStore>) -> Self {
        Self { policy }
    }

    /// Check a message against the global + channel policy.
    pub async fn check(&self, message: &str, platform: Platform, channel: &str) -> CheckResult {
        let policy = match self.assemble_policy(platform, channel).await {
            Ok(policy) => policy,
            Err(e) => {
                error!(
                    "policy load failed for {}#{}, failing closed: {}",
                    platform, channel, e
                );
                return CheckResult::Failed {
                    stage: None,
                    reason: e.to_string(),
                };
            }
        };

        let replacements = match self.policy.replacement_map().await {
            Ok(map) => map,
            Err(e) => {
                error!("replacement map load failed, failing closed: {}", e);
                return CheckResult::Failed {
                    stage: None,
                    reason: e.to_string(),
                };
            }
        };

        run_stages(message, &policy, &replacements, |_| {})
    }

    async fn assemble_policy(
        &self,
        platform: Platform,
        channel: &str,
    ) -> Result<BanWordPolicy, PolicyError> {
        let mut policy = self.policy.global_ban_words().await?;
        let channel_words = self.policy.channel_ban_words(platform, channel).await?;
        policy.extend_substrings(channel_words);
        Ok(policy)
    }
}

/// Run the 8-stage sequence, short-circuiting on the first violation.
/// `on_stage` is invoked before each stage is evaluated; tests use it to
/// verify the short-circuit.
pub(crate) fn run_stages(
    raw: &str,
    policy: &BanWordPolicy,
    replacements: &HashMap<String, String>,
    mut on_stage: impl FnMut(CheckStage),
) -> CheckResult {
    let lower = raw.to_lowercase();
    let plain = normalize::strip_control_and_spaces(&lower);
    let collapsed = normalize::collapse_repeats(&plain);
    let collapsed_translit = normalize::transliterate_layout(&collapsed);
    let plain_translit = normalize::transliterate_layout(&plain);

    for stage in CheckStage::ALL {
        on_stage(stage);

        let variant = match stage {
            CheckStage::Collapsed | CheckStage::CollapsedReplaced => &collapsed,
            CheckStage::CollapsedTransliterated | CheckStage::CollapsedTransliteratedReplaced => {
                &collapsed_translit
            }
            CheckStage::Plain | CheckStage::PlainReplaced => &plain,
            CheckStage::Transliterated | CheckStage::TransliteratedReplaced => &plain_translit,
        };

        let candidate: Cow<'_, str> = if stage.uses_substitution() {
            match substitution::apply_replacements(variant, replacements) {
                Ok(substituted) => Cow::Owned(substituted),
                Err(e) => {
                    error!(
                        "substitution failed at stage {} (input '{}'): {}",
                        stage,
                        truncate(raw, 80),
                        e
                    );
                    return CheckResult::Failed {
                        stage: Some(stage),
                        reason: e.to_string(),
                    };
                }
            }
        } else {
            Cow::Borrowed(variant.as_str())
        };

        if let Some(word) = matcher::find_ban_word(&candidate, policy) {
            debug!(
                "stage {} flagged '{}' (input '{}')",
                stage,
                word,
                truncate(raw, 80)
            );
            return CheckResult::Violation {
                stage,
                word: word.to_string(),
            };
        }
    }

    CheckResult::Clean
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{BrokenPolicyStore, InMemoryPolicyStore};

    fn policy(substrings: &[&str], exacts: &[&str]) -> BanWordPolicy {
        BanWordPolicy::new(
            substrings.iter().map(|s| s.to_string()).collect(),
            exacts.iter().map(|s| s.to_string()).collect(),
        )
    }

    fn replacements(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    async fn checker_with(
        substrings: &[&str],
        exacts: &[&str],
        map: &[(&str, &str)],
    ) -> SafetyChecker {
        let store = InMemoryPolicyStore::new();
        store.set_global(policy(substrings, exacts)).await;
        store.set_replacements(replacements(map)).await;
        SafetyChecker::new(Arc::new(store))
    }

    #[test_log::test(tokio::test)]
    async fn clean_message_passes_all_stages() {
        let checker = checker_with(&["idiot"], &["kys"], &[("1", "i")]).await;
        let result = checker
            .check("hello world", Platform::Twitch, "chan")
            .await;
        assert_eq!(result, CheckResult::Clean);
        assert!(result.passed());
    }

    #[tokio::test]
    async fn substitution_defeats_obfuscation() {
        let checker = checker_with(&["idiot"], &["kys"], &[("1", "i")]).await;
        let result = checker
            .check("you are an 1diot", Platform::Twitch, "chan")
            .await;
        assert!(!result.passed());
        assert_eq!(result.matched_word(), Some("idiot"));
        match result {
            CheckResult::Violation { stage, .. } => assert!(stage.uses_substitution()),
            other => panic!("expected violation, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn plain_profanity_caught_without_replacements() {
        let checker = checker_with(&["bad"], &[], &[]).await;
        let result = checker.check("bad", Platform::Twitch, "chan").await;
        assert_eq!(result.matched_word(), Some("bad"));
        assert_eq!(result.failed_stage(), Some("1:collapsed"));
    }

    #[tokio::test]
    async fn check_is_case_insensitive() {
        let checker = checker_with(&["badword"], &[], &[]).await;
        for input in ["BADWORD", "badword", "BadWord"] {
            let result = checker.check(input, Platform::Twitch, "chan").await;
            assert!(!result.passed(), "{} should be flagged", input);
            assert_eq!(result.matched_word(), Some("badword"));
        }
    }

    #[tokio::test]
    async fn collapsing_flags_stretched_exact_word() {
        // "baaaaad" never equals the exact entry as typed; the collapsed
        // variant does.
        let checker = checker_with(&[], &["bad"], &[]).await;
        let result = checker.check("baaaaad", Platform::Twitch, "chan").await;
        assert_eq!(result.matched_word(), Some("bad"));
        assert_eq!(result.failed_stage(), Some("1:collapsed"));
    }

    #[tokio::test]
    async fn spaced_out_evasion_is_caught() {
        let checker = checker_with(&["bad"], &[], &[]).await;
        let result = checker.check("b a d", Platform::Twitch, "chan").await;
        assert!(!result.passed());
    }

    #[tokio::test]
    async fn channel_words_extend_global_policy() {
        let store = InMemoryPolicyStore::new();
        store.set_global(policy(&["global"], &[])).await;
        store
            .set_channel_words(Platform::Twitch, "chan", vec!["local".to_string()])
            .await;
        let checker = SafetyChecker::new(Arc::new(store));

        let result = checker.check("very local word", Platform::Twitch, "chan").await;
        assert_eq!(result.matched_word(), Some("local"));

        // A different channel only sees the global policy.
        let result = checker.check("very local word", Platform::Twitch, "other").await;
        assert!(result.passed());
    }

    #[tokio::test]
    async fn policy_load_failure_fails_closed() {
        let checker = SafetyChecker::new(Arc::new(BrokenPolicyStore));
        let result = checker.check("hello", Platform::Twitch, "chan").await;
        assert!(!result.passed());
        assert!(matches!(result, CheckResult::Failed { stage: None, .. }));
    }

    #[test]
    fn transliteration_violation_reports_translit_stage_and_short_circuits() {
        // "ghbdtn" typed on the wrong layout is "привет"; only the
        // transliterated variants can match.
        let policy = policy(&["привет"], &[]);
        let mut evaluated = Vec::new();
        let result = run_stages("ghbdtn", &policy, &HashMap::new(), |s| evaluated.push(s));

        match result {
            CheckResult::Violation { stage, .. } => {
                assert_eq!(stage, CheckStage::CollapsedTransliterated)
            }
            other => panic!("expected violation, got {:?}", other),
        }
        // Stages after the first violation must not be evaluated.
        assert_eq!(
            evaluated,
            vec![
                CheckStage::Collapsed,
                CheckStage::CollapsedReplaced,
                CheckStage::CollapsedTransliterated,
            ]
        );
    }

    #[test]
    fn clean_input_evaluates_all_eight_stages() {
        let policy = policy(&["idiot"], &[]);
        let mut count = 0;
        let result = run_stages("hello", &policy, &HashMap::new(), |_| count += 1);
        assert_eq!(result, CheckResult::Clean);
        assert_eq!(count, 8);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("привет", 3), "при");
        assert_eq!(truncate("ab", 80), "ab");
    }
}
