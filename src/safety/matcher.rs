// src/safety/matcher.rs - Banned-word list matching

use crate::types::BanWordPolicy;

/// Test `text` against the assembled policy. Substring entries are checked
/// first (case-insensitive "contains"), then exact entries (case-insensitive
/// equality); the first match wins and is reported. Empty or whitespace-only
/// entries never match.
pub fn find_ban_word<'a>(text: &str, policy: &'a BanWordPolicy) -> Option<&'a str> {
    let haystack = text.to_lowercase();

    for word in &policy.substring_words {
        let trimmed = word.trim();
        if trimmed.is_empty() {
            continue;
        }
        if haystack.contains(&trimmed.to_lowercase()) {
            return Some(word);
        }
    }

    for word in &policy.exact_words {
        let trimmed = word.trim();
        if trimmed.is_empty() {
            continue;
        }
        if haystack == trimmed.to_lowercase() {
            return Some(word);
        }
    }

    None
}
