// src/types/mod.rs - Core data types shared across the safety and ingestion pipeline

use serde::{Deserialize, Serialize};

/// Chat platform a message originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Twitch,
    Discord,
    Telegram,
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Platform::Twitch => "twitch",
            Platform::Discord => "discord",
            Platform::Telegram => "telegram",
        };
        write!(f, "{}", name)
    }
}

/// Inbound message as consumed by the ingestion pipeline.
///
/// Platform wrappers deliver these; everything this core needs is a stable
/// user id for serialization and the raw content for the safety checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub platform: Platform,
    pub channel: String,
    pub user_id: String,
    pub username: String,
    pub content: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Banned-word policy assembled per check call.
///
/// `substring_words` match as case-insensitive "contains"; `exact_words`
/// only match when the whole text equals the entry. Empty or
/// whitespace-only entries never match.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BanWordPolicy {
    pub substring_words: Vec<String>,
    pub exact_words: Vec<String>,
}

impl BanWordPolicy {
    pub fn new(substring_words: Vec<String>, exact_words: Vec<String>) -> Self {
        Self {
            substring_words,
            exact_words,
        }
    }

    /// Append channel-specific substring entries onto the global policy.
    pub fn extend_substrings(&mut self, extra: Vec<String>) {
        self.substring_words.extend(extra);
    }
}

/// One (normalization variant, substitution on/off) combination evaluated by
/// the checker, in evaluation order. Cheap variants come first so obvious
/// profanity fails fast; transliterated and substituted variants catch the
/// rarer evasion patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckStage {
    Collapsed,
    CollapsedReplaced,
    CollapsedTransliterated,
    CollapsedTransliteratedReplaced,
    Plain,
    PlainReplaced,
    Transliterated,
    TransliteratedReplaced,
}

impl CheckStage {
    /// All stages in evaluation order.
    pub const ALL: [CheckStage; 8] = [
        CheckStage::Collapsed,
        CheckStage::CollapsedReplaced,
        CheckStage::CollapsedTransliterated,
        CheckStage::CollapsedTransliteratedReplaced,
        CheckStage::Plain,
        CheckStage::PlainReplaced,
        CheckStage::Transliterated,
        CheckStage::TransliteratedReplaced,
    ];

    /// Whether this stage runs the replacement substitutor before matching.
    pub fn uses_substitution(&self) -> bool {
        matches!(
            self,
            CheckStage::CollapsedReplaced
                | CheckStage::CollapsedTransliteratedReplaced
                | CheckStage::PlainReplaced
                | CheckStage::TransliteratedReplaced
        )
    }

    /// Stable diagnostic label, ordinal first.
    pub fn label(&self) -> &'static str {
        match self {
            CheckStage::Collapsed => "1:collapsed",
            CheckStage::CollapsedReplaced => "2:collapsed+replace",
            CheckStage::CollapsedTransliterated => "3:collapsed+translit",
            CheckStage::CollapsedTransliteratedReplaced => "4:collapsed+translit+replace",
            CheckStage::Plain => "5:plain",
            CheckStage::PlainReplaced => "6:plain+replace",
            CheckStage::Transliterated => "7:translit",
            CheckStage::TransliteratedReplaced => "8:translit+replace",
        }
    }
}

impl std::fmt::Display for CheckStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of a safety check. Created fresh per call, never persisted.
///
/// `Failed` means an internal error was converted to a fail-closed verdict;
/// callers can distinguish it from a genuine content violation without
/// relying on unwinding.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckResult {
    Clean,
    Violation { stage: CheckStage, word: String },
    Failed { stage: Option<CheckStage>, reason: String },
}

impl CheckResult {
    /// True only when every stage passed.
    pub fn passed(&self) -> bool {
        matches!(self, CheckResult::Clean)
    }

    /// Diagnostic label of the stage that stopped the check, if any.
    pub fn failed_stage(&self) -> Option<&'static str> {
        match self {
            CheckResult::Clean => None,
            CheckResult::Violation { stage, .. } => Some(stage.label()),
            CheckResult::Failed { stage, .. } => stage.map(|s| s.label()),
        }
    }

    /// The banned word that matched, if the check found one.
    pub fn matched_word(&self) -> Option<&str> {
        match self {
            CheckResult::Violation { word, .. } => Some(word.as_str()),
            _ => None,
        }
    }
}

/// Category of an away period; selects the welcome-back message table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AfkKind {
    Draw,
    Afk,
    Sleep,
    Rest,
    Lurk,
    Study,
    Poop,
    Shower,
}

impl AfkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AfkKind::Draw => "draw",
            AfkKind::Afk => "afk",
            AfkKind::Sleep => "sleep",
            AfkKind::Rest => "rest",
            AfkKind::Lurk => "lurk",
            AfkKind::Study => "study",
            AfkKind::Poop => "poop",
            AfkKind::Shower => "shower",
        }
    }
}

impl std::fmt::Display for AfkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Away-state record owned by the user profile store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AfkState {
    pub kind: AfkKind,
    /// Text the user left when going away; validated before being echoed back.
    pub text: String,
    pub since: chrono::DateTime<chrono::Utc>,
    /// How many times the user resumed this away period from a short
    /// interruption. Reset on return.
    pub resume_count: u32,
    /// Set once the user has come back; `None` while still away.
    pub returned_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl AfkState {
    pub fn new(kind: AfkKind, text: String, since: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            kind,
            text,
            since,
            resume_count: 0,
            returned_at: None,
        }
    }

    pub fn is_away(&self) -> bool {
        self.returned_at.is_none()
    }
}
