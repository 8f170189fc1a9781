// src/policy/mod.rs - Banned-word and replacement policy access

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::types::{BanWordPolicy, Platform};

/// Errors surfaced by a policy store. The check boundary converts these to a
/// fail-closed verdict rather than letting unfiltered text through.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("policy store unavailable: {0}")]
    Unavailable(String),
    #[error("malformed policy data: {0}")]
    Malformed(String),
}

/// Source of banned-word lists and the replacement (de-obfuscation) map.
///
/// Fetched fresh on every check call; caching, if any, lives behind this
/// trait. Returned data is treated as read-only by the core.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Global policy applied in every channel.
    async fn global_ban_words(&self) -> Result<BanWordPolicy, PolicyError>;

    /// Channel-specific substring entries, appended to the global list.
    async fn channel_ban_words(
        &self,
        platform: Platform,
        channel: &str,
    ) -> Result<Vec<String>, PolicyError>;

    /// Obfuscated-token -> canonical-replacement map (homoglyphs, leet speak).
    async fn replacement_map(&self) -> Result<HashMap<String, String>, PolicyError>;
}

/// In-memory policy store for tests and the demo binary.
#[derive(Default)]
pub struct InMemoryPolicyStore {
    global: RwLock<BanWordPolicy>,
    channel_words: RwLock<HashMap<(Platform, String), Vec<String>>>,
    replacements: RwLock<HashMap<String, String>>,
}

impl InMemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_global(&self, policy: BanWordPolicy) {
        *self.global.write().await = policy;
    }

    pub async fn set_channel_words(&self, platform: Platform, channel: &str, words: Vec<String>) {
        self.channel_words
            .write()
            .await
            .insert((platform, channel.to_string()), words);
    }

    pub async fn set_replacements(&self, map: HashMap<String, String>) {
        *self.replacements.write().await = map;
    }
}

#[async_trait]
impl PolicyStore for InMemoryPolicyStore {
    async fn global_ban_words(&self) -> Result<BanWordPolicy, PolicyError> {
        Ok(self.global.read().await.clone())
    }

    async fn channel_ban_words(
        &self,
        platform: Platform,
        channel: &str,
    ) -> Result<Vec<String>, PolicyError> {
        Ok(self
            .channel_words
            .read()
            .await
            .get(&(platform, channel.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn replacement_map(&self) -> Result<HashMap<String, String>, PolicyError> {
        Ok(self.replacements.read().await.clone())
    }
}

/// Policy store that always fails; used to exercise the fail-closed path.
#[cfg(test)]
pub struct BrokenPolicyStore;

#[cfg(test)]
#[async_trait]
impl PolicyStore for BrokenPolicyStore {
    async fn global_ban_words(&self) -> Result<BanWordPolicy, PolicyError> {
        Err(PolicyError::Unavailable("store offline".to_string()))
    }

    async fn channel_ban_words(
        &self,
        _platform: Platform,
        _channel: &str,
    ) -> Result<Vec<String>, PolicyError> {
        Err(PolicyError::Unavailable("store offline".to_string()))
    }

    async fn replacement_map(&self) -> Result<HashMap<String, String>, PolicyError> {
        Err(PolicyError::Unavailable("store offline".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_words_default_to_empty() {
        let store = InMemoryPolicyStore::new();
        let words = store
            .channel_ban_words(Platform::Twitch, "somechannel")
            .await
            .unwrap();
        assert!(words.is_empty());
    }

    #[tokio::test]
    async fn channel_words_are_per_platform() {
        let store = InMemoryPolicyStore::new();
        store
            .set_channel_words(Platform::Twitch, "chan", vec!["tword".to_string()])
            .await;
        store
            .set_channel_words(Platform::Discord, "chan", vec!["dword".to_string()])
            .await;

        let twitch = store.channel_ban_words(Platform::Twitch, "chan").await.unwrap();
        let discord = store.channel_ban_words(Platform::Discord, "chan").await.unwrap();
        assert_eq!(twitch, vec!["tword".to_string()]);
        assert_eq!(discord, vec!["dword".to_string()]);
    }
}
