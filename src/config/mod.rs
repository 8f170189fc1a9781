// src/config/mod.rs - Core configuration with YAML loading

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// User-gate registry tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateSettings {
    /// Evict a user's lock entry after this many seconds without an
    /// acquisition, provided the lock is uncontended.
    #[serde(default = "default_idle_evict_seconds")]
    pub idle_evict_seconds: i64,
    /// How often the eviction sweep runs.
    #[serde(default = "default_sweep_interval_seconds")]
    pub sweep_interval_seconds: u64,
}

fn default_idle_evict_seconds() -> i64 {
    3600
}

fn default_sweep_interval_seconds() -> u64 {
    300
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            idle_evict_seconds: default_idle_evict_seconds(),
            sweep_interval_seconds: default_sweep_interval_seconds(),
        }
    }
}

/// AFK lifecycle tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AfkSettings {
    /// How many times a user may resume an away period after a short
    /// interruption before it is treated as over.
    #[serde(default = "default_max_resume_count")]
    pub max_resume_count: u32,
}

fn default_max_resume_count() -> u32 {
    3
}

impl Default for AfkSettings {
    fn default() -> Self {
        Self {
            max_resume_count: default_max_resume_count(),
        }
    }
}

/// Top-level configuration for the safety and ingestion core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoreConfig {
    #[serde(default)]
    pub gate: GateSettings,
    #[serde(default)]
    pub afk: AfkSettings,
}

impl CoreConfig {
    /// Load from a YAML file; a missing file yields the defaults.
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(
                "config file {} not found, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: CoreConfig = serde_yaml::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.gate.idle_evict_seconds < 0 {
            anyhow::bail!("gate.idle_evict_seconds must be non-negative");
        }
        if self.gate.sweep_interval_seconds == 0 {
            anyhow::bail!("gate.sweep_interval_seconds must be positive");
        }
        Ok(())
    }
}
