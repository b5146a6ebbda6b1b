//! Application configuration: a JSON file plus environment overrides.

use anyhow::{Context, Result};
use hardline_cloud::CloudConfig;
use hardline_progress::ChallengeRules;
use hardline_sync::SyncConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

pub const ENV_API_URL: &str = "HARDLINE_API_URL";
pub const ENV_ANON_KEY: &str = "HARDLINE_ANON_KEY";
pub const ENV_ACCESS_TOKEN: &str = "HARDLINE_ACCESS_TOKEN";
pub const ENV_DATA_PATH: &str = "HARDLINE_DATA_PATH";

/// Data path that keeps everything in memory.
pub const IN_MEMORY: &str = ":memory:";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// DuckDB file backing the cache and the sync queue.
    pub data_path: PathBuf,
    pub cloud: CloudConfig,
    pub sync: SyncConfig,
    pub rules: ChallengeRules,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("hardline.duckdb"),
            cloud: CloudConfig::default(),
            sync: SyncConfig::default(),
            rules: ChallengeRules::default(),
        }
    }
}

impl AppConfig {
    /// Reads the config file when given, then applies `HARDLINE_*` overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config {}", path.display()))?;
                Self::from_json(&raw)
                    .with_context(|| format!("invalid config {}", path.display()))?
            }
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Whether the store should be opened in memory rather than on disk.
    pub fn is_in_memory(&self) -> bool {
        self.data_path.as_os_str() == IN_MEMORY
    }

    fn apply_env(&mut self) {
        if let Some(url) = env_value(ENV_API_URL) {
            self.cloud.api_base_url = url;
        }
        if let Some(key) = env_value(ENV_ANON_KEY) {
            self.cloud.anon_key = key;
        }
        if let Some(token) = env_value(ENV_ACCESS_TOKEN) {
            self.cloud.access_token = Some(token);
        }
        if let Some(path) = env_value(ENV_DATA_PATH) {
            self.data_path = PathBuf::from(path);
        }
    }
}

/// Set and non-empty.
fn env_value(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}
