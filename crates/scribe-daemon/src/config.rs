//! Configuration file management.
//!
//! `$SCRIBE_DATA_DIR/config.toml` (default `~/.scribe/config.toml`). Every
//! field has a default; a missing file means all defaults. Secrets may come
//! from the environment, which wins over the file.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use scribe_pipeline::custody::CustodyMode;
use scribe_pipeline::policy::IngestPolicy;
use scribe_pipeline::reconcile::ReconcilePolicy;
use scribe_pipeline::submit::SubmitterConfig;
use scribe_pipeline::PipelineConfig;

pub const ENV_DATA_DIR: &str = "SCRIBE_DATA_DIR";
pub const ENV_PINNING_API_KEY: &str = "SCRIBE_PINNING_API_KEY";
pub const ENV_PINNING_SECRET_KEY: &str = "SCRIBE_PINNING_SECRET_KEY";
pub const ENV_ANCHOR_API_KEY: &str = "SCRIBE_ANCHOR_API_KEY";

/// Complete daemon configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub anchor: AnchorConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    #[serde(default)]
    pub ingest: IngestPolicy,
    #[serde(default)]
    pub custody: CustodyConfig,
    #[serde(default)]
    pub advanced: AdvancedConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackendKind {
    #[default]
    Pinning,
    Simulated,
    Disabled,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorBackendKind {
    #[default]
    Remote,
    Simulated,
}

/// Content-addressed storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackendKind,
    #[serde(default = "default_pinning_api_url")]
    pub api_url: String,
    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub secret_key: String,
    /// Upload timeout in seconds.
    #[serde(default = "default_upload_timeout")]
    pub upload_timeout_secs: u64,
}

/// Anchoring service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnchorConfig {
    #[serde(default)]
    pub backend: AnchorBackendKind,
    #[serde(default = "default_anchor_base_url")]
    pub base_url: String,
    /// Bearer token.
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub receive_address: String,
    /// Fee rate in sats/vB.
    #[serde(default = "default_fee")]
    pub fee: u64,
}

/// Status polling budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustodyConfig {
    #[serde(default)]
    pub mode: CustodyMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedConfig {
    /// Data directory. Empty = platform default.
    #[serde(default)]
    pub data_dir: String,
    /// Log level: "debug" | "info" | "warn" | "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default value functions

fn default_pinning_api_url() -> String {
    scribe_storage::pinning::DEFAULT_API_URL.to_string()
}

fn default_gateway_url() -> String {
    scribe_storage::pinning::DEFAULT_GATEWAY_URL.to_string()
}

fn default_upload_timeout() -> u64 {
    120
}

fn default_anchor_base_url() -> String {
    scribe_anchor::remote::DEFAULT_BASE_URL.to_string()
}

fn default_fee() -> u64 {
    scribe_anchor::client::DEFAULT_FEE
}

fn default_max_attempts() -> u32 {
    scribe_pipeline::reconcile::DEFAULT_MAX_ATTEMPTS
}

fn default_interval() -> u64 {
    scribe_pipeline::reconcile::DEFAULT_INTERVAL.as_secs()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackendKind::default(),
            api_url: default_pinning_api_url(),
            gateway_url: default_gateway_url(),
            api_key: String::new(),
            secret_key: String::new(),
            upload_timeout_secs: default_upload_timeout(),
        }
    }
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            backend: AnchorBackendKind::default(),
            base_url: default_anchor_base_url(),
            api_key: String::new(),
            receive_address: String::new(),
            fee: default_fee(),
        }
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            interval_secs: default_interval(),
        }
    }
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            data_dir: String::new(),
            log_level: default_log_level(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from the default config file location, then
    /// apply environment overrides.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();
        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Override secrets from the environment. Empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        if let Some(v) = get(ENV_PINNING_API_KEY) {
            self.storage.api_key = v;
        }
        if let Some(v) = get(ENV_PINNING_SECRET_KEY) {
            self.storage.secret_key = v;
        }
        if let Some(v) = get(ENV_ANCHOR_API_KEY) {
            self.anchor.api_key = v;
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            policy: self.ingest.clone(),
            submitter: SubmitterConfig {
                receive_address: self.anchor.receive_address.clone(),
                fee: self.anchor.fee,
            },
            reconcile: ReconcilePolicy {
                max_attempts: self.reconcile.max_attempts,
                interval: Duration::from_secs(self.reconcile.interval_secs),
            },
        }
    }

    /// Get the data directory path.
    pub fn data_dir(&self) -> PathBuf {
        if self.advanced.data_dir.is_empty() {
            Self::default_data_dir()
        } else {
            PathBuf::from(&self.advanced.data_dir)
        }
    }

    /// Get the config file path.
    fn config_path() -> PathBuf {
        Self::default_data_dir().join("config.toml")
    }

    fn default_data_dir() -> PathBuf {
        if let Ok(dir) = std::env::var(ENV_DATA_DIR) {
            return PathBuf::from(dir);
        }
        dirs_fallback(".scribe")
    }
}

/// Fallback home directory resolution.
fn dirs_fallback(subpath: &str) -> PathBuf {
    std::env::var("HOME")
        .map(|h| PathBuf::from(h).join(subpath))
        .unwrap_or_else(|_| PathBuf::from("/tmp/scribe"))
}
