use blueprint_core::{BlueprintError, DEFAULT_MAX_ATTEMPTS, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    pub storage: StorageConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    #[serde(default = "default_key_attempts")]
    pub key_attempts: usize,
}

impl StorageConfig {
    pub fn blob_dir(&self) -> PathBuf {
        self.data_dir.join("blueprints")
    }

    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("blueprint.db"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    #[serde(default = "default_grace_period_secs")]
    pub grace_period_secs: u64,
}

impl SweepConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            grace_period_secs: default_grace_period_secs(),
        }
    }
}

fn default_bind_addr() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_key_attempts() -> usize {
    DEFAULT_MAX_ATTEMPTS
}

fn default_grace_period_secs() -> u64 {
    3600
}

impl Config {
    /// Load a config file, letting `BLUEPRINT_*` variables override it,
    /// e.g. `BLUEPRINT_STORAGE__DATA_DIR`.
    pub fn from_file(path: &str) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::with_name(path))
            .add_source(
                ::config::Environment::with_prefix("BLUEPRINT")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .map_err(|e| BlueprintError::Config(e.to_string()))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| BlueprintError::Config(e.to_string()))?;

        if config.storage.key_attempts == 0 {
            return Err(BlueprintError::Config(
                "storage.key_attempts must be at least 1".to_string(),
            ));
        }

        Ok(config)
    }
}
