/// Configuration for the evaluation engine and its database
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding [`EngineConfig::database_path`]
pub const DATABASE_PATH_ENV: &str = "DEGREEPLAN_DB";

/// Top-level engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// SQLite database file, created if missing
    pub database_path: PathBuf,
    /// How long a writer waits on a locked database before failing
    pub busy_timeout_ms: u64,
    /// `tracing` filter directive used when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("degreeplan.sqlite3"),
            busy_timeout_ms: 5_000,
            log_filter: "info".to_string(),
        }
    }
}

impl EngineConfig {
    /// Loads configuration from a JSON file.
    ///
    /// Missing fields take their defaults, then environment overrides apply.
    ///
    /// # Arguments
    /// * `path` - Path to the JSON config file
    ///
    /// # Returns
    /// * `Ok(EngineConfig)` - Loaded configuration
    /// * `Err` - If the file can't be read or parsed
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: EngineConfig = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;

        Ok(config.with_env_overrides())
    }

    /// Default configuration with environment overrides applied
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Some(path) = std::env::var_os(DATABASE_PATH_ENV).filter(|p| !p.is_empty()) {
            self.database_path = PathBuf::from(path);
        }
        self
    }
}
