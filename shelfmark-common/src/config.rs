//! Configuration loading
//!
//! Resolution order for the config file path:
//! 1. `SHELFMARK_CONFIG` environment variable
//! 2. Platform config dir (`~/.config/shelfmark/shelfmark.toml` on Linux)
//! 3. Compiled defaults (no file required)
//!
//! Individual values can additionally be overridden with `SHELFMARK_DB`
//! and `SHELFMARK_PORT`.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level TOML configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub catalog: CatalogConfig,
    pub import: ImportConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub base_url: String,
    /// User-Agent sent on every catalog request (catalog policy requires one)
    pub user_agent: String,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub rate_limit_per_sec: u32,
    pub cache_ttl_secs: u64,
    /// Worker-pool degree for the bulk prefetch path
    pub prefetch_concurrency: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Upload size cap; the request is rejected once this many bytes accumulate
    pub max_upload_bytes: usize,
    pub queue_poll_interval_ms: u64,
    /// Delivery attempts per job before the queue abandons it
    pub max_attempts: i64,
    pub retry_base_delay_secs: i64,
    pub sse_poll_interval_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5820,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_data_dir().join("shelfmark.db"),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: "https://openlibrary.org".to_string(),
            user_agent: format!(
                "Shelfmark/{} (https://github.com/shelfmark/shelfmark)",
                env!("CARGO_PKG_VERSION")
            ),
            timeout_secs: 15,
            connect_timeout_secs: 5,
            rate_limit_per_sec: 1,
            cache_ttl_secs: 7 * 24 * 3600,
            prefetch_concurrency: 3,
        }
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: 10 * 1024 * 1024,
            queue_poll_interval_ms: 1000,
            max_attempts: 3,
            retry_base_delay_secs: 30,
            sse_poll_interval_ms: 500,
        }
    }
}

impl CatalogConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl ImportConfig {
    pub fn queue_poll_interval(&self) -> Duration {
        Duration::from_millis(self.queue_poll_interval_ms)
    }

    pub fn sse_poll_interval(&self) -> Duration {
        Duration::from_millis(self.sse_poll_interval_ms)
    }
}

impl TomlConfig {
    /// Load configuration, applying environment overrides on top of the
    /// file (if any) and the compiled defaults.
    pub fn load() -> Result<Self> {
        let mut config = match config_file_path() {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(&path)?;
                toml::from_str(&content).map_err(|e| {
                    Error::Config(format!("Failed to parse {}: {}", path.display(), e))
                })?
            }
            _ => TomlConfig::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string (missing sections fall
    /// back to defaults).
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("SHELFMARK_DB") {
            self.database.path = PathBuf::from(path);
        }
        if let Ok(port) = std::env::var("SHELFMARK_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            } else {
                tracing::warn!(value = %port, "Ignoring unparseable SHELFMARK_PORT");
            }
        }
    }
}

/// Config file path: SHELFMARK_CONFIG env var, else platform config dir
fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("SHELFMARK_CONFIG") {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|d| d.join("shelfmark").join("shelfmark.toml"))
}

/// Platform default data directory for the database file
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("shelfmark"))
        .unwrap_or_else(|| PathBuf::from("./shelfmark_data"))
}
