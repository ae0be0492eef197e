use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use common::prelude::{CacheConfig, SessionConfig, TreeConfig};
use common::tree::{DEFAULT_CONTENT_CACHE_BUDGET_BYTES, DEFAULT_CONTENT_CACHE_MAX_BYTES};
use serde::{Deserialize, Serialize};
use strata_object_store::ObjectStoreConfig;

pub const CONFIG_FILE_NAME: &str = "strata.toml";

/// Server configuration, read from TOML. Every key is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the HTTP server listens on
    pub listen_addr: SocketAddr,
    /// a path to a sqlite database, if not set then an
    ///  in-memory database will be used
    pub sqlite_path: Option<PathBuf>,
    /// Where blob bytes are kept
    pub blob_store: ObjectStoreConfig,
    /// Run on the in-memory store instead of SQLite, nothing survives a restart
    pub ephemeral: bool,

    // caches
    /// Entry lifetime for every cache; unset means entries live until invalidated
    pub cache_ttl_secs: Option<u64>,
    /// Blobs larger than this are never kept in the content cache
    pub content_cache_max_bytes: usize,
    /// Total bytes the content cache may hold before evicting least recently read blobs
    pub content_cache_budget_bytes: usize,
    pub session_duration_mins: u64,

    // bootstrap super-administrator, created only when none exists
    pub admin_email: String,
    pub admin_password: String,

    // logging
    pub log_level: String,
    /// Directory for log files (optional, logs to stdout only if not set)
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            sqlite_path: None,
            blob_store: ObjectStoreConfig::default(),
            ephemeral: false,
            cache_ttl_secs: None,
            content_cache_max_bytes: DEFAULT_CONTENT_CACHE_MAX_BYTES,
            content_cache_budget_bytes: DEFAULT_CONTENT_CACHE_BUDGET_BYTES,
            session_duration_mins: 60,
            admin_email: "admin@strata.local".to_string(),
            admin_password: "admin".to_string(),
            log_level: "info".to_string(),
            log_dir: None,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        // Surface a bad level at load time rather than at logging init
        config.log_level()?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise fall back to defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn log_level(&self) -> Result<tracing::Level, ConfigError> {
        self.log_level
            .parse()
            .map_err(|_| ConfigError::LogLevel(self.log_level.clone()))
    }

    pub fn cache_config(&self) -> CacheConfig {
        match self.cache_ttl_secs {
            Some(secs) => CacheConfig::with_ttl(Duration::from_secs(secs)),
            None => CacheConfig::default(),
        }
    }

    pub fn tree_config(&self) -> TreeConfig {
        TreeConfig {
            cache: self.cache_config(),
            content_cache_max_bytes: self.content_cache_max_bytes,
            content_cache_budget_bytes: self.content_cache_budget_bytes,
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            duration: Duration::from_secs(self.session_duration_mins * 60),
            cache: self.cache_config(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid log level: {0}")]
    LogLevel(String),
}
