//! # Engine Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     SETTLE_DB_PATH=/var/lib/settle/settle.db                           │
//! │     SETTLE_MAX_CONNECTIONS=8                                           │
//! │     SETTLE_STORE_ID=store-001                                          │
//! │     SETTLE_AUDIT_MODE=outbox                                           │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/settle/settle.toml (Linux)                               │
//! │     ~/Library/Application Support/com.settle.settle/settle.toml (macOS)│
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # settle.toml
//! [database]
//! path = "/var/lib/settle/settle.db"
//! max_connections = 5
//! busy_timeout_ms = 5000
//! connect_timeout_secs = 30
//!
//! [store]
//! id = "store-001"
//! name = "Downtown Branch"
//!
//! [audit]
//! mode = "outbox"  # log | outbox | off
//! ```

use serde::{Deserialize, Serialize};
use settle_db::DbConfig;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{SettleError, SettleResult};

// =============================================================================
// Audit Mode
// =============================================================================

/// Where settlement events go after commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditMode {
    /// Structured log line per event.
    #[default]
    Log,

    /// Durable `audit_outbox` row per event.
    Outbox,

    /// Events are dropped.
    Off,
}

impl std::fmt::Display for AuditMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditMode::Log => write!(f, "log"),
            AuditMode::Outbox => write!(f, "outbox"),
            AuditMode::Off => write!(f, "off"),
        }
    }
}

impl std::str::FromStr for AuditMode {
    type Err = SettleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "log" | "tracing" => Ok(AuditMode::Log),
            "outbox" | "db" => Ok(AuditMode::Outbox),
            "off" | "none" | "disabled" => Ok(AuditMode::Off),
            other => Err(SettleError::InvalidConfig(format!(
                "Unknown audit mode: '{}'. Valid options: log, outbox, off",
                other
            ))),
        }
    }
}

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long a writer waits on the SQLite lock (milliseconds).
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("settle.db")
}

fn default_max_connections() -> u32 {
    5
}

fn default_busy_timeout() -> u64 {
    5_000
}

fn default_connect_timeout() -> u64 {
    30
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

// =============================================================================
// Store Settings
// =============================================================================

/// The store this terminal belongs to. New shifts are opened against it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    pub id: String,

    #[serde(default)]
    pub name: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            id: "default-store".to_string(),
            name: "Default Store".to_string(),
        }
    }
}

// =============================================================================
// Audit Settings
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditSettings {
    #[serde(default)]
    pub mode: AuditMode,
}

// =============================================================================
// Engine Configuration
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub store: StoreSettings,

    #[serde(default)]
    pub audit: AuditSettings,
}

impl EngineConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (settle.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SettleResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading settle config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load settle config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SettleResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SettleError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SettleError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| SettleError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Settle config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SettleResult<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(SettleError::InvalidConfig(
                "database.path must not be empty".into(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(SettleError::InvalidConfig(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if self.store.id.trim().is_empty() {
            return Err(SettleError::InvalidConfig("store.id must not be empty".into()));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("SETTLE_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(max) = std::env::var("SETTLE_MAX_CONNECTIONS") {
            match max.parse::<u32>() {
                Ok(n) => self.database.max_connections = n,
                Err(_) => warn!(value = %max, "Ignoring non-numeric SETTLE_MAX_CONNECTIONS"),
            }
        }

        if let Ok(id) = std::env::var("SETTLE_STORE_ID") {
            self.store.id = id;
        }

        if let Ok(mode) = std::env::var("SETTLE_AUDIT_MODE") {
            match mode.parse() {
                Ok(parsed) => {
                    debug!(mode = %mode, "Overriding audit mode from environment");
                    self.audit.mode = parsed;
                }
                Err(_) => warn!(mode = %mode, "Unknown audit mode in environment"),
            }
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "settle", "settle")
            .map(|dirs| dirs.config_dir().join("settle.toml"))
    }

    /// Pool settings for [`settle_db::Database::new`].
    pub fn to_db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path)
            .max_connections(self.database.max_connections)
            .busy_timeout(Duration::from_millis(self.database.busy_timeout_ms))
            .connect_timeout(Duration::from_secs(self.database.connect_timeout_secs))
    }

    pub fn store_id(&self) -> &str {
        &self.store.id
    }
}
