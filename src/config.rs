//! Engine configuration loading and validation.
//!
//! Provides the main [`EngineConfig`] struct that aggregates all engine
//! settings. Configuration is loaded from a TOML file, with a
//! `DATABASE_URL` environment variable override for the database location.
//!
//! # Example
//!
//! ```no_run
//! use curvebook::config::EngineConfig;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EngineConfig::load("curvebook.toml")?;
//!     config.logging.init();
//!     Ok(())
//! }
//! ```

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{ConfigError, Result};

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database URL or file path.
    #[serde(default = "default_database_url")]
    pub url: String,
    /// Maximum number of pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_url() -> String {
    "curvebook.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

/// Trade execution configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TradeConfig {
    /// Slippage cap applied when a request does not carry one, in percent.
    #[serde(default = "default_max_slippage_percent")]
    pub default_max_slippage_percent: Decimal,
    /// How many extra attempts a conflicted trade gets before giving up.
    #[serde(default = "default_conflict_retries")]
    pub conflict_retries: u32,
    /// Base delay between conflict retries (milliseconds); grows linearly
    /// with the attempt number.
    #[serde(default = "default_conflict_backoff_ms")]
    pub conflict_backoff_ms: u64,
    /// Bounded wait for a token's lock before reporting a conflict
    /// (milliseconds).
    #[serde(default = "default_lock_wait_ms")]
    pub lock_wait_ms: u64,
}

fn default_max_slippage_percent() -> Decimal {
    dec!(5)
}

fn default_conflict_retries() -> u32 {
    3
}

fn default_conflict_backoff_ms() -> u64 {
    50
}

fn default_lock_wait_ms() -> u64 {
    5000 // 5 seconds
}

impl Default for TradeConfig {
    fn default() -> Self {
        Self {
            default_max_slippage_percent: default_max_slippage_percent(),
            conflict_retries: default_conflict_retries(),
            conflict_backoff_ms: default_conflict_backoff_ms(),
            lock_wait_ms: default_lock_wait_ms(),
        }
    }
}

impl TradeConfig {
    /// Lock wait as a [`Duration`].
    #[must_use]
    pub const fn lock_wait(&self) -> Duration {
        Duration::from_millis(self.lock_wait_ms)
    }

    /// Backoff before the given retry attempt, counted from 1.
    #[must_use]
    pub const fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.conflict_backoff_ms * attempt as u64)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl LoggingConfig {
    /// Initialize the tracing subscriber with this logging configuration.
    pub fn init(&self) {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        match self.format.as_str() {
            "json" => {
                fmt().json().with_env_filter(filter).init();
            }
            _ => {
                fmt().with_env_filter(filter).init();
            }
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

/// Main engine configuration.
///
/// Aggregates all settings for the engine. Load from a TOML file using
/// [`EngineConfig::load`] or parse directly with [`EngineConfig::parse_toml`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineConfig {
    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Trade execution settings.
    #[serde(default)]
    pub trade: TradeConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Parse configuration from TOML content.
    ///
    /// A `DATABASE_URL` environment variable overrides the configured
    /// database location.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML content is malformed or validation fails.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;

        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database.url = url;
        }

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// A `.env` file next to the process is honored before the
    /// `DATABASE_URL` override is read.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, the TOML content is
    /// malformed, or validation fails.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let _ = dotenvy::dotenv();
        let content = fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    /// Validate configuration values.
    fn validate(&self) -> Result<()> {
        if self.database.url.is_empty() {
            return Err(ConfigError::MissingField {
                field: "database.url",
            }
            .into());
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_connections",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.trade.default_max_slippage_percent < Decimal::ZERO
            || self.trade.default_max_slippage_percent > Decimal::ONE_HUNDRED
        {
            return Err(ConfigError::InvalidValue {
                field: "default_max_slippage_percent",
                reason: "must be between 0 and 100".to_string(),
            }
            .into());
        }
        if self.trade.conflict_backoff_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "conflict_backoff_ms",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.trade.lock_wait_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "lock_wait_ms",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        Ok(())
    }
}
