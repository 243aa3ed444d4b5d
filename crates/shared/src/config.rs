//! Ledger configuration management.

use serde::Deserialize;

/// Ledger configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Derived balance cache configuration.
    #[serde(default)]
    pub balance_cache: BalanceCacheConfig,
    /// Period closing defaults.
    #[serde(default)]
    pub closing: ClosingConfig,
    /// Log output configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Configuration for the derived balance cache.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct BalanceCacheConfig {
    /// Maximum number of cached account balances.
    #[serde(default = "default_cache_capacity")]
    pub capacity: u64,
    /// Time-to-live of a cached balance in seconds.
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
    /// Interval of the background refresh job in seconds. Zero disables it.
    #[serde(default)]
    pub refresh_interval_secs: u64,
}

fn default_cache_capacity() -> u64 {
    10_000
}

fn default_cache_ttl() -> u64 {
    300 // 5 minutes
}

impl Default for BalanceCacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
            ttl_secs: default_cache_ttl(),
            refresh_interval_secs: 0,
        }
    }
}

/// Period closing defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct ClosingConfig {
    /// Account code of the retained earnings account.
    #[serde(default = "default_retained_earnings_code")]
    pub retained_earnings_code: String,
}

fn default_retained_earnings_code() -> String {
    "3102".to_string()
}

impl Default for ClosingConfig {
    fn default() -> Self {
        Self {
            retained_earnings_code: default_retained_earnings_code(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Log output configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
    /// Filter directive used when `RUST_LOG` is not set.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_filter() -> String {
    "buku=debug".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: default_log_filter(),
        }
    }
}

impl LedgerConfig {
    /// Loads configuration from config files and `BUKU__*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(
                config::Environment::with_prefix("BUKU")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Reads a `.env` file if present, then loads configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        Self::load()
    }
}
