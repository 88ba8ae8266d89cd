// Runtime configuration, read from environment variables

use std::env;
use std::path::PathBuf;

pub const DEFAULT_DB_PATH: &str = "coin_pot.db";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// SQLite database file (`COIN_POT_DB`)
    pub db_path: PathBuf,
    /// Address the HTTP server binds to (`COIN_POT_ADDR`)
    pub bind_addr: String,
    /// tracing filter directive (`RUST_LOG`)
    pub log_filter: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Config {
            db_path: get("COIN_POT_DB")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH)),
            bind_addr: get("COIN_POT_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            log_filter: get("RUST_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

/// Install the global tracing subscriber for a binary
pub fn init_logging(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_new(&config.log_filter)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER));

    // A second init (tests, embedding) is harmless
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
