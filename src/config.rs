//! Runtime configuration read from the process environment.

use anyhow::{Context, Result, ensure};
use std::time::Duration;

pub const DEFAULT_BASE_DATA_URL: &str = "https://aggiespirit.ts.tamu.edu/RouteMap/GetBaseData/";
pub const DEFAULT_PATTERN_PATHS_URL: &str =
    "https://aggiespirit.ts.tamu.edu/RouteMap/GetPatternPaths/";
pub const DEFAULT_DATABASE_NAME: &str = "bus_data";

/// Endpoints, timeouts and sink settings for one pipeline process.
#[derive(Debug, Clone)]
pub struct Config {
    pub base_data_url: String,
    pub pattern_paths_url: String,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub database: String,
    pub upsert_concurrency: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_data_url: DEFAULT_BASE_DATA_URL.to_string(),
            pattern_paths_url: DEFAULT_PATTERN_PATHS_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            database: DEFAULT_DATABASE_NAME.to_string(),
            upsert_concurrency: 8,
        }
    }
}

impl Config {
    /// Builds a config from environment variables, falling back to defaults
    /// for anything unset.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`Config::from_env`] but reads values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let secs = |name: &str, default: Duration| -> Result<Duration> {
            match lookup(name) {
                Some(raw) => {
                    let secs: u64 = raw
                        .trim()
                        .parse()
                        .with_context(|| format!("{name} must be a whole number of seconds, got '{raw}'"))?;
                    ensure!(secs > 0, "{name} must be at least 1 second, got '{raw}'");
                    Ok(Duration::from_secs(secs))
                }
                None => Ok(default),
            }
        };

        let upsert_concurrency = match lookup("UPSERT_CONCURRENCY") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .with_context(|| format!("UPSERT_CONCURRENCY must be a positive integer, got '{raw}'"))?
                .max(1),
            None => defaults.upsert_concurrency,
        };

        Ok(Self {
            base_data_url: lookup("BASE_DATA_URL").unwrap_or(defaults.base_data_url),
            pattern_paths_url: lookup("PATTERN_PATHS_URL").unwrap_or(defaults.pattern_paths_url),
            request_timeout: secs("REQUEST_TIMEOUT_SECS", defaults.request_timeout)?,
            connect_timeout: secs("CONNECT_TIMEOUT_SECS", defaults.connect_timeout)?,
            database: lookup("DATABASE_NAME").unwrap_or(defaults.database),
            upsert_concurrency,
        })
    }
}
