//! Application configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use saga::RetryPolicy;

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT` — `text` or `json` (default: `text`)
/// - `INVENTORY_SERVICE_URL` — remote inventory base URL; unset runs the
///   inventory in-process and serves its routes
/// - `INVENTORY_TIMEOUT_MS` — per-request timeout for the remote inventory (default: `2000`)
/// - `COMPENSATION_MAX_RETRIES` — retries per compensating increment (default: `3`)
/// - `COMPENSATION_BACKOFF_MS` — initial compensation backoff (default: `50`)
/// - `SAGA_JOURNAL_PATH` — JSON-lines journal file; unset keeps it in memory
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub inventory_service_url: Option<String>,
    pub inventory_timeout: Duration,
    pub compensation_max_retries: usize,
    pub compensation_backoff: Duration,
    pub saga_journal_path: Option<PathBuf>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    ///
    /// Unparseable numbers fall back to their defaults; empty strings count
    /// as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: var("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: var("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: match var("LOG_FORMAT").as_deref() {
                Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
            inventory_service_url: var("INVENTORY_SERVICE_URL"),
            inventory_timeout: var("INVENTORY_TIMEOUT_MS")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.inventory_timeout),
            compensation_max_retries: var("COMPENSATION_MAX_RETRIES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.compensation_max_retries),
            compensation_backoff: var("COMPENSATION_BACKOFF_MS")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.compensation_backoff),
            saga_journal_path: var("SAGA_JOURNAL_PATH").map(PathBuf::from),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Retry policy for compensating increments.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::builder()
            .max_retries(self.compensation_max_retries)
            .initial_delay(self.compensation_backoff)
            .build()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            inventory_service_url: None,
            inventory_timeout: Duration::from_millis(2000),
            compensation_max_retries: 3,
            compensation_backoff: Duration::from_millis(50),
            saga_journal_path: None,
        }
    }
}
