use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

const DEFAULT_BASE_URL: &str = "http://localhost:8080/api/";
const DEFAULT_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_MARKET_ENDPOINT: &str = "market";
const DEFAULT_CURRENCY_ENDPOINT: &str = "currency";
const DEFAULT_INTERVAL_MS: i64 = 5_000;
const DEFAULT_MAX_RETRIES: u32 = 5;
const DEFAULT_LOG_LEVEL: &str = "info";

/// Errors raised while reading or checking configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Cannot read config file {path}: {source}")]
    Io {
        /// File that was read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid JSON / JSON5 for this shape.
    #[error("Cannot parse config file {path}: {reason}")]
    Parse {
        /// File that was parsed.
        path: PathBuf,
        /// Parser message.
        reason: String,
    },

    /// A value is out of range.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// # Sync Config
///
/// One configuration layer. Every field is optional so a file, the environment
/// or the command line can each set only what they care about.
///
/// Keys are camelCase on disk:
/// `baseUrl`, `authToken`, `timeoutMs`, `marketEndpoint`, `currencyEndpoint`,
/// `intervalMs`, `maxRetries`, `logDir`, `logLevel`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncConfig {
    /// Absolute base URL both endpoints are joined onto.
    pub base_url: Option<String>,
    /// Bearer token sent with every request.
    pub auth_token: Option<String>,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Endpoint of the live quotes.
    pub market_endpoint: Option<String>,
    /// Endpoint of the currency configuration.
    pub currency_endpoint: Option<String>,
    /// Polling interval in milliseconds.
    pub interval_ms: Option<i64>,
    /// Consecutive polling failures before polling stops.
    pub max_retries: Option<u32>,
    /// Directory for log files.
    pub log_dir: Option<PathBuf>,
    /// Minimum log level.
    pub log_level: Option<String>,
}

impl SyncConfig {
    /// A layer with every field set to its default.
    pub fn defaults() -> Self {
        Self {
            base_url: Some(DEFAULT_BASE_URL.to_string()),
            auth_token: None,
            timeout_ms: Some(DEFAULT_TIMEOUT_MS),
            market_endpoint: Some(DEFAULT_MARKET_ENDPOINT.to_string()),
            currency_endpoint: Some(DEFAULT_CURRENCY_ENDPOINT.to_string()),
            interval_ms: Some(DEFAULT_INTERVAL_MS),
            max_retries: Some(DEFAULT_MAX_RETRIES),
            log_dir: None,
            log_level: Some(DEFAULT_LOG_LEVEL.to_string()),
        }
    }

    /// Reads a layer from a JSON or JSON5 file.
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        json5::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Overlays `other` on top of `self`: every field set in `other` wins.
    pub fn merge(self, other: SyncConfig) -> SyncConfig {
        SyncConfig {
            base_url: other.base_url.or(self.base_url),
            auth_token: other.auth_token.or(self.auth_token),
            timeout_ms: other.timeout_ms.or(self.timeout_ms),
            market_endpoint: other.market_endpoint.or(self.market_endpoint),
            currency_endpoint: other.currency_endpoint.or(self.currency_endpoint),
            interval_ms: other.interval_ms.or(self.interval_ms),
            max_retries: other.max_retries.or(self.max_retries),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
        }
    }

    /// Rejects values no process can run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url().trim().is_empty() {
            return Err(ConfigError::Invalid("baseUrl must not be empty".to_string()));
        }
        if self.timeout_ms() == 0 {
            return Err(ConfigError::Invalid("timeoutMs must be positive".to_string()));
        }
        if self.market_endpoint().is_empty() || self.currency_endpoint().is_empty() {
            return Err(ConfigError::Invalid("endpoints must not be empty".to_string()));
        }
        Ok(())
    }

    /// Base URL, or the default.
    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    /// Request timeout, or the default.
    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS)
    }

    /// Quote endpoint, or the default.
    pub fn market_endpoint(&self) -> &str {
        self.market_endpoint.as_deref().unwrap_or(DEFAULT_MARKET_ENDPOINT)
    }

    /// Currency endpoint, or the default.
    pub fn currency_endpoint(&self) -> &str {
        self.currency_endpoint
            .as_deref()
            .unwrap_or(DEFAULT_CURRENCY_ENDPOINT)
    }

    /// Polling interval, or the default.
    pub fn interval_ms(&self) -> i64 {
        self.interval_ms.unwrap_or(DEFAULT_INTERVAL_MS)
    }

    /// Failure bound, or the default.
    pub fn max_retries(&self) -> u32 {
        self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES)
    }

    /// Log level name, or the default.
    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }
}

impl fmt::Display for SyncConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SyncConfig
    Base URL: {},
    Auth token: {},
    Timeout: {} ms,
    Market endpoint: {},
    Currency endpoint: {},
    Interval: {} ms,
    Max retries: {},
    Log dir: {},
    Log level: {}
",
            self.base_url(),
            if self.auth_token.is_some() { "<set>" } else { "<none>" },
            self.timeout_ms(),
            self.market_endpoint(),
            self.currency_endpoint(),
            self.interval_ms(),
            self.max_retries(),
            self.log_dir
                .as_ref()
                .map(|d| d.display().to_string())
                .unwrap_or_else(|| "<none>".to_string()),
            self.log_level()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn later_layers_win_field_by_field() {
        let file = SyncConfig {
            interval_ms: Some(1_000),
            market_endpoint: Some("v2/market".to_string()),
            ..SyncConfig::default()
        };
        let cli = SyncConfig {
            interval_ms: Some(250),
            ..SyncConfig::default()
        };

        let merged = SyncConfig::defaults().merge(file).merge(cli);

        assert_eq!(merged.interval_ms(), 250);
        assert_eq!(merged.market_endpoint(), "v2/market");
        assert_eq!(merged.currency_endpoint(), "currency");
        assert_eq!(merged.max_retries(), 5);
    }

    #[test]
    fn reads_json5_with_comments_and_trailing_commas() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "{{
                // staging feed
                baseUrl: 'https://staging.example.com/api/',
                maxRetries: 3,
            }}"
        )
        .unwrap();

        let config = SyncConfig::load_file(file.path()).unwrap();

        assert_eq!(config.base_url(), "https://staging.example.com/api/");
        assert_eq!(config.max_retries, Some(3));
        assert_eq!(config.interval_ms, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_and_malformed_files_are_reported() {
        let missing = SyncConfig::load_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(missing, ConfigError::Io { .. }));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ intervalMs: 'soon' }}").unwrap();
        let malformed = SyncConfig::load_file(file.path()).unwrap_err();
        assert!(matches!(malformed, ConfigError::Parse { .. }));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let config = SyncConfig {
            timeout_ms: Some(0),
            ..SyncConfig::defaults()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
