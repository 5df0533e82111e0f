//! Serializable pipeline configuration.
//!
//! Loaded from TOML; every section and field has a default, so an empty file is a
//! valid configuration:
//!
//! ```toml
//! [fetch]
//! concurrency = 5
//! ban_ms = 10000
//! retry_pause_ms = 1000
//! # max_attempts = 50   # unset = retry forever
//!
//! [provider]
//! base_url = "https://www.alphavantage.co/query"
//! request_timeout_secs = 30
//!
//! [output]
//! dir = "data"
//! jobs = 4
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntradayConfig {
    pub fetch: FetchConfig,
    pub provider: ProviderConfig,
    pub output: OutputConfig,
}

impl IntradayConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.fetch.validate()?;
        if self.provider.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("provider.base_url is empty".into()));
        }
        if self.provider.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "provider.request_timeout_secs must be at least 1".into(),
            ));
        }
        if self.output.jobs == 0 {
            return Err(ConfigError::Invalid("output.jobs must be at least 1".into()));
        }
        Ok(())
    }
}

/// Worker pool and retry behavior of the fetcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Number of worker threads, i.e. the most requests in flight at once.
    pub concurrency: usize,
    /// Ban window applied after a failed or malformed response.
    pub ban_ms: u64,
    /// Extra pause a failing worker takes before retrying the same request.
    pub retry_pause_ms: u64,
    /// Payloads shorter than this are treated as malformed.
    pub min_payload_bytes: usize,
    /// A valid payload starts with this token (the CSV header's first column).
    pub header_token: String,
    /// Attempts per request before giving up. `None` retries forever.
    pub max_attempts: Option<u32>,
    /// How often idle workers look for a shutdown signal.
    pub idle_poll_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            ban_ms: 10_000,
            retry_pause_ms: 1_000,
            min_payload_bytes: 10,
            header_token: "time".to_string(),
            max_attempts: None,
            idle_poll_ms: 50,
        }
    }
}

impl FetchConfig {
    pub fn ban_duration(&self) -> Duration {
        Duration::from_millis(self.ban_ms)
    }

    pub fn retry_pause(&self) -> Duration {
        Duration::from_millis(self.retry_pause_ms)
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms.max(1))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid("fetch.concurrency must be at least 1".into()));
        }
        if self.max_attempts == Some(0) {
            return Err(ConfigError::Invalid(
                "fetch.max_attempts must be at least 1 (omit it to retry forever)".into(),
            ));
        }
        if self.header_token.is_empty() {
            return Err(ConfigError::Invalid("fetch.header_token is empty".into()));
        }
        Ok(())
    }
}

/// Remote endpoint settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.alphavantage.co/query".to_string(),
            request_timeout_secs: 30,
            user_agent: concat!("intraday/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ProviderConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Where and how the driver writes finished series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    /// Symbols processed at the same time. All of them share one fetcher.
    pub jobs: usize,
    pub pretty: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data"),
            jobs: 4,
            pretty: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_provider_behavior() {
        let config = IntradayConfig::default();
        assert_eq!(config.fetch.ban_duration(), Duration::from_secs(10));
        assert_eq!(config.fetch.retry_pause(), Duration::from_secs(1));
        assert_eq!(config.fetch.min_payload_bytes, 10);
        assert_eq!(config.fetch.header_token, "time");
        assert_eq!(config.fetch.max_attempts, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_request_timeout() {
        let err = IntradayConfig::from_toml(
            r#"
            [provider]
            request_timeout_secs = 0
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("request_timeout_secs"));
    }

    #[test]
    fn empty_toml_is_default() {
        let config = IntradayConfig::from_toml("").unwrap();
        assert_eq!(config, IntradayConfig::default());
    }

    #[test]
    fn partial_toml_overrides_fields() {
        let config = IntradayConfig::from_toml(
            r#"
            [fetch]
            concurrency = 2
            max_attempts = 7

            [output]
            dir = "out"
            "#,
        )
        .unwrap();
        assert_eq!(config.fetch.concurrency, 2);
        assert_eq!(config.fetch.max_attempts, Some(7));
        assert_eq!(config.fetch.ban_ms, 10_000);
        assert_eq!(config.output.dir, PathBuf::from("out"));
        assert_eq!(config.output.jobs, 4);
    }

    #[test]
    fn toml_roundtrip() {
        let mut config = IntradayConfig::default();
        config.fetch.max_attempts = Some(3);
        config.output.pretty = true;
        let text = toml::to_string(&config).unwrap();
        assert_eq!(IntradayConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn rejects_zero_concurrency() {
        let err = IntradayConfig::from_toml("[fetch]\nconcurrency = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_zero_attempts() {
        let err = IntradayConfig::from_toml("[fetch]\nmax_attempts = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_garbage() {
        let err = IntradayConfig::from_toml("[fetch\nconcurrency = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = IntradayConfig::from_file(Path::new("/nonexistent/intraday.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/intraday.toml"));
    }
}
