use crate::encode::Format;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const ACCESS_TOKEN_VAR_NAME: &str = "ACCESS_TOKEN";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("File error: {0}")]
    FileError(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// The requested level for logging full request bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestLogLevel {
    /// No request logging.
    #[default]
    None,
    /// Only log failed requests / records.
    #[serde(rename = "deadletter")]
    DeadletterOnly,
    /// Log everything.
    All,
}

/// Configuration for the ingestion pushers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectorConfig {
    /// Tenant to push the data to.
    pub tenant_id: String,

    /// Index to push the data to.
    pub index_id: String,

    /// Base URL of the ingestion service.
    pub endpoint: String,

    /// Bearer token for the ingestion API. Falls back to the `ACCESS_TOKEN`
    /// environment variable when empty.
    pub access_token: String,

    /// Wire format for push requests.
    pub push_format: Format,

    /// Maximum number of records per push request (0 defaults to 1000).
    pub max_batch_count: u32,

    /// Maximum serialized request size in bytes (0 disables size-based
    /// batch cutting).
    pub max_request_size: u32,

    /// Maximum number of concurrent push requests.
    pub max_concurrent_requests: u32,

    /// Level for logging full request bodies.
    pub request_log: RequestLogLevel,

    /// Directory for full-request logs (dead-letter and success files).
    pub request_log_location: Option<PathBuf>,

    /// Interval in milliseconds for polling update statuses. Unset or zero
    /// disables status tracking.
    pub tracking_interval_ms: Option<u64>,

    /// Number of attempts before a push request is dead-lettered.
    pub retry_count: u32,

    /// Maximum wait in milliseconds between additions before the buffered
    /// pusher flushes.
    pub max_buffer_wait_ms: u64,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            tenant_id: String::new(),
            index_id: String::new(),
            endpoint: String::new(),
            access_token: String::new(),
            push_format: Format::JsonArray,
            max_batch_count: 1000,
            max_request_size: 0,
            max_concurrent_requests: 2,
            request_log: RequestLogLevel::None,
            request_log_location: None,
            tracking_interval_ms: None,
            retry_count: 3,
            max_buffer_wait_ms: 5000,
        }
    }
}

impl ConnectorConfig {
    /// Loads the configuration from a TOML file and validates it.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration bounds and applies fallbacks (default
    /// batch count, environment access token).
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.tenant_id.is_empty() {
            return Err(ConfigError::InvalidConfig("tenant_id is required".into()));
        }
        if self.index_id.is_empty() {
            return Err(ConfigError::InvalidConfig("index_id is required".into()));
        }
        if self.endpoint.is_empty() {
            return Err(ConfigError::InvalidConfig("endpoint is required".into()));
        }
        if self.max_batch_count >= 10_000 {
            return Err(ConfigError::InvalidConfig(
                "max_batch_count can't be 10000 or more".into(),
            ));
        }
        if self.max_request_size >= 250 * 1024 * 1024 {
            return Err(ConfigError::InvalidConfig(
                "max_request_size can't exceed 250 MB".into(),
            ));
        }
        if self.max_concurrent_requests == 0 || self.max_concurrent_requests >= 1000 {
            return Err(ConfigError::InvalidConfig(
                "max_concurrent_requests must be between 1 and 999".into(),
            ));
        }
        if self.request_log != RequestLogLevel::None && self.request_log_location.is_none() {
            return Err(ConfigError::InvalidConfig(
                "request_log_location is required when request_log is enabled".into(),
            ));
        }
        if self.retry_count == 0 || self.retry_count >= 10 {
            return Err(ConfigError::InvalidConfig(
                "retry_count must be between 1 and 9".into(),
            ));
        }
        if self.max_buffer_wait_ms >= 3_600_000 {
            return Err(ConfigError::InvalidConfig(
                "max_buffer_wait_ms can't exceed one hour".into(),
            ));
        }

        if self.max_batch_count == 0 {
            self.max_batch_count = 1000;
        }
        if self.access_token.is_empty() {
            self.access_token = std::env::var(ACCESS_TOKEN_VAR_NAME).unwrap_or_default();
        }
        if self.access_token.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "access token can't be empty (set access_token or the ACCESS_TOKEN variable)"
                    .into(),
            ));
        }

        Ok(())
    }

    pub fn tracking_interval(&self) -> Option<Duration> {
        match self.tracking_interval_ms {
            Some(ms) if ms > 0 => Some(Duration::from_millis(ms)),
            _ => None,
        }
    }

    pub fn max_buffer_wait(&self) -> Duration {
        Duration::from_millis(self.max_buffer_wait_ms)
    }
}

/// Configuration for the polling connector.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Interval in milliseconds between source scans. Zero means a single
    /// push with no recurring scans.
    pub scan_interval_ms: u64,
}

impl PollingConfig {
    pub fn scan_interval(&self) -> Option<Duration> {
        if self.scan_interval_ms > 0 {
            Some(Duration::from_millis(self.scan_interval_ms))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> ConnectorConfig {
        ConnectorConfig {
            tenant_id: "tenant".into(),
            index_id: "index".into(),
            endpoint: "http://localhost:9600".into(),
            access_token: "token".into(),
            ..ConnectorConfig::default()
        }
    }

    #[test]
    fn a_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn zero_batch_count_defaults_to_one_thousand() {
        let mut config = valid_config();
        config.max_batch_count = 0;
        config.validate().unwrap();
        assert_eq!(config.max_batch_count, 1000);
    }

    #[test]
    fn out_of_range_limits_fail_fast() {
        for mutate in [
            (|c: &mut ConnectorConfig| c.max_batch_count = 10_000) as fn(&mut ConnectorConfig),
            |c| c.max_request_size = 250 * 1024 * 1024,
            |c| c.max_concurrent_requests = 0,
            |c| c.max_concurrent_requests = 1000,
            |c| c.retry_count = 0,
            |c| c.retry_count = 10,
            |c| c.max_buffer_wait_ms = 3_600_000,
            |c| c.request_log = RequestLogLevel::DeadletterOnly,
        ] {
            let mut config = valid_config();
            mutate(&mut config);
            assert!(config.validate().is_err());
        }
    }

    #[test]
    fn request_log_requires_a_location() {
        let mut config = valid_config();
        config.request_log = RequestLogLevel::All;
        config.request_log_location = Some(PathBuf::from("/tmp/ingest-connector"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn tracking_interval_of_zero_is_disabled() {
        let mut config = valid_config();
        config.tracking_interval_ms = Some(0);
        assert!(config.tracking_interval().is_none());
        config.tracking_interval_ms = Some(30_000);
        assert_eq!(
            config.tracking_interval(),
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn parses_a_toml_document() {
        let doc = r#"
            tenant_id = "t1"
            index_id = "i1"
            endpoint = "http://localhost:9600"
            access_token = "secret"
            push_format = "ndjson"
            max_batch_count = 500
            tracking_interval_ms = 60000
        "#;
        let mut config: ConnectorConfig = toml::from_str(doc).unwrap();
        config.validate().unwrap();
        assert_eq!(config.push_format, Format::NdJson);
        assert_eq!(config.max_batch_count, 500);
        assert_eq!(config.tracking_interval(), Some(Duration::from_secs(60)));
    }
}
