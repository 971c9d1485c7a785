mod http;

pub use http::{HttpClientConfig, HttpIngestionClient};

use crate::audit::RequestLog;
use crate::config::ConfigError;
use crate::pipeline::RetryPolicy;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

#[cfg(test)]
use mockall::automock;

/// Backoff before the first push/schema retry.
const INITIAL_BACKOFF: Duration = Duration::from_millis(500);

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("HTTP error: {status} - {message}")]
    HttpStatus { status: u16, message: String },
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl ClientError {
    /// Transport-level failures and server-side errors are worth retrying;
    /// anything the server rejected outright is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::NetworkError(_) => true,
            ClientError::HttpStatus { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
            _ => false,
        }
    }
}

/// Response to a successful push: the opaque id to poll completion with.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushResponse {
    pub update_id: String,
}

/// Overall outcome of a dispatched update. Anything other than `InProgress`
/// is terminal and will not change on further polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum UpdateStatus {
    InProgress,
    Succeeded,
    PartiallySucceeded,
    Failed,
    #[serde(other)]
    Unknown,
}

impl UpdateStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, UpdateStatus::InProgress)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum RecordOutcome {
    Succeeded,
    Failed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordStatus {
    pub record_id: String,
    pub status: RecordOutcome,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusResponse {
    pub status: UpdateStatus,
    #[serde(default)]
    pub records: Vec<RecordStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum IndexFieldType {
    Identity,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: IndexFieldType,
}

/// The remote index's declared schema, fetched once at startup to locate the
/// identity field.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexSchema {
    pub fields: Vec<IndexField>,
}

/// The three operations the core needs from the remote ingestion service.
/// Idempotency of pushes is the service's responsibility via update ids.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait IngestionApi: Send + Sync {
    /// Pushes one pre-serialized batch.
    async fn push_update(&self, body: String) -> Result<PushResponse, ClientError>;

    /// Polls the outcome of a previously pushed batch.
    async fn update_status(&self, update_id: &str) -> Result<UpdateStatusResponse, ClientError>;

    /// Fetches the index schema.
    async fn get_schema(&self) -> Result<IndexSchema, ClientError>;
}

/// Wraps the raw transport with retry and request auditing.
///
/// Pushes and schema lookups are retried with doubling backoff; exhausted
/// pushes are dead-lettered. Status polls are best-effort with no retry - a
/// failed poll keeps the update tracked for the next tick.
pub struct IngestionClient {
    api: Arc<dyn IngestionApi>,
    retry: RetryPolicy,
    audit: Arc<RequestLog>,
}

impl IngestionClient {
    pub fn new(
        api: Arc<dyn IngestionApi>,
        max_attempts: u32,
        audit: Arc<RequestLog>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            api,
            retry: RetryPolicy::new(max_attempts, INITIAL_BACKOFF)?,
            audit,
        })
    }

    pub async fn push_update(&self, body: &str) -> Result<PushResponse, ClientError> {
        let result = self
            .retry
            .run_filtered(
                || self.api.push_update(body.to_string()),
                ClientError::is_retryable,
            )
            .await;

        match &result {
            Ok(_) => self.audit.log_success(body),
            Err(_) => self.audit.log_failure(body),
        }

        result
    }

    pub async fn update_status(&self, update_id: &str) -> Result<UpdateStatusResponse, ClientError> {
        match self.api.update_status(update_id).await {
            Ok(response) => Ok(response),
            Err(e) => {
                warn!(update_id, error = %e, "best-effort status poll failed, will retry at next tick");
                Err(e)
            }
        }
    }

    pub async fn get_schema(&self) -> Result<IndexSchema, ClientError> {
        self.retry.run(|| self.api.get_schema()).await
    }
}
