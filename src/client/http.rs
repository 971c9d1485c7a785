use super::{ClientError, IndexSchema, IngestionApi, PushResponse, UpdateStatusResponse};
use crate::config::ConnectorConfig;
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, StatusCode};
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub endpoint: String,
    pub tenant_id: String,
    pub index_id: String,
    pub access_token: String,
    pub timeout: Duration,
    pub connection_timeout: Duration,
    pub user_agent: String,
    pub enable_compression: bool,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            tenant_id: String::new(),
            index_id: String::new(),
            access_token: String::new(),
            timeout: Duration::from_secs(30),
            connection_timeout: Duration::from_secs(10),
            user_agent: concat!("ingest-connector/", env!("CARGO_PKG_VERSION")).to_string(),
            enable_compression: true,
        }
    }
}

impl HttpClientConfig {
    pub fn from_connector(config: &ConnectorConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            tenant_id: config.tenant_id.clone(),
            index_id: config.index_id.clone(),
            access_token: config.access_token.clone(),
            ..Self::default()
        }
    }
}

/// Thin HTTP pass-through to the ingestion service. Request construction
/// only; retry and auditing live in [`super::IngestionClient`].
#[derive(Debug, Clone)]
pub struct HttpIngestionClient {
    client: Client,
    index_url: Url,
    access_token: String,
}

impl HttpIngestionClient {
    pub fn new(config: HttpClientConfig) -> Result<Self, ClientError> {
        let endpoint: Url = config.endpoint.parse().map_err(|e| {
            ClientError::InvalidConfiguration(format!("Invalid endpoint URL: {e}"))
        })?;

        let index_url = endpoint
            .join(&format!(
                "v1/tenants/{}/indexes/{}",
                config.tenant_id, config.index_id
            ))
            .map_err(|e| {
                ClientError::InvalidConfiguration(format!("Invalid tenant/index path: {e}"))
            })?;

        let mut builder = ClientBuilder::new()
            .timeout(config.timeout)
            .connect_timeout(config.connection_timeout)
            .user_agent(&config.user_agent);

        if config.enable_compression {
            builder = builder.gzip(true);
        }

        let client = builder.build().map_err(|e| {
            ClientError::InvalidConfiguration(format!("Failed to build HTTP client: {e}"))
        })?;

        Ok(Self {
            client,
            index_url,
            access_token: config.access_token,
        })
    }

    fn url(&self, suffix: &str) -> Url {
        let mut url = self.index_url.clone();
        {
            let mut segments = url.path_segments_mut().unwrap_or_else(|()| {
                // index_url is always a base URL with a path.
                unreachable!("index URL cannot be a base")
            });
            for part in suffix.split('/').filter(|p| !p.is_empty()) {
                segments.push(part);
            }
        }
        url
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .text()
            .await
            .unwrap_or_else(|_| status.canonical_reason().unwrap_or("unknown").to_string());
        Err(ClientError::HttpStatus {
            status: status.as_u16(),
            message,
        })
    }

    fn status_url(&self, update_id: &str) -> Url {
        self.url(&format!("updates/{update_id}/status"))
    }
}

#[async_trait]
impl IngestionApi for HttpIngestionClient {
    async fn push_update(&self, body: String) -> Result<PushResponse, ClientError> {
        let response = self
            .client
            .post(self.url("updates"))
            .bearer_auth(&self.access_token)
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(body)
            .send()
            .await?;

        let response = Self::check(response).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Err(ClientError::MalformedResponse(
                "push accepted without an update id".into(),
            ));
        }
        response
            .json()
            .await
            .map_err(|e| ClientError::MalformedResponse(format!("push response: {e}")))
    }

    async fn update_status(&self, update_id: &str) -> Result<UpdateStatusResponse, ClientError> {
        let response = self
            .client
            .get(self.status_url(update_id))
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| ClientError::MalformedResponse(format!("status response: {e}")))
    }

    async fn get_schema(&self) -> Result<IndexSchema, ClientError> {
        let response = self
            .client
            .get(self.index_url.clone())
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| ClientError::MalformedResponse(format!("schema response: {e}")))
    }
}
