mod buffered;
mod simple;

pub use buffered::BufferedPusher;
pub use simple::SimplePusher;

use crate::audit::RequestLog;
use crate::client::{ClientError, IngestionApi, IngestionClient};
use crate::config::{ConfigError, ConnectorConfig};
use crate::encode::Encoder;
use crate::pipeline::{BoundedDispatcher, StatusTracker, TrackerError};
use crate::source::DataSource;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PushError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Tracker(#[from] TrackerError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Drains a data source into the remote index. The polling connector drives
/// this on its scan cadence.
#[async_trait]
pub trait DataPusher: Send + Sync {
    async fn push(&self, source: &mut dyn DataSource) -> Result<(), PushError>;
}

/// The pieces both pushers assemble from the configuration: the retrying
/// client, the status tracker, the bounded dispatch pool and the encoder.
pub(crate) struct PusherCore {
    pub(crate) client: Arc<IngestionClient>,
    pub(crate) tracker: Arc<StatusTracker>,
    pub(crate) dispatcher: Arc<BoundedDispatcher>,
    pub(crate) encoder: Encoder,
    pub(crate) max_batch_count: usize,
    pub(crate) max_request_size: usize,
}

impl PusherCore {
    pub(crate) async fn build(
        config: &ConnectorConfig,
        api: Arc<dyn IngestionApi>,
    ) -> Result<Self, PushError> {
        let mut config = config.clone();
        config.validate()?;

        let audit = Arc::new(RequestLog::new(
            config.request_log_location.as_deref(),
            config.request_log,
        )?);
        let client = Arc::new(IngestionClient::new(api, config.retry_count, audit.clone())?);
        let tracker = Arc::new(
            StatusTracker::new(client.clone(), config.tracking_interval(), audit).await?,
        );
        let dispatcher = Arc::new(BoundedDispatcher::new(
            config.max_concurrent_requests as usize,
        )?);

        Ok(Self {
            client,
            tracker,
            dispatcher,
            encoder: Encoder::new(config.push_format),
            max_batch_count: config.max_batch_count as usize,
            max_request_size: config.max_request_size as usize,
        })
    }
}
