use super::{PushError, PusherCore};
use crate::client::{HttpClientConfig, HttpIngestionClient, IngestionApi};
use crate::config::ConnectorConfig;
use crate::domain::{DataPoint, Record};
use crate::pipeline::{BatchAccumulator, BoundedDispatcher, BufferedSender, StatusTracker};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// The push-mode pusher: the host hands it data points as they happen and the
/// buffered sender cuts batches by count, size or elapsed wait. There is no
/// checkpoint here; hosts that need resumability use [`super::SimplePusher`].
pub struct BufferedPusher {
    sender: BufferedSender,
    tracker: Arc<StatusTracker>,
    dispatcher: Arc<BoundedDispatcher>,
    shutdown: CancellationToken,
    tracker_task: Mutex<Option<JoinHandle<()>>>,
}

impl BufferedPusher {
    pub async fn new(
        config: &ConnectorConfig,
        api: Arc<dyn IngestionApi>,
    ) -> Result<Self, PushError> {
        let core = PusherCore::build(config, api).await?;
        let shutdown = CancellationToken::new();
        let tracker_task = Mutex::new(core.tracker.start(shutdown.clone()));

        let list = BatchAccumulator::new(core.max_batch_count, core.max_request_size, core.encoder);
        let encoder = core.encoder;
        let client = core.client.clone();
        let tracker = core.tracker.clone();
        let sender = BufferedSender::new(
            config.max_buffer_wait(),
            core.dispatcher.clone(),
            list,
            move |batch: Vec<Record>| {
                let client = client.clone();
                let tracker = tracker.clone();
                async move {
                    let body = encoder.encode_batch(&batch);
                    match client.push_update(&body).await {
                        Ok(response) => tracker.add(&response.update_id, &batch),
                        Err(e) => warn!(
                            records = batch.len(),
                            error = %e,
                            "buffered batch push failed"
                        ),
                    }
                }
            },
        );

        Ok(Self {
            sender,
            tracker: core.tracker,
            dispatcher: core.dispatcher,
            shutdown,
            tracker_task,
        })
    }

    /// Builds the pusher over the HTTP transport described by the
    /// configuration.
    pub async fn connect(config: &ConnectorConfig) -> Result<Self, PushError> {
        let api = HttpIngestionClient::new(HttpClientConfig::from_connector(config))?;
        Self::new(config, Arc::new(api)).await
    }

    pub fn tracker(&self) -> &StatusTracker {
        &self.tracker
    }

    /// Buffers the given updates. Backpressure from the dispatch pool reaches
    /// the caller whenever an addition completes a batch.
    pub async fn push(&self, points: impl IntoIterator<Item = DataPoint> + Send) {
        self.sender
            .add_range(points.into_iter().map(|p| p.record))
            .await;
    }

    /// Flushes whatever is buffered, drains in-flight dispatches and stops
    /// the status-tracking cadence.
    pub async fn shutdown(&self) {
        self.sender.flush().await;
        self.dispatcher.wait_all().await;
        self.shutdown.cancel();
        let task = self.tracker_task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "status tracker task failed during shutdown");
            }
        }
    }
}
