use super::{DataPusher, PushError, PusherCore};
use crate::client::{HttpClientConfig, HttpIngestionClient, IngestionApi, IngestionClient};
use crate::config::ConnectorConfig;
use crate::domain::DataPoint;
use crate::encode::Encoder;
use crate::pipeline::{
    BatchAccumulator, BoundedDispatcher, CheckpointSequencer, StatusTracker,
};
use crate::source::{CheckpointStore, DataSource};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// The checkpointed pusher: reads everything the source has since the current
/// checkpoint, cuts batches, dispatches them under the bounded pool and only
/// advances the durable checkpoint once every earlier batch was accepted.
pub struct SimplePusher {
    client: Arc<IngestionClient>,
    tracker: Arc<StatusTracker>,
    dispatcher: Arc<BoundedDispatcher>,
    sequencer: Arc<CheckpointSequencer>,
    encoder: Encoder,
    max_batch_count: usize,
    max_request_size: usize,
    shutdown: CancellationToken,
    tracker_task: Mutex<Option<JoinHandle<()>>>,
}

impl SimplePusher {
    pub async fn new(
        config: &ConnectorConfig,
        api: Arc<dyn IngestionApi>,
        store: Arc<dyn CheckpointStore>,
    ) -> Result<Self, PushError> {
        let core = PusherCore::build(config, api).await?;
        let shutdown = CancellationToken::new();
        let tracker_task = Mutex::new(core.tracker.start(shutdown.clone()));

        Ok(Self {
            client: core.client,
            tracker: core.tracker,
            dispatcher: core.dispatcher,
            sequencer: Arc::new(CheckpointSequencer::new(store)),
            encoder: core.encoder,
            max_batch_count: core.max_batch_count,
            max_request_size: core.max_request_size,
            shutdown,
            tracker_task,
        })
    }

    /// Builds the pusher over the HTTP transport described by the
    /// configuration.
    pub async fn connect(
        config: &ConnectorConfig,
        store: Arc<dyn CheckpointStore>,
    ) -> Result<Self, PushError> {
        let api = HttpIngestionClient::new(HttpClientConfig::from_connector(config))?;
        Self::new(config, Arc::new(api), store).await
    }

    pub fn tracker(&self) -> &StatusTracker {
        &self.tracker
    }

    /// Waits for every in-flight dispatch to finish.
    pub async fn wait_idle(&self) {
        self.dispatcher.wait_all().await;
    }

    /// Drains in-flight dispatches and stops the status-tracking cadence.
    pub async fn shutdown(&self) {
        self.dispatcher.wait_all().await;
        self.shutdown.cancel();
        let task = self.tracker_task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "status tracker task failed during shutdown");
            }
        }
    }

    /// Registers the batch's checkpoint marker, then hands the batch to the
    /// pool. The marker is accepted only if the push succeeds; a failed push
    /// leaves it pending, which stalls every later marker on purpose.
    async fn dispatch(&self, batch: Vec<crate::domain::Record>, marker: Option<String>) {
        if let Some(marker) = &marker {
            self.sequencer.pending(marker);
        }

        let body = self.encoder.encode_batch(&batch);
        let client = self.client.clone();
        let tracker = self.tracker.clone();
        let sequencer = self.sequencer.clone();

        self.dispatcher
            .submit(async move {
                match client.push_update(&body).await {
                    Ok(response) => {
                        tracker.add(&response.update_id, &batch);
                        if let Some(marker) = &marker {
                            sequencer.accept(marker);
                        }
                    }
                    Err(e) => warn!(
                        records = batch.len(),
                        error = %e,
                        "batch push failed, the checkpoint will not advance past it"
                    ),
                }
            })
            .await;
    }
}

#[async_trait]
impl DataPusher for SimplePusher {
    async fn push(&self, source: &mut dyn DataSource) -> Result<(), PushError> {
        let mut batches =
            BatchAccumulator::new(self.max_batch_count, self.max_request_size, self.encoder);
        // Marker of the most recent record handed to the accumulator. A batch
        // carries the marker seen before the record that triggered its cut.
        let mut latest: Option<String> = None;
        let mut total = 0usize;

        let mut points = source.read_next(self.sequencer.store().as_ref());
        while let Some(point) = points.next() {
            let DataPoint {
                record, checkpoint, ..
            } = point;
            total += 1;
            if let Some(batch) = batches.add(record) {
                self.dispatch(batch, latest.clone()).await;
            }
            latest = Some(checkpoint);
        }
        drop(points);

        let remainder = batches.flush();
        if !remainder.is_empty() {
            self.dispatch(remainder, latest).await;
        }

        info!(records = total, "finished scanning the source");
        Ok(())
    }
}
