use crate::config::PollingConfig;
use crate::pipeline::RecurringScheduler;
use crate::pusher::{DataPusher, PushError};
use crate::source::DataSource;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Drives a pusher against a data source: one push at startup, then a
/// recurring scan cadence until cancelled. A scan interval of zero means
/// "push once and return".
pub struct PollingConnector<S, P> {
    source: Arc<Mutex<S>>,
    pusher: Arc<P>,
    config: PollingConfig,
}

impl<S, P> PollingConnector<S, P>
where
    S: DataSource + 'static,
    P: DataPusher + 'static,
{
    pub fn new(source: S, pusher: P, config: PollingConfig) -> Self {
        Self {
            source: Arc::new(Mutex::new(source)),
            pusher: Arc::new(pusher),
            config,
        }
    }

    pub fn pusher(&self) -> &P {
        &self.pusher
    }

    /// Runs the connector until the token is cancelled. The initial push is
    /// fatal when it fails; scheduled scans only log their errors and wait
    /// for the next tick.
    pub async fn run(&self, cancellation: CancellationToken) -> Result<(), PushError> {
        self.scan().await?;

        let Some(interval) = self.config.scan_interval() else {
            info!("no scan interval configured, stopping after the initial push");
            return Ok(());
        };

        let scheduler = RecurringScheduler::new(interval)?;
        let source = self.source.clone();
        let pusher = self.pusher.clone();
        scheduler
            .run(
                move || {
                    let source = source.clone();
                    let pusher = pusher.clone();
                    async move {
                        let mut source = source.lock().await;
                        if let Err(e) = pusher.push(&mut *source).await {
                            warn!(error = %e, "scheduled source scan failed");
                        }
                    }
                },
                cancellation,
            )
            .await;

        Ok(())
    }

    async fn scan(&self) -> Result<(), PushError> {
        let mut source = self.source.lock().await;
        self.pusher.push(&mut *source).await
    }
}
