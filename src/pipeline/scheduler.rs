use crate::config::ConfigError;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Minimum cadence; ticking faster than this is a configuration error.
const MIN_INTERVAL: Duration = Duration::from_millis(10);

/// Runs an action no more often than every `interval`, never overlapping
/// itself: a tick that fires while the previous invocation is still running
/// is skipped, not queued. Cancellation is observed between ticks, and the
/// last started invocation is awaited before the run returns.
pub struct RecurringScheduler {
    interval: Duration,
}

impl RecurringScheduler {
    pub fn new(interval: Duration) -> Result<Self, ConfigError> {
        if interval <= MIN_INTERVAL {
            return Err(ConfigError::InvalidConfig(
                "the cadence cannot be 10ms or less".into(),
            ));
        }
        debug!(interval_ms = interval.as_millis() as u64, "created recurring scheduler");
        Ok(Self { interval })
    }

    pub async fn run<F, Fut>(&self, mut action: F, cancellation: CancellationToken)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        info!(
            interval_ms = self.interval.as_millis() as u64,
            "starting recurring scheduler"
        );

        let mut current: Option<JoinHandle<()>> = None;
        loop {
            tokio::select! {
                () = cancellation.cancelled() => break,
                () = tokio::time::sleep(self.interval) => {}
            }

            if cancellation.is_cancelled() {
                break;
            }

            let still_running = current.as_ref().is_some_and(|h| !h.is_finished());
            if still_running {
                debug!("previous invocation still running, skipping this tick");
            } else {
                current = Some(tokio::spawn(action()));
            }
        }

        if let Some(handle) = current {
            if let Err(e) = handle.await {
                error!(error = %e, "scheduled action aborted");
            }
        }
    }
}
