use crate::config::ConfigError;
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

/// Bounded retries with pure exponential backoff: the delay starts at
/// `initial_backoff` and doubles after every failed attempt, with no jitter
/// and no cap - callers choose bounds that keep the total reasonable.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration) -> Result<Self, ConfigError> {
        if max_attempts == 0 {
            return Err(ConfigError::InvalidConfig(
                "the maximum number of attempts has to be greater than zero".into(),
            ));
        }
        if initial_backoff.is_zero() {
            return Err(ConfigError::InvalidConfig(
                "the initial backoff has to be greater than zero".into(),
            ));
        }
        Ok(Self {
            max_attempts,
            initial_backoff,
        })
    }

    /// Invokes `op` until it succeeds or the attempt budget is exhausted, in
    /// which case the last error is returned.
    pub async fn run<T, E, F, Fut>(&self, op: F) -> Result<T, E>
    where
        E: std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run_filtered(op, |_| true).await
    }

    /// Like [`RetryPolicy::run`], with a classifier deciding per failure
    /// whether retrying is worthwhile; a `false` aborts the remaining
    /// attempts and returns that failure immediately.
    pub async fn run_filtered<T, E, F, Fut>(
        &self,
        mut op: F,
        mut should_retry: impl FnMut(&E) -> bool,
    ) -> Result<T, E>
    where
        E: std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut backoff = self.initial_backoff;
        for attempt in 0..self.max_attempts {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if !should_retry(&e) {
                        return Err(e);
                    }
                    if attempt == self.max_attempts - 1 {
                        error!(error = %e, "failed all attempts to perform the action");
                        return Err(e);
                    }
                    warn!(
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "failed attempt, retrying after backoff"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
            }
        }
        unreachable!("max_attempts is validated to be non-zero")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[test]
    fn zero_attempts_or_zero_backoff_are_rejected() {
        assert!(RetryPolicy::new(0, Duration::from_millis(100)).is_err());
        assert!(RetryPolicy::new(3, Duration::ZERO).is_err());
        assert!(RetryPolicy::new(1, Duration::from_millis(1)).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_k_failures_with_doubling_backoff() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100)).unwrap();
        let calls = Arc::new(AtomicU32::new(0));
        let start = Instant::now();

        let result: Result<&str, String> = policy
            .run(|| {
                let calls = calls.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 3 {
                        Err("transient".to_string())
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        // Three failures: backoffs of 100, 200, and 400 ms.
        assert_eq!(start.elapsed(), Duration::from_millis(700));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausting_the_budget_returns_the_last_error() {
        let policy = RetryPolicy::new(3, Duration::from_millis(10)).unwrap();
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<(), String> = policy
            .run(|| {
                let calls = calls.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    Err(format!("failure {n}"))
                }
            })
            .await;

        assert_eq!(result.unwrap_err(), "failure 2");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn a_fatal_classification_aborts_immediately() {
        let policy = RetryPolicy::new(5, Duration::from_millis(10)).unwrap();
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<(), &str> = policy
            .run_filtered(
                || {
                    let calls = calls.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Err("bad request")
                    }
                },
                |_| false,
            )
            .await;

        assert_eq!(result.unwrap_err(), "bad request");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn success_on_first_attempt_sleeps_nowhere() {
        let policy = RetryPolicy::new(3, Duration::from_secs(10)).unwrap();
        let start = Instant::now();

        let result: Result<u32, String> = policy.run(|| async { Ok(7) }).await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
