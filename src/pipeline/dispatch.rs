use crate::config::ConfigError;
use std::future::Future;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::error;

/// A fixed-capacity pool of concurrently running dispatch tasks.
///
/// `submit` waits for a slot when the pool is full - this is the system's
/// sole backpressure mechanism, blocking the producer instead of queueing
/// unboundedly. The pool only tracks liveness: a task's failure is its own
/// responsibility, and panics are logged and swallowed here.
pub struct BoundedDispatcher {
    max_tasks: usize,
    tasks: Mutex<JoinSet<()>>,
}

impl BoundedDispatcher {
    pub fn new(max_tasks: usize) -> Result<Self, ConfigError> {
        if max_tasks == 0 {
            return Err(ConfigError::InvalidConfig(
                "dispatcher capacity must be at least 1".into(),
            ));
        }
        Ok(Self {
            max_tasks,
            tasks: Mutex::new(JoinSet::new()),
        })
    }

    /// Starts `task`, first waiting until fewer than the maximum number of
    /// previously submitted tasks remain in flight.
    pub async fn submit<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.tasks.lock().await;
        while tasks.len() >= self.max_tasks {
            if let Some(Err(e)) = tasks.join_next().await {
                error!(error = %e, "dispatched task aborted");
            }
        }
        tasks.spawn(task);
    }

    /// Waits for every previously submitted task to complete.
    pub async fn wait_all(&self) {
        let mut tasks = self.tasks.lock().await;
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "dispatched task aborted");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::oneshot;
    use tokio::time::timeout;

    #[tokio::test]
    async fn capacity_zero_is_rejected() {
        assert!(BoundedDispatcher::new(0).is_err());
    }

    #[tokio::test]
    async fn submit_returns_immediately_when_capacity_is_free() {
        let dispatcher = BoundedDispatcher::new(2).unwrap();
        timeout(Duration::from_millis(100), dispatcher.submit(async {}))
            .await
            .expect("submit with free capacity must not block");
        dispatcher.wait_all().await;
    }

    #[tokio::test]
    async fn submit_blocks_until_a_slot_frees_up() {
        let dispatcher = Arc::new(BoundedDispatcher::new(2).unwrap());
        let (release_tx, release_rx) = oneshot::channel::<()>();
        let (hold_tx, hold_rx) = oneshot::channel::<()>();

        dispatcher
            .submit(async move {
                let _ = release_rx.await;
            })
            .await;
        dispatcher
            .submit(async move {
                let _ = hold_rx.await;
            })
            .await;

        // Pool is full: a third submit must not complete yet.
        let mut blocked = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                dispatcher.submit(async {}).await;
            })
        };
        assert!(
            timeout(Duration::from_millis(100), &mut blocked).await.is_err(),
            "submit must block while the pool is full"
        );

        // Freeing one slot unblocks the pending submit.
        release_tx.send(()).unwrap();
        timeout(Duration::from_secs(1), &mut blocked)
            .await
            .expect("submit must proceed once a task completed")
            .unwrap();

        hold_tx.send(()).unwrap();
        dispatcher.wait_all().await;
    }

    #[tokio::test]
    async fn wait_all_drains_every_task() {
        let dispatcher = BoundedDispatcher::new(4).unwrap();
        let completed = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let completed = completed.clone();
            dispatcher
                .submit(async move {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    completed.fetch_add(1, Ordering::SeqCst);
                })
                .await;
        }

        dispatcher.wait_all().await;
        assert_eq!(completed.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn a_panicking_task_is_swallowed() {
        let dispatcher = BoundedDispatcher::new(1).unwrap();
        dispatcher
            .submit(async {
                panic!("task failure stays inside the pool");
            })
            .await;

        // The failed slot frees up and later work proceeds normally.
        dispatcher.submit(async {}).await;
        dispatcher.wait_all().await;
    }
}
