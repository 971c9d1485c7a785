use super::{BatchAccumulator, BoundedDispatcher};
use crate::domain::Record;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

type Processor = Arc<dyn Fn(Vec<Record>) -> BoxFuture<'static, ()> + Send + Sync>;

/// Buffers incoming records and dispatches completed batches through the
/// bounded pool, with two independent flush triggers: the accumulator
/// filling (count or size), and a maximum wait elapsing since the last
/// addition.
///
/// The flush timer is a one-shot alarm, not a recurring tick: every `add`
/// disarms it, and it is re-armed only when the add left records
/// accumulating. Disarm-and-re-arm happens atomically with the accumulator
/// mutation (an epoch counter taken under the batch lock), so a firing timer
/// can never race a concurrent add into double-flushing.
pub struct BufferedSender {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<State>,
    dispatcher: Arc<BoundedDispatcher>,
    processor: Processor,
    max_wait: Duration,
}

struct State {
    list: BatchAccumulator,
    epoch: u64,
}

impl BufferedSender {
    pub fn new<F, Fut>(
        max_wait: Duration,
        dispatcher: Arc<BoundedDispatcher>,
        list: BatchAccumulator,
        processor: F,
    ) -> Self
    where
        F: Fn(Vec<Record>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State { list, epoch: 0 }),
                dispatcher,
                processor: Arc::new(move |batch| Box::pin(processor(batch))),
                max_wait,
            }),
        }
    }

    /// Appends a record. If that completed a batch it is dispatched (waiting
    /// for pool capacity - backpressure reaches the caller here); otherwise
    /// the flush timer is re-armed.
    pub async fn add(&self, record: Record) {
        let (batch, armed) = {
            let mut state = self.inner.state.lock().await;
            state.epoch += 1;
            let batch = state.list.add(record);
            let armed = batch.is_none().then_some(state.epoch);
            (batch, armed)
        };

        if let Some(batch) = batch {
            self.inner.dispatch(batch).await;
        }
        if let Some(epoch) = armed {
            Inner::arm_timer(self.inner.clone(), epoch);
        }
    }

    pub async fn add_range(&self, records: impl IntoIterator<Item = Record>) {
        for record in records {
            self.add(record).await;
        }
    }

    /// Force-flushes whatever is accumulated, regardless of thresholds; used
    /// on shutdown.
    pub async fn flush(&self) {
        let batch = {
            let mut state = self.inner.state.lock().await;
            state.epoch += 1;
            state.list.flush()
        };
        if !batch.is_empty() {
            self.inner.dispatch(batch).await;
        }
    }
}

impl Inner {
    async fn dispatch(&self, batch: Vec<Record>) {
        self.dispatcher.submit((self.processor)(batch)).await;
    }

    fn arm_timer(inner: Arc<Inner>, epoch: u64) {
        tokio::spawn(async move {
            tokio::time::sleep(inner.max_wait).await;

            let batch = {
                let mut state = inner.state.lock().await;
                if state.epoch != epoch {
                    // A later add disarmed this alarm.
                    return;
                }
                state.epoch += 1;
                state.list.flush()
            };

            if !batch.is_empty() {
                inner.dispatch(batch).await;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::{Encoder, Format};
    use parking_lot::Mutex as PlMutex;
    use serde_json::json;

    fn record(n: u64) -> Record {
        let mut r = Record::new();
        r.insert("n".to_string(), json!(n));
        r
    }

    struct Harness {
        sender: BufferedSender,
        dispatcher: Arc<BoundedDispatcher>,
        batches: Arc<PlMutex<Vec<Vec<Record>>>>,
    }

    fn harness(max_records: usize, max_wait: Duration) -> Harness {
        let dispatcher = Arc::new(BoundedDispatcher::new(2).unwrap());
        let batches: Arc<PlMutex<Vec<Vec<Record>>>> = Arc::default();
        let sink = batches.clone();
        let sender = BufferedSender::new(
            max_wait,
            dispatcher.clone(),
            BatchAccumulator::new(max_records, 0, Encoder::new(Format::JsonArray)),
            move |batch| {
                let sink = sink.clone();
                async move {
                    sink.lock().push(batch);
                }
            },
        );
        Harness {
            sender,
            dispatcher,
            batches,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn a_full_accumulator_dispatches_immediately() {
        let h = harness(3, Duration::from_secs(60));

        for n in 0..3 {
            h.sender.add(record(n)).await;
        }
        h.dispatcher.wait_all().await;

        let batches = h.batches.lock();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn the_timer_flushes_a_partial_batch() {
        let h = harness(100, Duration::from_millis(500));

        h.sender.add(record(1)).await;
        h.sender.add(record(2)).await;
        assert!(h.batches.lock().is_empty());

        tokio::time::sleep(Duration::from_millis(600)).await;
        h.dispatcher.wait_all().await;

        let batches = h.batches.lock();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn every_add_pushes_the_deadline_out() {
        let h = harness(100, Duration::from_millis(500));

        h.sender.add(record(1)).await;
        tokio::time::sleep(Duration::from_millis(400)).await;
        h.sender.add(record(2)).await;
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(
            h.batches.lock().is_empty(),
            "the alarm must restart on every add"
        );

        tokio::time::sleep(Duration::from_millis(200)).await;
        h.dispatcher.wait_all().await;
        assert_eq!(h.batches.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn add_range_dispatches_full_batches_and_times_out_the_rest() {
        let h = harness(5, Duration::from_millis(500));

        h.sender.add_range((0..8).map(record)).await;
        h.dispatcher.wait_all().await;
        assert_eq!(h.batches.lock().len(), 1);
        assert_eq!(h.batches.lock()[0].len(), 5);

        tokio::time::sleep(Duration::from_millis(600)).await;
        h.dispatcher.wait_all().await;
        let batches = h.batches.lock();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[1].len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_drains_the_buffer_without_waiting() {
        let h = harness(100, Duration::from_secs(60));

        h.sender.add(record(1)).await;
        h.sender.flush().await;
        h.dispatcher.wait_all().await;

        assert_eq!(h.batches.lock().len(), 1);

        // Nothing left for the timer to flush later.
        tokio::time::sleep(Duration::from_secs(120)).await;
        h.dispatcher.wait_all().await;
        assert_eq!(h.batches.lock().len(), 1);
    }
}
