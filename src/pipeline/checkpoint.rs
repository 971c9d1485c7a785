use crate::source::CheckpointStore;
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

struct Entry {
    marker: String,
    acknowledged: bool,
}

#[derive(Default)]
struct State {
    in_order: VecDeque<Entry>,
    registered: HashSet<String>,
}

/// Sequences checkpoint advancement for batches that complete out of order.
///
/// Markers are registered as pending in dispatch order and may be accepted in
/// any order; the persistent store only ever advances to a marker whose every
/// predecessor has also been accepted. When one acceptance unblocks a run of
/// queued markers, the store sees a single write with the most advanced one.
pub struct CheckpointSequencer {
    store: Arc<dyn CheckpointStore>,
    state: Mutex<State>,
}

impl CheckpointSequencer {
    pub fn new(store: Arc<dyn CheckpointStore>) -> Self {
        Self {
            store,
            state: Mutex::new(State::default()),
        }
    }

    pub fn store(&self) -> &Arc<dyn CheckpointStore> {
        &self.store
    }

    /// Registers a marker at the tail of the pending queue. Called once per
    /// dispatched batch, from the producer, in batch-formation order.
    pub fn pending(&self, marker: &str) {
        assert!(!marker.is_empty(), "pending checkpoint cannot be empty");

        let mut state = self.state.lock();
        state.in_order.push_back(Entry {
            marker: marker.to_string(),
            acknowledged: false,
        });
        state.registered.insert(marker.to_string());
    }

    /// Acknowledges a previously registered marker, advancing the persistent
    /// store if the queue head became fully acknowledged.
    ///
    /// # Panics
    ///
    /// Accepting a marker that was never registered is an invariant
    /// violation and panics.
    pub fn accept(&self, marker: &str) {
        assert!(!marker.is_empty(), "accepted checkpoint cannot be empty");

        let advanced = {
            let mut state = self.state.lock();
            assert!(
                state.registered.contains(marker),
                "accepted checkpoint is not found in pending ones: {marker}"
            );

            if let Some(entry) = state.in_order.iter_mut().find(|e| e.marker == marker) {
                entry.acknowledged = true;
            }

            let mut latest = None;
            while state.in_order.front().is_some_and(|e| e.acknowledged) {
                if let Some(entry) = state.in_order.pop_front() {
                    state.registered.remove(&entry.marker);
                    latest = Some(entry.marker);
                }
            }
            latest
        };

        // The store write happens outside the queue lock; it may be durable
        // I/O and the lock is only for queue bookkeeping.
        if let Some(marker) = advanced {
            self.store.accept(&marker);
        }
    }
}
