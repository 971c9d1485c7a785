pub mod batch;
pub mod buffered;
pub mod checkpoint;
pub mod dispatch;
pub mod retry;
pub mod scheduler;
pub mod tracker;

pub use batch::BatchAccumulator;
pub use buffered::BufferedSender;
pub use checkpoint::CheckpointSequencer;
pub use dispatch::BoundedDispatcher;
pub use retry::RetryPolicy;
pub use scheduler::RecurringScheduler;
pub use tracker::{StatusTracker, TrackerError};
