#![deny(rust_2018_idioms)]

pub mod audit;
pub mod client;
pub mod config;
pub mod connector;
pub mod domain;
pub mod encode;
pub mod logging;
pub mod pipeline;
pub mod pusher;
pub mod source;

// Re-export main types for easy access
pub use config::{ConnectorConfig, PollingConfig, RequestLogLevel};
pub use connector::PollingConnector;
pub use domain::{DataOperation, DataPoint, Record};
pub use encode::Format;
pub use pusher::{BufferedPusher, DataPusher, SimplePusher};
pub use source::{CheckpointStore, DataSource};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
