use serde::{Deserialize, Serialize};

/// A single source record: an ordered mapping of field name to value.
///
/// The core treats records as opaque except for the identity field the status
/// tracker resolves from the remote schema. Field order is preserved because
/// the delimited encoders emit values in declaration order.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// The change type that happened to the data. Currently only updates are
/// supported; new records and modifications are both pushed as updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataOperation {
    Update,
}

/// One record as produced by a [`crate::source::DataSource`], tagged with the
/// checkpoint marker valid as of that record.
#[derive(Debug, Clone)]
pub struct DataPoint {
    pub record: Record,
    pub operation: DataOperation,
    pub checkpoint: String,
}

impl DataPoint {
    pub fn update(record: Record, checkpoint: impl Into<String>) -> Self {
        Self {
            record,
            operation: DataOperation::Update,
            checkpoint: checkpoint.into(),
        }
    }
}
