mod data_point;

pub use data_point::{DataOperation, DataPoint, Record};
