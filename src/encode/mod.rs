mod delimited;
mod json;

use crate::domain::Record;
use serde::{Deserialize, Serialize};

/// The wire format to use when pushing batches to the ingestion endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// A JSON array of objects.
    #[default]
    JsonArray,
    /// Newline-delimited JSON objects.
    NdJson,
    /// Comma-separated values.
    Csv,
    /// Tab-separated values.
    Tsv,
}

/// Serializes records and batches in the selected [`Format`], and exposes the
/// fixed overhead constants the batch accumulator budgets with.
///
/// `batch_overhead` is the number of bytes added around any number of
/// serialized records (the square brackets for a JSON array); `record_overhead`
/// is the bytes added per record for concatenation (the comma, or a newline).
#[derive(Debug, Clone, Copy)]
pub struct Encoder {
    format: Format,
}

impl Encoder {
    pub fn new(format: Format) -> Self {
        Self { format }
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn batch_overhead(&self) -> usize {
        match self.format {
            Format::JsonArray => 2,
            Format::NdJson | Format::Csv | Format::Tsv => 0,
        }
    }

    pub fn record_overhead(&self) -> usize {
        match self.format {
            Format::JsonArray => 1,
            // Newline separator.
            Format::NdJson | Format::Csv | Format::Tsv => 1,
        }
    }

    pub fn encode_record(&self, record: &Record) -> String {
        match self.format {
            Format::JsonArray | Format::NdJson => json::encode_record(record),
            Format::Csv => delimited::encode_csv_record(record),
            Format::Tsv => delimited::encode_tsv_record(record),
        }
    }

    pub fn encode_batch(&self, records: &[Record]) -> String {
        match self.format {
            Format::JsonArray => json::encode_array(records),
            Format::NdJson => join_lines(records, json::encode_record),
            Format::Csv => join_lines(records, delimited::encode_csv_record),
            Format::Tsv => join_lines(records, delimited::encode_tsv_record),
        }
    }
}

fn join_lines(records: &[Record], encode: impl Fn(&Record) -> String) -> String {
    records
        .iter()
        .map(encode)
        .collect::<Vec<_>>()
        .join("\n")
}
