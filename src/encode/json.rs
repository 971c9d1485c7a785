use crate::domain::Record;

pub(super) fn encode_record(record: &Record) -> String {
    serde_json::to_string(record).unwrap_or_else(|e| {
        // A Record is a string-keyed Value map, which always serializes.
        unreachable!("record serialization failed: {e}")
    })
}

pub(super) fn encode_array(records: &[Record]) -> String {
    serde_json::to_string(records)
        .unwrap_or_else(|e| unreachable!("batch serialization failed: {e}"))
}
