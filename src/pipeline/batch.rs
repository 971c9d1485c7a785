use crate::domain::Record;
use crate::encode::Encoder;

/// Accumulates records into count- and size-bounded batches.
///
/// Size is checked *before* a record is appended (the record has to be
/// serialized to be measured, so an oversized accumulation is cut loose
/// first and the record starts the next one); the count limit is checked
/// *after* appending. A `max_bytes` of zero disables size-based cutting.
pub struct BatchAccumulator {
    max_records: usize,
    max_bytes: usize,
    encoder: Encoder,
    records: Vec<Record>,
    current_size: usize,
}

impl BatchAccumulator {
    pub fn new(max_records: usize, max_bytes: usize, encoder: Encoder) -> Self {
        Self {
            max_records,
            max_bytes,
            encoder,
            records: Vec::new(),
            current_size: encoder.batch_overhead(),
        }
    }

    /// Appends a record, returning the batch that completed as a result, if
    /// any. The returned batch never includes `record` when the cut was
    /// size-triggered, and always includes it when count-triggered.
    pub fn add(&mut self, record: Record) -> Option<Vec<Record>> {
        let cost = if self.max_bytes == 0 {
            0
        } else {
            self.encoder.encode_record(&record).len() + self.encoder.record_overhead()
        };

        let over_size = self.max_bytes > 0 && self.current_size + cost >= self.max_bytes;
        let mut completed = None;
        if self.records.len() >= self.max_records || over_size {
            completed = self.take();
        }

        self.current_size += cost;
        self.records.push(record);

        if completed.is_none() && self.records.len() >= self.max_records {
            completed = self.take();
        }

        completed
    }

    /// Cuts loose whatever is currently accumulated (possibly nothing) and
    /// resets; used for time-based and shutdown flushes.
    pub fn flush(&mut self) -> Vec<Record> {
        self.take().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn take(&mut self) -> Option<Vec<Record>> {
        self.current_size = self.encoder.batch_overhead();
        if self.records.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.records))
        }
    }
}
