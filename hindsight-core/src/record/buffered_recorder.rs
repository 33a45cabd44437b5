use super::{Record, RecordStorage, RecordValue, Recorder};

/// Keeps written records in memory.
///
/// Flushed aggregations are written into the same buffer with the step
/// under the key `env_steps`.
#[derive(Default)]
pub struct BufferedRecorder {
    buf: Vec<Record>,
    storage: RecordStorage,
}

impl BufferedRecorder {
    /// Construct the recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns an iterator over the records.
    pub fn iter(&self) -> std::slice::Iter<Record> {
        self.buf.iter()
    }

    /// Returns the values of a scalar over the written records, in order.
    pub fn scalars(&self, key: &str) -> Vec<f32> {
        self.buf
            .iter()
            .filter_map(|r| r.get_scalar(key).ok())
            .collect()
    }
}

impl Recorder for BufferedRecorder {
    fn write(&mut self, record: Record) {
        self.buf.push(record);
    }

    fn store(&mut self, record: Record) {
        self.storage.store(record);
    }

    fn flush(&mut self, step: i64) {
        let mut record = self.storage.aggregate();
        if !record.is_empty() {
            record.insert("env_steps", RecordValue::Scalar(step as f32));
            self.write(record);
        }
    }
}
