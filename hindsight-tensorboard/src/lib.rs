//! TensorBoard recorder.
use hindsight_core::record::{Record, RecordStorage, RecordValue, Recorder};
use log::warn;
use std::path::Path;
use tensorboard_rs::summary_writer::SummaryWriter;

/// Write records to TFRecord.
///
/// Every record must have a scalar under the step key, `env_steps` by default.
/// Aggregated records written by [`Recorder::flush`] get the step automatically.
pub struct TensorboardRecorder {
    writer: SummaryWriter,
    step_key: String,
    storage: RecordStorage,
}

impl TensorboardRecorder {
    /// Construct a [`TensorboardRecorder`].
    ///
    /// TFRecord will be stored in `logdir`.
    pub fn new<P: AsRef<Path>>(logdir: P) -> Self {
        Self {
            writer: SummaryWriter::new(logdir),
            step_key: "env_steps".to_string(),
            storage: RecordStorage::new(),
        }
    }

    /// Sets the key of the step value in records.
    pub fn step_key(mut self, key: impl Into<String>) -> Self {
        self.step_key = key.into();
        self
    }
}

impl Recorder for TensorboardRecorder {
    /// Write a given [`Record`] into a TFRecord.
    ///
    /// Only [`RecordValue::Scalar`] is written, other variants are discarded.
    fn write(&mut self, record: Record) {
        let step = match record.get_scalar(&self.step_key) {
            Ok(v) => v as usize,
            Err(e) => {
                warn!("Record without step is discarded: {}", e);
                return;
            }
        };

        for (k, v) in record.iter() {
            if *k != self.step_key {
                match v {
                    RecordValue::Scalar(v) => self.writer.add_scalar(k, *v, step),
                    RecordValue::Array1(_) | RecordValue::String(_) => {}
                };
            }
        }
    }

    fn store(&mut self, record: Record) {
        self.storage.store(record);
    }

    fn flush(&mut self, step: i64) {
        let mut record = self.storage.aggregate();
        if !record.is_empty() {
            record.insert(self.step_key.clone(), RecordValue::Scalar(step as f32));
            self.write(record);
        }
        self.writer.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempdir::TempDir;

    #[test]
    fn test_write_event_file() -> Result<()> {
        let dir = TempDir::new("tensorboard_recorder")?;
        let mut recorder = TensorboardRecorder::new(dir.path());
        recorder.store(Record::from_scalar("loss_critic", 1.0));
        recorder.store(Record::from_scalar("loss_critic", 2.0));
        recorder.flush(100);
        recorder.write(Record::from_scalar("eval_mean", -3.0));
        recorder.flush(200);

        let n_files = std::fs::read_dir(dir.path())?.count();
        assert!(n_files > 0);
        Ok(())
    }
}
