//! Aggregation of stored records.
use super::{Record, RecordValue};

/// Stores records and aggregates them.
///
/// Scalars are averaged over the records containing the key. For other
/// value types, the latest value is kept.
#[derive(Default)]
pub struct RecordStorage {
    data: Vec<Record>,
}

fn mean(vs: &[f32]) -> f32 {
    vs.iter().sum::<f32>() / vs.len() as f32
}

impl RecordStorage {
    /// Creates an empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a record.
    pub fn store(&mut self, record: Record) {
        self.data.push(record);
    }

    /// Returns `true` if no record is stored.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Aggregates the stored records and clears the storage.
    pub fn aggregate(&mut self) -> Record {
        let mut scalars: Vec<(String, Vec<f32>)> = Vec::new();
        let mut record = Record::empty();

        for r in self.data.drain(..) {
            for (k, v) in r.into_iter_in_record() {
                match v {
                    RecordValue::Scalar(x) => match scalars.iter_mut().find(|(k_, _)| *k_ == k) {
                        Some((_, xs)) => xs.push(x),
                        None => scalars.push((k, vec![x])),
                    },
                    v => record.insert(k, v),
                }
            }
        }

        for (k, xs) in scalars {
            record.insert(k, RecordValue::Scalar(mean(&xs)));
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate() {
        let mut storage = RecordStorage::new();
        storage.store(Record::from_scalar("loss", 1.0));
        storage.store(Record::from_slice(&[
            ("loss", RecordValue::Scalar(3.0)),
            ("act", RecordValue::Array1(vec![0.5])),
        ]));
        storage.store(Record::from_scalar("eval_mean", -4.0));

        let record = storage.aggregate();
        assert_eq!(record.get_scalar("loss").unwrap(), 2.0);
        assert_eq!(record.get_scalar("eval_mean").unwrap(), -4.0);
        assert_eq!(record.get_array1("act").unwrap(), vec![0.5]);
        assert!(storage.is_empty());
    }
}
