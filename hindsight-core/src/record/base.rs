//! Records for logging.
use crate::error::HerError;
use std::collections::{
    hash_map::{IntoIter, Iter, Keys},
    HashMap,
};

/// Represents possible types of values that can be stored in a [`Record`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    /// A single floating-point value, typically used for metrics like loss.
    Scalar(f32),

    /// A 1-dimensional array of floating-point values.
    Array1(Vec<f32>),

    /// A text value.
    String(String),
}

/// A container for storing key-value pairs of various data types.
#[derive(Debug, Clone, Default)]
pub struct Record(HashMap<String, RecordValue>);

impl Record {
    /// Creates an empty record.
    pub fn empty() -> Self {
        Self(HashMap::new())
    }

    /// Creates a record containing a single scalar value.
    pub fn from_scalar(name: impl Into<String>, value: f32) -> Self {
        Self(HashMap::from([(name.into(), RecordValue::Scalar(value))]))
    }

    /// Creates a record from a slice of key-value pairs.
    pub fn from_slice<K: Into<String> + Clone>(s: &[(K, RecordValue)]) -> Self {
        Self(
            s.iter()
                .map(|(k, v)| (k.clone().into(), v.clone()))
                .collect(),
        )
    }

    /// Returns an iterator over the keys in the record.
    pub fn keys(&self) -> Keys<String, RecordValue> {
        self.0.keys()
    }

    /// Inserts a key-value pair into the record.
    pub fn insert(&mut self, k: impl Into<String>, v: RecordValue) {
        self.0.insert(k.into(), v);
    }

    /// Returns an iterator over the key-value pairs in the record.
    pub fn iter(&self) -> Iter<'_, String, RecordValue> {
        self.0.iter()
    }

    /// Returns an iterator that consumes the record.
    pub fn into_iter_in_record(self) -> IntoIter<String, RecordValue> {
        self.0.into_iter()
    }

    /// Gets a reference to the value associated with the given key.
    pub fn get(&self, k: &str) -> Option<&RecordValue> {
        self.0.get(k)
    }

    /// Merges two records, consuming both.
    ///
    /// Values of `record` overwrite values of `self` with the same key.
    pub fn merge(self, record: Record) -> Self {
        Record(self.0.into_iter().chain(record.0).collect())
    }

    /// Merges another record into this one in place.
    pub fn merge_inplace(&mut self, record: Record) {
        self.0.extend(record.0);
    }

    /// Gets a scalar value from the record.
    pub fn get_scalar(&self, k: &str) -> Result<f32, HerError> {
        match self.0.get(k) {
            Some(RecordValue::Scalar(v)) => Ok(*v),
            Some(_) => Err(HerError::RecordValueTypeError("Scalar".to_string())),
            None => Err(HerError::RecordKeyError(k.to_string())),
        }
    }

    /// Gets a 1-dimensional array from the record.
    pub fn get_array1(&self, k: &str) -> Result<Vec<f32>, HerError> {
        match self.0.get(k) {
            Some(RecordValue::Array1(v)) => Ok(v.clone()),
            Some(_) => Err(HerError::RecordValueTypeError("Array1".to_string())),
            None => Err(HerError::RecordKeyError(k.to_string())),
        }
    }

    /// Gets a string value from the record.
    pub fn get_string(&self, k: &str) -> Result<String, HerError> {
        match self.0.get(k) {
            Some(RecordValue::String(s)) => Ok(s.clone()),
            Some(_) => Err(HerError::RecordValueTypeError("String".to_string())),
            None => Err(HerError::RecordKeyError(k.to_string())),
        }
    }

    /// Checks if the record is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_and_getters() {
        let r1 = Record::from_scalar("loss_critic", 1.0);
        let r2 = Record::from_slice(&[
            ("loss_critic", RecordValue::Scalar(2.0)),
            ("env", RecordValue::String("point".to_string())),
        ]);
        let r = r1.merge(r2);
        assert_eq!(r.get_scalar("loss_critic").unwrap(), 2.0);
        assert_eq!(r.get_string("env").unwrap(), "point");
        assert!(matches!(
            r.get_scalar("env"),
            Err(HerError::RecordValueTypeError(_))
        ));
        assert!(matches!(
            r.get_array1("missing"),
            Err(HerError::RecordKeyError(_))
        ));
    }
}
