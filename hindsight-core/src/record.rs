//! Types and traits for recording training metrics.
//!
//! * [`Record`] - A container of key-value pairs
//! * [`RecordValue`] - Types of values stored in a [`Record`]
//! * [`Recorder`] - Interface for writing and aggregating records
//! * [`RecordStorage`] - Aggregation of stored records
//! * [`BufferedRecorder`] - Keeps records in memory
//! * [`NullRecorder`] - Discards all records
//!
//! ```rust
//! use hindsight_core::record::{Record, RecordValue};
//!
//! let mut record = Record::empty();
//! record.insert("episode_return", RecordValue::Scalar(-7.0));
//! record.insert("act", RecordValue::Array1(vec![0.1, -0.2]));
//! assert_eq!(record.get_scalar("episode_return").unwrap(), -7.0);
//! ```
mod base;
mod buffered_recorder;
mod null_recorder;
mod recorder;
mod storage;

pub use base::{Record, RecordValue};
pub use buffered_recorder::BufferedRecorder;
pub use null_recorder::NullRecorder;
pub use recorder::Recorder;
pub use storage::RecordStorage;
