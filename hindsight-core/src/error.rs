//! Errors in the library.
use thiserror::Error;

/// Errors in the library.
#[derive(Error, Debug)]
pub enum HerError {
    /// A caller violated a precondition, e.g. sampling from an empty buffer,
    /// feeding an out-of-bounds action or passing a malformed observation.
    #[error("Precondition error: {0}")]
    Precondition(String),

    /// NaN or Inf appeared in targets, losses or gradients.
    #[error("Numeric instability: {0}")]
    NumericInstability(String),

    /// Checkpoint I/O failed.
    #[error("Resource error: {0}")]
    Resource(String),

    /// Record key error.
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    /// Record value type error.
    #[error("Record value type error: {0}")]
    RecordValueTypeError(String),
}
