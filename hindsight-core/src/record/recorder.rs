use super::Record;

/// Writes records to an output destination.
///
/// Records given to [`Recorder::store`] are kept until [`Recorder::flush`],
/// which writes their aggregation at the given step.
pub trait Recorder {
    /// Write a record to the [`Recorder`].
    fn write(&mut self, record: Record);

    /// Store the record for later aggregation.
    fn store(&mut self, record: Record);

    /// Writes values aggregated from the stored records.
    fn flush(&mut self, step: i64);
}
