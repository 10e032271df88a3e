//! Filtering trait for log records.
//!
//! Defines [`RecordFilter`] which lets the application decide whether a
//! [`LogRecord`] should be forwarded to the collector at all.

use crate::record::LogRecord;

/// Trait implemented by all record filters.
///
/// Filters are `Send + Sync` so they can be shared with the sink from any
/// thread.
pub trait RecordFilter: Send + Sync {
    /// Return `true` if `record` should be sent.
    fn should_send(&self, record: &LogRecord) -> bool;
}

impl<F> RecordFilter for F
where
    F: Fn(&LogRecord) -> bool + Send + Sync,
{
    fn should_send(&self, record: &LogRecord) -> bool {
        self(record)
    }
}
