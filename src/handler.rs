use serde_json::Value;
use thiserror::Error;

use crate::record::RecordError;

/// Errors surfaced to callers of [`RecordSink::write`].
///
/// Transport failures are never reported here; they are absorbed by the
/// reconnect loop and only show up in diagnostics.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SinkError {
    /// The record failed validation; nothing was queued.
    #[error(transparent)]
    Invalid(#[from] RecordError),
    /// The sink has been shut down.
    #[error("sink is closed")]
    Closed,
}

/// Capability implemented by record sinks.
///
/// Sinks are `Send + Sync` so one instance can be shared by every thread
/// producing records. `write` must never block on the network.
pub trait RecordSink: Send + Sync {
    /// Validate and forward a single structured record.
    fn write(&self, record: Value) -> Result<(), SinkError>;

    /// Flush and close the transport; stop reconnecting.
    fn end(&mut self);

    /// Close the transport immediately, discarding anything not yet written.
    fn destroy(&mut self);
}
