//! Resilient forwarding of structured log records to a Fluent collector.
//!
//! [`FluentSink`] accepts JSON-shaped records, encodes each one as a
//! `[tag, time, payload]` packet and writes it to a persistent TCP
//! connection. Collector outages never block or fail the caller: records
//! written while disconnected are counted and dropped, and the connection is
//! re-established with exponential backoff.

pub mod builder;
pub mod diagnostics;
pub mod filter;
mod handler;
pub mod rate_limited_warner;
pub mod record;
pub mod sink;

#[cfg(test)]
mod test_utils;

pub use builder::{SinkBuildError, SinkBuilder};
pub use diagnostics::{Diagnostics, LogDiagnostics};
pub use filter::RecordFilter;
pub use handler::{RecordSink, SinkError};
pub use record::{LogRecord, RecordError};
pub use sink::{
    CloseMode, ConnectionState, FluentSink, PayloadLayout, RetryPolicy, SinkConfig, SinkOptions,
    SinkStats, WireFormat,
};
