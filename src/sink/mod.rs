//! Collector-facing sink implementation.
//!
//! This module defines [`FluentSink`], which encodes
//! [`LogRecord`](crate::record::LogRecord) values as `[tag, time, payload]`
//! packets and writes them to a persistent TCP connection. A worker thread
//! owns the connection, reconnects with exponential backoff after every
//! close, and counts records that arrive while no connection is available.

pub(crate) mod backoff;
mod config;
mod encode;
mod handle;
mod state;
mod transport;
mod worker;


pub use backoff::RetryDelay;
pub use config::{
    DEFAULT_CHANNEL_CAPACITY, DEFAULT_CONNECT_TIMEOUT, DEFAULT_HOST, DEFAULT_INITIAL_RETRY,
    DEFAULT_MAX_RETRY, DEFAULT_PORT, DEFAULT_TAG, DEFAULT_WRITE_TIMEOUT, RetryPolicy, SinkConfig,
    SinkOptions,
};
pub use encode::{DEFAULT_WRAP_KEY, EncodeError, PayloadLayout, WireFormat, encode_packet};
pub use handle::FluentSink;
pub use state::{ConnectionManager, ConnectionState, LinkStatus, SinkStats};
pub use transport::CloseMode;
