//! Configuration structures consumed by the sink lifecycle.
//!
//! [`SinkBuilder`](crate::builder::SinkBuilder) constructs these values
//! before passing them to [`FluentSink`](super::FluentSink) for runtime use.

use std::{fmt, sync::Arc, time::Duration};

use serde::Deserialize;

use crate::{diagnostics::Diagnostics, filter::RecordFilter, rate_limited_warner::DEFAULT_WARN_INTERVAL};

use super::encode::{PayloadLayout, WireFormat};

/// Default collector host.
pub const DEFAULT_HOST: &str = "127.0.0.1";
/// Default collector port (Fluent forward input).
pub const DEFAULT_PORT: u16 = 24224;
/// Default tag attached to every packet.
pub const DEFAULT_TAG: &str = "debug";
/// Default bounded channel capacity between callers and the worker.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;
/// Default connection timeout applied when establishing sockets.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default write timeout applied to socket writes.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);
/// Delay before the first reconnect attempt after a close.
pub const DEFAULT_INITIAL_RETRY: Duration = Duration::from_secs(2);
/// Ceiling for the reconnect delay.
pub const DEFAULT_MAX_RETRY: Duration = Duration::from_secs(60);

/// Reconnect delay bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial: Duration,
    pub max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial: DEFAULT_INITIAL_RETRY,
            max: DEFAULT_MAX_RETRY,
        }
    }
}

/// Runtime configuration for a [`FluentSink`](super::FluentSink).
#[derive(Clone)]
pub struct SinkConfig {
    pub host: String,
    pub port: u16,
    pub tag: String,
    pub retry: RetryPolicy,
    pub connect_timeout: Duration,
    pub write_timeout: Duration,
    /// Emit idle notices after this long without socket activity.
    pub idle_timeout: Option<Duration>,
    pub capacity: usize,
    pub layout: PayloadLayout,
    pub format: WireFormat,
    pub warn_interval: Duration,
    pub filter: Option<Arc<dyn RecordFilter>>,
    pub diagnostics: Option<Arc<dyn Diagnostics>>,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT,
            tag: DEFAULT_TAG.into(),
            retry: RetryPolicy::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            idle_timeout: None,
            capacity: DEFAULT_CHANNEL_CAPACITY,
            layout: PayloadLayout::default(),
            format: WireFormat::default(),
            warn_interval: DEFAULT_WARN_INTERVAL,
            filter: None,
            diagnostics: None,
        }
    }
}

impl SinkConfig {
    /// `host:port` as shown in diagnostics.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for SinkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tag", &self.tag)
            .field("retry", &self.retry)
            .field("connect_timeout", &self.connect_timeout)
            .field("write_timeout", &self.write_timeout)
            .field("idle_timeout", &self.idle_timeout)
            .field("capacity", &self.capacity)
            .field("layout", &self.layout)
            .field("format", &self.format)
            .field("filter", &self.filter.is_some())
            .field("diagnostics", &self.diagnostics.is_some())
            .finish()
    }
}

/// Serialisable subset of [`SinkConfig`].
///
/// Hosts embed this in their own configuration files; every field is
/// optional and falls back to the defaults above.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct SinkOptions {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tag: Option<String>,
    pub initial_retry_secs: Option<u64>,
    pub max_retry_secs: Option<u64>,
    pub connect_timeout_ms: Option<u64>,
    pub write_timeout_ms: Option<u64>,
    pub idle_timeout_ms: Option<u64>,
    pub capacity: Option<usize>,
    /// Key to nest the payload under; an empty string sends it bare.
    pub wrap_key: Option<String>,
    pub format: Option<WireFormat>,
}
