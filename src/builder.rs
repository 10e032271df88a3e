//! Builder for [`FluentSink`](crate::sink::FluentSink).
//!
//! Exposes the collector address, tag, payload layout, wire format, timeout
//! tuning and reconnect delays. Values can come from fluent setters or from a
//! deserialised [`SinkOptions`] block in the host's configuration file.

use std::{fmt, io, sync::Arc, time::Duration};

use thiserror::Error;

use crate::{
    diagnostics::{Diagnostics, LogDiagnostics},
    filter::RecordFilter,
    sink::{FluentSink, PayloadLayout, RetryPolicy, SinkConfig, SinkOptions, WireFormat},
};

/// Errors that may occur while building a sink.
#[derive(Debug, Error)]
pub enum SinkBuildError {
    /// Invalid user supplied configuration.
    #[error("invalid sink configuration: {0}")]
    InvalidConfig(String),
    /// The worker thread could not be started.
    #[error(transparent)]
    Io(#[from] io::Error),
}

fn ensure_positive_default<T: Default>(_: &T) -> T {
    T::default()
}

macro_rules! ensure_positive {
    ($value:expr, $field:expr) => {{
        if $value == ensure_positive_default(&$value) {
            Err(SinkBuildError::InvalidConfig(format!(
                "{} must be greater than zero",
                $field
            )))
        } else {
            Ok($value)
        }
    }};
}

macro_rules! option_setter {
    ($(#[$meta:meta])* $fn_name:ident, $field:ident, $ty:ty) => {
        $(#[$meta])*
        pub fn $fn_name(mut self, value: $ty) -> Self {
            self.$field = Some(value);
            self
        }
    };
}

/// Builder for constructing [`FluentSink`] instances.
#[derive(Clone, Default)]
pub struct SinkBuilder {
    host: Option<String>,
    port: Option<u16>,
    tag: Option<String>,
    initial_retry: Option<Duration>,
    max_retry: Option<Duration>,
    connect_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
    idle_timeout: Option<Duration>,
    capacity: Option<usize>,
    warn_interval: Option<Duration>,
    layout: Option<PayloadLayout>,
    format: Option<WireFormat>,
    filter: Option<Arc<dyn RecordFilter>>,
    diagnostics: Option<Arc<dyn Diagnostics>>,
}

impl SinkBuilder {
    /// Create a builder targeting `127.0.0.1:24224` with tag `debug`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a builder from deserialised options.
    pub fn from_options(options: &SinkOptions) -> Self {
        let layout = options.wrap_key.as_ref().map(|key| {
            if key.is_empty() {
                PayloadLayout::Bare
            } else {
                PayloadLayout::Wrapped { key: key.clone() }
            }
        });
        Self {
            host: options.host.clone(),
            port: options.port,
            tag: options.tag.clone(),
            initial_retry: options.initial_retry_secs.map(Duration::from_secs),
            max_retry: options.max_retry_secs.map(Duration::from_secs),
            connect_timeout: options.connect_timeout_ms.map(Duration::from_millis),
            write_timeout: options.write_timeout_ms.map(Duration::from_millis),
            idle_timeout: options.idle_timeout_ms.map(Duration::from_millis),
            capacity: options.capacity,
            layout,
            format: options.format,
            ..Self::default()
        }
    }

    /// Target the collector at `host:port`.
    pub fn with_tcp(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = Some(host.into());
        self.port = Some(port);
        self
    }

    /// Tag attached to every packet.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Reconnect delay bounds.
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.initial_retry = Some(policy.initial);
        self.max_retry = Some(policy.max);
        self
    }

    option_setter!(
        #[doc = "Set the bounded channel capacity."]
        with_capacity,
        capacity,
        usize
    );
    option_setter!(with_connect_timeout, connect_timeout, Duration);
    option_setter!(with_write_timeout, write_timeout, Duration);
    option_setter!(
        #[doc = "Report idle connections after this long without activity."]
        with_idle_timeout,
        idle_timeout,
        Duration
    );
    option_setter!(with_warn_interval, warn_interval, Duration);
    option_setter!(with_payload_layout, layout, PayloadLayout);
    option_setter!(with_wire_format, format, WireFormat);

    /// Only forward records for which `filter` returns `true`.
    pub fn with_filter(mut self, filter: impl RecordFilter + 'static) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Report status changes to `diagnostics`.
    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn Diagnostics>) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    /// Report status changes through the `log` facade.
    pub fn with_log_diagnostics(self) -> Self {
        self.with_diagnostics(Arc::new(LogDiagnostics::new()))
    }

    fn validate(&self) -> Result<(), SinkBuildError> {
        self.validate_names()?;
        self.validate_retry()?;
        self.validate_timeouts()?;
        if let Some(capacity) = self.capacity {
            ensure_positive!(capacity, "capacity")?;
        }
        if let Some(PayloadLayout::Wrapped { key }) = &self.layout
            && key.is_empty()
        {
            return Err(SinkBuildError::InvalidConfig(
                "payload wrap key must not be empty".into(),
            ));
        }
        Ok(())
    }

    fn validate_names(&self) -> Result<(), SinkBuildError> {
        if self.host.as_deref().is_some_and(|h| h.trim().is_empty()) {
            return Err(SinkBuildError::InvalidConfig(
                "tcp host must not be empty".into(),
            ));
        }
        if self.tag.as_deref().is_some_and(str::is_empty) {
            return Err(SinkBuildError::InvalidConfig("tag must not be empty".into()));
        }
        Ok(())
    }

    fn validate_retry(&self) -> Result<(), SinkBuildError> {
        let policy = self.retry_policy();
        ensure_positive!(policy.initial, "initial retry delay")?;
        if policy.max < policy.initial {
            return Err(SinkBuildError::InvalidConfig(format!(
                "max retry delay {:?} is shorter than initial retry delay {:?}",
                policy.max, policy.initial
            )));
        }
        Ok(())
    }

    fn validate_timeouts(&self) -> Result<(), SinkBuildError> {
        if let Some(timeout) = self.connect_timeout {
            ensure_positive!(timeout, "connect_timeout")?;
        }
        if let Some(timeout) = self.write_timeout {
            ensure_positive!(timeout, "write_timeout")?;
        }
        if let Some(timeout) = self.idle_timeout {
            ensure_positive!(timeout, "idle_timeout")?;
        }
        Ok(())
    }

    fn retry_policy(&self) -> RetryPolicy {
        let defaults = RetryPolicy::default();
        RetryPolicy {
            initial: self.initial_retry.unwrap_or(defaults.initial),
            max: self.max_retry.unwrap_or(defaults.max),
        }
    }

    /// Validate the settings and produce the runtime configuration.
    pub fn build_config(&self) -> Result<SinkConfig, SinkBuildError> {
        self.validate()?;
        let mut config = SinkConfig {
            retry: self.retry_policy(),
            idle_timeout: self.idle_timeout,
            filter: self.filter.clone(),
            diagnostics: self.diagnostics.clone(),
            ..SinkConfig::default()
        };
        self.apply_optional_fields(&mut config);
        Ok(config)
    }

    fn apply_optional_fields(&self, config: &mut SinkConfig) {
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(tag) = &self.tag {
            config.tag = tag.clone();
        }
        if let Some(timeout) = self.connect_timeout {
            config.connect_timeout = timeout;
        }
        if let Some(timeout) = self.write_timeout {
            config.write_timeout = timeout;
        }
        if let Some(capacity) = self.capacity {
            config.capacity = capacity;
        }
        if let Some(interval) = self.warn_interval {
            config.warn_interval = interval;
        }
        if let Some(layout) = &self.layout {
            config.layout = layout.clone();
        }
        if let Some(format) = self.format {
            config.format = format;
        }
    }

    /// Build the sink and start connecting.
    pub fn build(&self) -> Result<FluentSink, SinkBuildError> {
        let config = self.build_config()?;
        Ok(FluentSink::with_config(config)?)
    }
}

impl fmt::Debug for SinkBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkBuilder")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tag", &self.tag)
            .field("initial_retry", &self.initial_retry)
            .field("max_retry", &self.max_retry)
            .field("capacity", &self.capacity)
            .field("layout", &self.layout)
            .field("format", &self.format)
            .field("filter", &self.filter.is_some())
            .field("diagnostics", &self.diagnostics.is_some())
            .finish_non_exhaustive()
    }
}
