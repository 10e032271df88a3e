//! Public sink type exported by the crate.

use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use crossbeam_channel::{Sender, TrySendError, bounded};
use parking_lot::Mutex;
use serde_json::Value;

use crate::{
    diagnostics::Diagnostics,
    filter::RecordFilter,
    handler::{RecordSink, SinkError},
    rate_limited_warner::RateLimitedWarner,
    record::LogRecord,
};

use super::{
    config::SinkConfig,
    state::{ConnectionState, LinkStatus, SinkStats},
    transport::CloseMode,
    worker::{SinkCommand, flush_queue, query_stats, spawn_worker},
};

/// Sink forwarding structured records to a Fluent-compatible collector.
///
/// Construction starts connecting immediately. While no connection is
/// available records are counted and dropped; the count is reported once
/// the next connection succeeds.
pub struct FluentSink {
    tx: Option<Sender<SinkCommand>>,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
    discard: Arc<AtomicBool>,
    link: Arc<LinkStatus>,
    filter: Option<Arc<dyn RecordFilter>>,
    diagnostics: Option<Arc<dyn Diagnostics>>,
    warner: RateLimitedWarner,
    ack_timeout: Duration,
}

impl FluentSink {
    /// Start a sink with the default configuration.
    pub fn new() -> io::Result<Self> {
        Self::with_config(SinkConfig::default())
    }

    /// Start a sink from a configuration object.
    pub fn with_config(config: SinkConfig) -> io::Result<Self> {
        let discard = Arc::new(AtomicBool::new(false));
        let link = Arc::new(LinkStatus::new());
        let ack_timeout = config.write_timeout;
        let warner = RateLimitedWarner::new(config.warn_interval);
        let filter = config.filter.clone();
        let diagnostics = config.diagnostics.clone();
        let (tx, handle) = spawn_worker(config, Arc::clone(&discard), Arc::clone(&link))?;
        Ok(Self {
            tx: Some(tx),
            handle: Mutex::new(Some(handle)),
            discard,
            link,
            filter,
            diagnostics,
            warner,
            ack_timeout,
        })
    }

    /// Validate `record` and forward it.
    pub fn write(&self, record: Value) -> Result<(), SinkError> {
        let record = LogRecord::from_value(record)?;
        self.write_record(record)
    }

    /// Forward an already validated record.
    ///
    /// Returns immediately. Records rejected by the filter are discarded
    /// without being counted as dropped. Records written while disconnected
    /// are counted here and never queued.
    pub fn write_record(&self, record: LogRecord) -> Result<(), SinkError> {
        let Some(tx) = self.tx.as_ref() else {
            return Err(SinkError::Closed);
        };
        if let Some(filter) = &self.filter
            && !filter.should_send(&record)
        {
            return Ok(());
        }
        if self.link.drop_if_disconnected() {
            return Ok(());
        }
        match tx.try_send(SinkCommand::Record(record)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.warner.record_drop();
                self.warner.warn_if_due(|count| {
                    self.report_overflow(count);
                });
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => Err(SinkError::Closed),
        }
    }

    /// Wait until everything queued so far has been handed to the socket.
    ///
    /// Returns `false` when the sink is closed or the worker does not answer
    /// within the write timeout.
    pub fn flush(&self) -> bool {
        let Some(tx) = self.tx.as_ref() else {
            return false;
        };
        self.warner.flush(|count| self.report_overflow(count));
        flush_queue(tx, self.ack_timeout)
    }

    /// Snapshot of the connection state, drop counter and retry delay.
    ///
    /// Reflects every record queued before the call.
    pub fn stats(&self) -> Option<SinkStats> {
        query_stats(self.tx.as_ref()?, self.ack_timeout)
    }

    /// Whether the sink currently has a live connection.
    pub fn is_connected(&self) -> bool {
        self.link.state() == ConnectionState::Connected
    }

    /// Records dropped since the last successful connect.
    pub fn dropped(&self) -> u64 {
        self.link.dropped()
    }

    /// Flush queued records, close the connection and stop reconnecting.
    pub fn end(&mut self) {
        self.request_shutdown(CloseMode::Graceful);
        self.join_worker();
    }

    /// Close the connection at once; queued records are discarded.
    pub fn destroy(&mut self) {
        self.discard.store(true, Ordering::Release);
        self.request_shutdown(CloseMode::Forced);
        self.join_worker();
    }

    fn report_overflow(&self, count: u64) {
        if let Some(diagnostics) = &self.diagnostics {
            diagnostics.warn(&format!(
                "FluentSink: queue full; lost {count} records"
            ));
        }
    }

    fn request_shutdown(&mut self, mode: CloseMode) {
        let Some(tx) = self.tx.take() else {
            return;
        };
        let (ack_tx, ack_rx) = bounded(1);
        if tx.send(SinkCommand::Shutdown { mode, ack: ack_tx }).is_err() {
            return;
        }
        let _ = ack_rx.recv_timeout(self.ack_timeout);
    }

    fn join_worker(&mut self) {
        let Some(handle) = self.handle.lock().take() else {
            return;
        };
        if handle.join().is_err() {
            log::warn!("FluentSink: worker thread panicked");
        }
    }
}

impl RecordSink for FluentSink {
    fn write(&self, record: Value) -> Result<(), SinkError> {
        FluentSink::write(self, record)
    }

    fn end(&mut self) {
        FluentSink::end(self);
    }

    fn destroy(&mut self) {
        FluentSink::destroy(self);
    }
}

impl Drop for FluentSink {
    fn drop(&mut self) {
        self.end();
    }
}

impl std::fmt::Debug for FluentSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FluentSink")
            .field("closed", &self.tx.is_none())
            .field("state", &self.link.state())
            .field("ack_timeout", &self.ack_timeout)
            .finish()
    }
}
