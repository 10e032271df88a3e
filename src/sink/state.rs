//! Connection lifecycle state machine.
//!
//! [`ConnectionManager`] holds the bookkeeping for one sink: whether a
//! connection is live, how long the next reconnect waits, and how many
//! records were dropped while no connection was available. It performs no
//! I/O; the worker feeds it transitions and acts on what it returns.
//!
//! The connection state and the drop counter live in a [`LinkStatus`]
//! shared with the caller-facing handle, so a record written while
//! disconnected is counted on the caller's thread and never queued.

use std::{fmt, sync::Arc, time::Duration};

use parking_lot::Mutex;

use super::{backoff::RetryDelay, config::RetryPolicy};

/// Lifecycle state of the sink's connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// Waiting for, or performing, a connect attempt.
    Connecting,
    /// A transport is live and records are written to it.
    Connected,
    /// Shut down; no further reconnects.
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Point-in-time view of the connection bookkeeping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SinkStats {
    pub state: ConnectionState,
    /// Records dropped since the last successful connect.
    pub dropped: u64,
    /// Wait applied after the next close.
    pub retry_delay: Duration,
}

impl SinkStats {
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}

#[derive(Debug)]
struct Link {
    state: ConnectionState,
    dropped: u64,
}

/// Connection state and drop counter shared by the sink handle and its
/// worker.
///
/// Checking the state and counting a drop happen under one lock, so a
/// record is either counted or handed to the worker, never both, and no
/// drop is lost to a concurrent connect.
#[derive(Debug)]
pub struct LinkStatus {
    inner: Mutex<Link>,
}

impl Default for LinkStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkStatus {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Link {
                state: ConnectionState::Connecting,
                dropped: 0,
            }),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    pub fn dropped(&self) -> u64 {
        self.inner.lock().dropped
    }

    /// Count a record as dropped when no connection is available.
    ///
    /// Returns `true` when the record was counted and must not be sent.
    pub fn drop_if_disconnected(&self) -> bool {
        let mut link = self.inner.lock();
        if link.state == ConnectionState::Connecting {
            link.dropped += 1;
            true
        } else {
            false
        }
    }

    fn connect(&self) -> Option<u64> {
        let mut link = self.inner.lock();
        if link.state == ConnectionState::Closed {
            return None;
        }
        link.state = ConnectionState::Connected;
        match std::mem::take(&mut link.dropped) {
            0 => None,
            n => Some(n),
        }
    }

    fn disconnect(&self) -> bool {
        let mut link = self.inner.lock();
        if link.state == ConnectionState::Closed {
            return false;
        }
        link.state = ConnectionState::Connecting;
        true
    }

    fn close(&self) {
        self.inner.lock().state = ConnectionState::Closed;
    }
}

/// Reconnect bookkeeping for a single sink.
#[derive(Debug)]
pub struct ConnectionManager {
    link: Arc<LinkStatus>,
    retry: RetryDelay,
}

impl ConnectionManager {
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_link(policy, Arc::new(LinkStatus::new()))
    }

    /// Drive `link`, which may also be read by other threads.
    pub fn with_link(policy: RetryPolicy, link: Arc<LinkStatus>) -> Self {
        Self {
            link,
            retry: RetryDelay::new(policy),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.link.state()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn dropped(&self) -> u64 {
        self.link.dropped()
    }

    pub fn retry_delay(&self) -> Duration {
        self.retry.current()
    }

    /// Count a record that arrived while disconnected.
    ///
    /// Has no effect once connected or closed.
    pub fn record_drop(&self) {
        self.link.drop_if_disconnected();
    }

    /// A connect attempt succeeded.
    ///
    /// Returns the number of records dropped since the previous connection
    /// when there were any, clearing the counter. Ignored after shutdown.
    pub fn on_connected(&mut self) -> Option<u64> {
        if self.state() == ConnectionState::Closed {
            return None;
        }
        self.retry.reset();
        self.link.connect()
    }

    /// The transport closed, or a connect attempt failed.
    ///
    /// Returns how long to wait before the next attempt, or `None` once the
    /// sink has been shut down.
    pub fn on_closed(&mut self) -> Option<Duration> {
        if !self.link.disconnect() {
            return None;
        }
        Some(self.retry.advance())
    }

    /// Enter the terminal state.
    pub fn shutdown(&mut self) {
        self.link.close();
    }

    pub fn snapshot(&self) -> SinkStats {
        let link = self.link.inner.lock();
        SinkStats {
            state: link.state,
            dropped: link.dropped,
            retry_delay: self.retry.current(),
        }
    }
}
