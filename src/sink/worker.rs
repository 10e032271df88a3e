//! Worker thread driving the connection lifecycle.
//!
//! The worker is the only owner of the connection state. Callers, connect
//! attempts and the close watcher all talk to it through one channel, so
//! transitions are applied one at a time in arrival order.

use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Instant,
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};

use crate::{diagnostics::Diagnostics, record::LogRecord};

use super::{
    config::SinkConfig,
    encode::encode_packet,
    state::{ConnectionManager, ConnectionState, LinkStatus, SinkStats},
    transport::{ActiveConnection, CloseMode, SocketEvent, TcpTarget, connect_tcp},
};

const LOG_PREFIX: &str = "FluentSink";

/// Commands processed by the worker thread.
#[derive(Debug)]
pub enum SinkCommand {
    Record(LogRecord),
    Flush(Sender<()>),
    Stats(Sender<SinkStats>),
    Shutdown { mode: CloseMode, ack: Sender<()> },
    Connection { generation: u64, event: ConnectionEvent },
}

/// Outcome of a connect attempt or activity on the live socket.
#[derive(Debug)]
pub enum ConnectionEvent {
    Connected(ActiveConnection),
    Error(io::Error),
    Closed,
    Idle,
}

impl From<SocketEvent> for ConnectionEvent {
    fn from(event: SocketEvent) -> Self {
        match event {
            SocketEvent::Closed => ConnectionEvent::Closed,
            SocketEvent::Error(err) => ConnectionEvent::Error(err),
            SocketEvent::Idle => ConnectionEvent::Idle,
        }
    }
}

/// Spawn the worker and return the command sender plus its join handle.
///
/// `discard` is raised by a forced shutdown so that records still queued
/// behind it are skipped rather than written. `link` is updated on every
/// transition so the handle can count drops without queueing them.
pub fn spawn_worker(
    config: SinkConfig,
    discard: Arc<AtomicBool>,
    link: Arc<LinkStatus>,
) -> io::Result<(Sender<SinkCommand>, thread::JoinHandle<()>)> {
    let (tx, rx) = bounded(config.capacity);
    let worker = Worker::new(config, tx.clone(), discard, link);
    let handle = thread::Builder::new()
        .name("fluent-sink".into())
        .spawn(move || worker.run(rx))?;
    Ok((tx, handle))
}

struct Worker {
    config: SinkConfig,
    target: TcpTarget,
    manager: ConnectionManager,
    connection: Option<ActiveConnection>,
    // Identifies the current attempt or connection; events tagged with an
    // older generation are stale.
    generation: u64,
    attempt_in_flight: bool,
    next_attempt: Option<Instant>,
    events: Sender<SinkCommand>,
    discard: Arc<AtomicBool>,
}

impl Worker {
    fn new(
        config: SinkConfig,
        events: Sender<SinkCommand>,
        discard: Arc<AtomicBool>,
        link: Arc<LinkStatus>,
    ) -> Self {
        let target = TcpTarget {
            host: config.host.clone(),
            port: config.port,
        };
        Self {
            manager: ConnectionManager::with_link(config.retry, link),
            target,
            config,
            connection: None,
            generation: 0,
            attempt_in_flight: false,
            next_attempt: None,
            events,
            discard,
        }
    }

    fn run(mut self, rx: Receiver<SinkCommand>) {
        self.start_attempt();
        loop {
            let received = match self.next_attempt {
                Some(deadline) => rx.recv_deadline(deadline),
                None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            let keep_running = match received {
                Ok(cmd) => self.handle(cmd),
                Err(RecvTimeoutError::Timeout) => {
                    self.next_attempt = None;
                    self.start_attempt();
                    true
                }
                Err(RecvTimeoutError::Disconnected) => false,
            };
            if !keep_running {
                return;
            }
        }
    }

    fn handle(&mut self, cmd: SinkCommand) -> bool {
        match cmd {
            SinkCommand::Record(record) => self.on_record(record),
            SinkCommand::Flush(ack) => {
                if let Some(conn) = self.connection.as_mut()
                    && let Err(err) = conn.flush()
                {
                    self.report_error(&err);
                }
                let _ = ack.send(());
            }
            SinkCommand::Stats(reply) => {
                let _ = reply.send(self.manager.snapshot());
            }
            SinkCommand::Shutdown { mode, ack } => {
                self.shutdown(mode);
                let _ = ack.send(());
                return false;
            }
            SinkCommand::Connection { generation, event } => {
                self.on_connection_event(generation, event)
            }
        }
        true
    }

    fn on_record(&mut self, record: LogRecord) {
        if self.discard.load(Ordering::Acquire) {
            return;
        }
        // Queued while connected, dequeued after the connection went away.
        let Some(conn) = self.connection.as_mut() else {
            self.manager.record_drop();
            return;
        };
        let packet = match encode_packet(
            &self.config.tag,
            &record,
            &self.config.layout,
            self.config.format,
        ) {
            Ok(packet) => packet,
            Err(err) => {
                self.diag(|d| d.error(&format!("{LOG_PREFIX}: failed to encode record: {err}")));
                return;
            }
        };
        // A failed write is reported as an error, not counted as dropped.
        if let Err(err) = conn.write_all(&packet) {
            self.report_error(&err);
            self.on_closed();
        }
    }

    fn on_connection_event(&mut self, generation: u64, event: ConnectionEvent) {
        if generation != self.generation {
            if let ConnectionEvent::Connected(conn) = event {
                let _ = conn.close(CloseMode::Forced);
            }
            return;
        }
        match event {
            ConnectionEvent::Connected(conn) => self.on_connected(conn),
            ConnectionEvent::Error(err) => self.report_error(&err),
            ConnectionEvent::Idle => {
                self.diag(|d| d.debug(&format!("{LOG_PREFIX}: connection is idle")));
            }
            ConnectionEvent::Closed => self.on_closed(),
        }
    }

    fn start_attempt(&mut self) {
        if self.attempt_in_flight || self.manager.state() != ConnectionState::Connecting {
            return;
        }
        self.generation += 1;
        self.attempt_in_flight = true;
        let address = self.config.address();
        self.diag(|d| d.debug(&format!("{LOG_PREFIX}: connecting to <{address}>")));

        let generation = self.generation;
        let target = self.target.clone();
        let connect_timeout = self.config.connect_timeout;
        let write_timeout = self.config.write_timeout;
        let tx = self.events.clone();
        let spawned = thread::Builder::new()
            .name("fluent-sink-connect".into())
            .spawn(move || {
                let send = |event| tx.send(SinkCommand::Connection { generation, event });
                match connect_tcp(&target, connect_timeout, write_timeout) {
                    Ok(conn) => {
                        let _ = send(ConnectionEvent::Connected(conn));
                    }
                    Err(err) => {
                        if send(ConnectionEvent::Error(err)).is_ok() {
                            let _ = send(ConnectionEvent::Closed);
                        }
                    }
                }
            });
        if let Err(err) = spawned {
            self.report_error(&err);
            self.on_closed();
        }
    }

    fn on_connected(&mut self, conn: ActiveConnection) {
        self.attempt_in_flight = false;
        let generation = self.generation;
        let tx = self.events.clone();
        let watching = conn.watch(self.config.idle_timeout, move |event| {
            tx.send(SinkCommand::Connection {
                generation,
                event: event.into(),
            })
            .is_ok()
        });
        if let Err(err) = watching {
            self.report_error(&err);
            let _ = conn.close(CloseMode::Forced);
            self.on_closed();
            return;
        }

        let dropped = self.manager.on_connected();
        self.connection = Some(conn);
        let address = self.config.address();
        self.diag(|d| d.info(&format!("{LOG_PREFIX}: connected to <{address}>")));
        if let Some(dropped) = dropped {
            self.diag(|d| {
                d.warn(&format!(
                    "{LOG_PREFIX}: dropped {dropped} messages while disconnected"
                ))
            });
        }
    }

    fn on_closed(&mut self) {
        self.attempt_in_flight = false;
        // Late events from the old socket must not trigger a second close.
        self.generation += 1;
        if let Some(conn) = self.connection.take() {
            let _ = conn.close(CloseMode::Forced);
        }
        if let Some(wait) = self.manager.on_closed() {
            self.diag(|d| {
                d.info(&format!(
                    "{LOG_PREFIX}: connection closed. Waiting {}s for reconnect",
                    wait.as_secs_f64()
                ))
            });
            self.next_attempt = Some(Instant::now() + wait);
        }
    }

    fn shutdown(&mut self, mode: CloseMode) {
        self.manager.shutdown();
        self.next_attempt = None;
        self.generation += 1;
        if let Some(conn) = self.connection.take()
            && let Err(err) = conn.close(mode)
        {
            self.report_error(&err);
        }
    }

    fn report_error(&self, err: &io::Error) {
        self.diag(|d| {
            if err.raw_os_error().is_some() {
                d.error(&format!("{LOG_PREFIX}: encountered an error: {err}"));
            } else {
                d.error(&format!("{LOG_PREFIX}: unexpected error: {err}"));
            }
        });
    }

    fn diag(&self, emit: impl FnOnce(&dyn Diagnostics)) {
        if let Some(diagnostics) = self.config.diagnostics.as_deref() {
            emit(diagnostics);
        }
    }
}

/// Ask the worker to flush and wait for its acknowledgement.
pub fn flush_queue(tx: &Sender<SinkCommand>, timeout: std::time::Duration) -> bool {
    let (ack_tx, ack_rx) = bounded(1);
    if tx
        .send_timeout(SinkCommand::Flush(ack_tx), timeout)
        .is_err()
    {
        return false;
    }
    ack_rx.recv_timeout(timeout).is_ok()
}

/// Ask the worker for a snapshot of its bookkeeping.
pub fn query_stats(tx: &Sender<SinkCommand>, timeout: std::time::Duration) -> Option<SinkStats> {
    let (reply_tx, reply_rx) = bounded(1);
    tx.send_timeout(SinkCommand::Stats(reply_tx), timeout).ok()?;
    reply_rx.recv_timeout(timeout).ok()
}
