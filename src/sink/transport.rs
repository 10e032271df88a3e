//! Transport primitives for the sink.

use std::{
    io::{self, Read, Write},
    net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs},
    thread,
    time::Duration,
};

/// Collector endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TcpTarget {
    /// Hostname or IP address to connect to.
    pub host: String,
    /// TCP port number.
    pub port: u16,
}

impl TcpTarget {
    fn socket_addrs(&self) -> io::Result<Vec<SocketAddr>> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map(|iter| iter.collect())
    }
}

/// How an active connection is torn down.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseMode {
    /// Flush pending bytes before closing.
    Graceful,
    /// Close both halves immediately.
    Forced,
}

/// Socket activity observed by the close watcher.
#[derive(Debug)]
pub enum SocketEvent {
    /// The peer closed the connection or the socket was shut down.
    Closed,
    /// The socket reported an error. A `Closed` event follows.
    Error(io::Error),
    /// No activity for the configured idle timeout.
    Idle,
}

/// Live connection to the collector.
#[derive(Debug)]
pub struct ActiveConnection {
    stream: TcpStream,
}

impl ActiveConnection {
    /// Write a full packet to the socket.
    pub fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.stream.write_all(buf)
    }

    /// Flush the underlying writer.
    pub fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }

    /// Close the connection; the close watcher observes the shutdown.
    pub fn close(mut self, mode: CloseMode) -> io::Result<()> {
        match mode {
            CloseMode::Graceful => {
                self.stream.flush()?;
                self.stream.shutdown(Shutdown::Both)
            }
            CloseMode::Forced => self.stream.shutdown(Shutdown::Both),
        }
    }

    /// Spawn a thread that reads from a clone of the socket and reports
    /// closes, errors and idle periods to `on_event`.
    ///
    /// The thread exits after reporting `Closed`, or as soon as `on_event`
    /// returns `false`.
    pub fn watch<F>(&self, idle_timeout: Option<Duration>, mut on_event: F) -> io::Result<()>
    where
        F: FnMut(SocketEvent) -> bool + Send + 'static,
    {
        let mut reader = self.stream.try_clone()?;
        reader.set_read_timeout(idle_timeout)?;
        thread::Builder::new()
            .name("fluent-sink-watch".into())
            .spawn(move || {
                let mut buf = [0u8; 512];
                loop {
                    match reader.read(&mut buf) {
                        Ok(0) => {
                            on_event(SocketEvent::Closed);
                            return;
                        }
                        // Collector responses are not part of the protocol.
                        Ok(_) => {}
                        Err(err)
                            if matches!(
                                err.kind(),
                                io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                            ) =>
                        {
                            if !on_event(SocketEvent::Idle) {
                                return;
                            }
                        }
                        Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                        Err(err) => {
                            if on_event(SocketEvent::Error(err)) {
                                on_event(SocketEvent::Closed);
                            }
                            return;
                        }
                    }
                }
            })?;
        Ok(())
    }
}

/// Establish a connection to `target`, trying each resolved address in turn.
pub fn connect_tcp(
    target: &TcpTarget,
    connect_timeout: Duration,
    write_timeout: Duration,
) -> io::Result<ActiveConnection> {
    let mut last_err = None;
    for addr in target.socket_addrs()? {
        match TcpStream::connect_timeout(&addr, connect_timeout) {
            Ok(stream) => {
                stream.set_nodelay(true)?;
                stream.set_write_timeout(Some(write_timeout))?;
                return Ok(ActiveConnection { stream });
            }
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("{}:{} did not resolve to any address", target.host, target.port),
        )
    }))
}
