//! Loopback collector helpers shared by the integration tests.

use std::{
    io,
    net::{SocketAddr, TcpListener, TcpStream},
    thread,
    time::{Duration, Instant},
};

use serde::Deserialize;
use serde_json::Value;

/// Bind an ephemeral loopback listener.
pub fn listener() -> TcpListener {
    TcpListener::bind(("127.0.0.1", 0)).expect("bind ephemeral listener")
}

/// A loopback address with nothing listening on it.
pub fn unused_addr() -> SocketAddr {
    listener().local_addr().expect("listener has address")
}

/// Accept one connection, failing the test after `timeout`.
pub fn accept(listener: &TcpListener, timeout: Duration) -> TcpStream {
    listener.set_nonblocking(true).expect("nonblocking listener");
    let deadline = Instant::now() + timeout;
    loop {
        match listener.accept() {
            Ok((stream, _)) => {
                stream.set_nonblocking(false).expect("blocking stream");
                stream
                    .set_read_timeout(Some(Duration::from_secs(2)))
                    .expect("read timeout");
                return stream;
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock && Instant::now() < deadline => {
                thread::sleep(Duration::from_millis(5));
            }
            Err(err) => panic!("no connection accepted: {err}"),
        }
    }
}

/// Read the next `[tag, time, payload]` msgpack packet.
pub fn read_packet(stream: &mut TcpStream) -> (String, f64, Value) {
    let mut de = rmp_serde::Deserializer::new(stream);
    Deserialize::deserialize(&mut de).expect("decode packet")
}

/// Poll `cond` every few milliseconds until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}
