//! Loopback stand-ins for a Fluent collector.

use std::{
    io,
    net::{SocketAddr, TcpListener, TcpStream},
    thread,
    time::{Duration, Instant},
};

use serde::Deserialize;
use serde_json::Value;

use crate::sink::FluentSink;

/// Decoded `[tag, time, payload]` packet.
pub type Packet = (String, f64, Value);

/// Bind an ephemeral loopback listener.
pub fn listener() -> TcpListener {
    TcpListener::bind(("127.0.0.1", 0)).expect("bind ephemeral listener")
}

/// A loopback address with nothing listening on it.
pub fn unused_addr() -> SocketAddr {
    let listener = listener();
    listener.local_addr().expect("listener has address")
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

/// Read the next msgpack packet from `stream`.
pub fn read_packet(stream: &mut TcpStream) -> Packet {
    let mut de = rmp_serde::Deserializer::new(stream);
    Deserialize::deserialize(&mut de).expect("decode packet")
}

/// Poll the sink until `pred` holds for its stats.
pub fn wait_for_state(
    sink: &FluentSink,
    timeout: Duration,
    pred: impl Fn(&crate::sink::SinkStats) -> bool,
) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if sink.stats().is_some_and(|s| pred(&s)) {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}
