//! End-to-end behaviour of `FluentSink` against loopback collectors.

mod test_utils;

use std::{net::TcpListener, time::Duration};

use fluent_sink::{
    FluentSink, RecordError, RecordSink, RetryPolicy, SinkBuilder, SinkError, WireFormat,
};
use log::Level;
use rstest::{fixture, rstest};
use serde_json::{Value, json};

use test_utils::{CollectingDiagnostics, accept, listener, read_packet, unused_addr, wait_until};

const WAIT: Duration = Duration::from_secs(3);

#[fixture]
fn diagnostics() -> CollectingDiagnostics {
    CollectingDiagnostics::default()
}

fn builder_for(port: u16, diagnostics: &CollectingDiagnostics) -> SinkBuilder {
    SinkBuilder::new()
        .with_tcp("127.0.0.1", port)
        .with_retry(RetryPolicy {
            initial: Duration::from_millis(20),
            max: Duration::from_secs(1),
        })
        .with_diagnostics(diagnostics.shared())
}

/// Waits on the worker's own view, so reports made while connecting are in.
fn connected(sink: &FluentSink) -> bool {
    wait_until(WAIT, || sink.stats().is_some_and(|s| s.is_connected()))
}

#[rstest]
fn unreachable_collector_doubles_wait(diagnostics: CollectingDiagnostics) {
    let addr = unused_addr();
    let _sink = builder_for(addr.port(), &diagnostics)
        .build()
        .expect("build sink");

    assert!(wait_until(WAIT, || diagnostics.matching("Waiting").len() >= 3));
    let waits: Vec<String> = diagnostics
        .matching("Waiting")
        .into_iter()
        .take(3)
        .map(|(_, msg)| msg)
        .collect();
    assert_eq!(
        waits,
        vec![
            "FluentSink: connection closed. Waiting 0.02s for reconnect",
            "FluentSink: connection closed. Waiting 0.04s for reconnect",
            "FluentSink: connection closed. Waiting 0.08s for reconnect",
        ]
    );
}

#[rstest]
fn connected_write_emits_tagged_packet(diagnostics: CollectingDiagnostics) {
    let server = listener();
    let sink = builder_for(server.local_addr().unwrap().port(), &diagnostics)
        .build()
        .expect("build sink");
    let mut stream = accept(&server, WAIT);
    assert!(connected(&sink));

    sink.write(json!({"time": "2023-01-01T00:00:00Z", "msg": "hi"}))
        .expect("valid record");

    let (tag, time, payload) = read_packet(&mut stream);
    assert_eq!(tag, "debug");
    assert_eq!(time, 1_672_531_200.0);
    assert_eq!(payload["log"]["msg"], json!("hi"));
}

#[rstest]
fn drops_are_counted_and_reported_on_reconnect(diagnostics: CollectingDiagnostics) {
    let addr = unused_addr();
    let sink = builder_for(addr.port(), &diagnostics)
        .build()
        .expect("build sink");

    for _ in 0..5 {
        sink.write(json!({"time": "2023-01-01T00:00:00Z", "msg": "lost"}))
            .expect("valid record");
    }
    assert_eq!(sink.stats().expect("sink running").dropped, 5);

    let server = TcpListener::bind(addr).expect("rebind collector port");
    let _stream = accept(&server, WAIT);
    assert!(connected(&sink));

    let summaries = diagnostics.matching("dropped 5 messages while disconnected");
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].0, Level::Warn);
    assert_eq!(sink.stats().expect("sink running").dropped, 0);
}

#[rstest]
fn json_packets_are_self_delimiting(diagnostics: CollectingDiagnostics) {
    let server = listener();
    let sink = builder_for(server.local_addr().unwrap().port(), &diagnostics)
        .with_wire_format(WireFormat::Json)
        .with_tag("web")
        .build()
        .expect("build sink");
    let stream = accept(&server, WAIT);
    assert!(connected(&sink));

    for n in 0..2 {
        sink.write(json!({"time": 1_672_531_200_000_i64 + n * 1000, "n": n}))
            .expect("valid record");
    }

    let packets: Vec<Value> = serde_json::Deserializer::from_reader(stream)
        .into_iter::<Value>()
        .take(2)
        .map(|p| p.expect("json packet"))
        .collect();
    assert_eq!(packets[0][0], json!("web"));
    assert_eq!(packets[0][1], json!(1_672_531_200.0));
    assert_eq!(packets[1][1], json!(1_672_531_201.0));
    assert_eq!(packets[1][2]["log"]["n"], json!(1));
}

#[rstest]
fn works_through_the_capability_trait(diagnostics: CollectingDiagnostics) {
    let mut sink: Box<dyn RecordSink> = Box::new(
        builder_for(unused_addr().port(), &diagnostics)
            .build()
            .expect("build sink"),
    );

    assert_eq!(
        sink.write(json!({"msg": "no time"})),
        Err(SinkError::Invalid(RecordError::MissingTime))
    );
    sink.write(json!({"time": "2023-01-01T00:00:00Z"}))
        .expect("disconnected writes still succeed");
    sink.end();
    assert_eq!(
        sink.write(json!({"time": "2023-01-01T00:00:00Z"})),
        Err(SinkError::Closed)
    );
}
