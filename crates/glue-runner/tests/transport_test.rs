//! Transport lifecycle tests against in-memory ports.

use crossbeam_channel::Receiver;
use glue_runner::{MemoryConnector, MemoryDevice, Transport, TransportError, TransportEvent};
use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(2);
const QUIET: Duration = Duration::from_millis(50);

fn setup(ports: &[&str]) -> (Transport, Receiver<TransportEvent>, Vec<MemoryDevice>) {
    let connector = MemoryConnector::new();
    let devices = ports.iter().map(|name| connector.add_port(name)).collect();
    let (transport, events) = Transport::new(Arc::new(connector), Duration::from_millis(1));
    (transport, events, devices)
}

fn next(events: &Receiver<TransportEvent>) -> TransportEvent {
    events.recv_timeout(WAIT).expect("event within timeout")
}

fn assert_quiet(events: &Receiver<TransportEvent>) {
    if let Ok(event) = events.recv_timeout(QUIET) {
        panic!("unexpected event: {:?}", event);
    }
}

fn connected(port: &str) -> TransportEvent {
    TransportEvent::Connected {
        port: port.to_string(),
    }
}

#[test]
fn test_list_ports() {
    let (transport, _events, _devices) = setup(&["ttyB", "ttyA"]);
    assert_eq!(transport.list_ports(), vec!["ttyA".to_string(), "ttyB".to_string()]);
}

#[test]
fn test_reopen_on_other_port_closes_first() {
    let (transport, events, devices) = setup(&["ttyA", "ttyB"]);

    transport.open("ttyA", 115_200).unwrap();
    assert_eq!(next(&events), connected("ttyA"));

    transport.open("ttyB", 115_200).unwrap();
    assert_eq!(next(&events), TransportEvent::Disconnected);
    assert_eq!(next(&events), connected("ttyB"));
    assert_quiet(&events);

    assert!(!devices[0].is_open());
    assert_eq!(devices[0].close_count(), 1);
    assert!(devices[1].is_open());
    assert_eq!(transport.port_name().as_deref(), Some("ttyB"));
}

#[test]
fn test_reader_follows_the_new_link() {
    let (transport, events, devices) = setup(&["ttyA", "ttyB"]);
    transport.open("ttyA", 115_200).unwrap();
    transport.open("ttyB", 115_200).unwrap();
    for _ in 0..3 {
        next(&events);
    }

    devices[0].inject(b"\x02stale\x03");
    devices[1].inject(b"\x02fresh\x03");
    assert_eq!(next(&events), TransportEvent::Message(b"fresh".to_vec()));
    assert_quiet(&events);
}

#[test]
fn test_send_after_close_never_touches_port() {
    let (transport, events, devices) = setup(&["ttyA"]);
    transport.open("ttyA", 115_200).unwrap();
    transport.close();
    assert_eq!(next(&events), connected("ttyA"));
    assert_eq!(next(&events), TransportEvent::Disconnected);

    let result = transport.send(b"\x02{\"type\":\"heartbeat\"}\x03");
    assert!(matches!(result, Err(TransportError::NotConnected)));
    assert!(devices[0].take_written().is_empty());
    assert_quiet(&events);
}

#[test]
fn test_close_notifies_exactly_once() {
    let (transport, events, devices) = setup(&["ttyA"]);
    transport.open("ttyA", 115_200).unwrap();
    assert_eq!(next(&events), connected("ttyA"));

    transport.close();
    assert_eq!(next(&events), TransportEvent::Disconnected);
    assert_quiet(&events);
    assert!(!devices[0].is_open());
}

#[test]
fn test_close_suppresses_flush_failure() {
    let (transport, events, devices) = setup(&["ttyA"]);
    transport.open("ttyA", 115_200).unwrap();
    assert_eq!(next(&events), connected("ttyA"));

    devices[0].fail_flush(Some(io::ErrorKind::BrokenPipe));
    transport.close();

    assert_eq!(next(&events), TransportEvent::Disconnected);
    assert_quiet(&events);
    assert!(!transport.is_connected());
    assert!(!devices[0].is_open());
}

#[test]
fn test_port_can_be_reopened_after_close() {
    let (transport, events, devices) = setup(&["ttyA"]);
    transport.open("ttyA", 115_200).unwrap();
    transport.close();
    transport.open("ttyA", 115_200).unwrap();

    assert_eq!(next(&events), connected("ttyA"));
    assert_eq!(next(&events), TransportEvent::Disconnected);
    assert_eq!(next(&events), connected("ttyA"));
    assert_eq!(devices[0].open_count(), 2);
}

#[test]
fn test_write_failure_is_not_fatal() {
    let (transport, events, devices) = setup(&["ttyA"]);
    transport.open("ttyA", 115_200).unwrap();
    assert_eq!(next(&events), connected("ttyA"));

    devices[0].fail_writes(Some(io::ErrorKind::TimedOut));
    let result = transport.send(b"\x02one\x03");
    assert!(matches!(result, Err(TransportError::Io(_))));
    match next(&events) {
        TransportEvent::Error(text) => assert!(text.starts_with("Send error"), "{}", text),
        other => panic!("unexpected event: {:?}", other),
    }
    assert!(transport.is_connected());

    devices[0].fail_writes(None);
    transport.send(b"\x02two\x03").unwrap();
    assert_eq!(devices[0].take_written(), b"\x02two\x03");
}

#[test]
fn test_read_fault_tears_down_link() {
    let (transport, events, devices) = setup(&["ttyA"]);
    transport.open("ttyA", 115_200).unwrap();
    assert_eq!(next(&events), connected("ttyA"));

    devices[0].fail_reads(Some(io::ErrorKind::BrokenPipe));

    match next(&events) {
        TransportEvent::Error(text) => assert!(text.starts_with("Read error"), "{}", text),
        other => panic!("unexpected event: {:?}", other),
    }
    assert_eq!(next(&events), TransportEvent::Disconnected);
    assert!(!transport.is_connected());
    assert!(!devices[0].is_open());
    assert!(matches!(
        transport.send(b"\x02x\x03"),
        Err(TransportError::NotConnected)
    ));
}

#[test]
fn test_failed_open_while_connected_leaves_link_closed() {
    let (transport, events, devices) = setup(&["ttyA"]);
    transport.open("ttyA", 115_200).unwrap();
    assert_eq!(next(&events), connected("ttyA"));

    assert!(transport.open("ttyZ", 115_200).is_err());
    assert_eq!(next(&events), TransportEvent::Disconnected);
    assert!(matches!(next(&events), TransportEvent::Error(_)));
    assert!(!transport.is_connected());
    assert!(!devices[0].is_open());
}

#[test]
fn test_noise_and_partial_frames_are_discarded() {
    let (transport, events, devices) = setup(&["ttyA"]);
    transport.open("ttyA", 115_200).unwrap();
    assert_eq!(next(&events), connected("ttyA"));

    devices[0].inject(b"garbage\x02partial");
    thread::sleep(Duration::from_millis(10));
    devices[0].inject(b"\x02\x03\x02complete\x03trailing");

    assert_eq!(next(&events), TransportEvent::Message(b"complete".to_vec()));
    assert_quiet(&events);
}

#[test]
fn test_sends_interleave_with_inbound_traffic() {
    let (transport, events, devices) = setup(&["ttyA"]);
    transport.open("ttyA", 115_200).unwrap();
    assert_eq!(next(&events), connected("ttyA"));

    let device = devices[0].clone();
    thread::scope(|s| {
        s.spawn(|| {
            for i in 0..50 {
                device.inject(format!("\x02in{}\x03", i).as_bytes());
            }
        });
        s.spawn(|| {
            for _ in 0..50 {
                transport.send(b"\x02out\x03").unwrap();
            }
        });
    });

    for i in 0..50 {
        assert_eq!(next(&events), TransportEvent::Message(format!("in{}", i).into_bytes()));
    }
    assert_eq!(devices[0].take_written(), b"\x02out\x03".repeat(50));
}
