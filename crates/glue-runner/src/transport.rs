//! Serial transport.
//!
//! Owns one serial connection at a time. A background reader thread moves
//! inbound bytes through a [`FrameCodec`] and publishes each completed payload
//! as a [`TransportEvent`]. Outbound frames are written synchronously by the
//! caller's thread.
//!
//! ## Locking
//!
//! The open link, its decoder and the connection generation live behind one
//! mutex. The reader only holds it while bytes are known to be available, so a
//! send waits at most for one chunk to be decoded. Open and close are further
//! serialized by the reader-handle mutex, which the reader thread never takes.
//!
//! ## State machine
//!
//! ```text
//! Disconnected --open--> Connected --close / read fault--> Disconnected
//! ```
//!
//! Reconnection is never automatic.

use crate::error::TransportError;
use crate::link::{SerialConnector, SerialLink};
use crossbeam_channel::{Receiver, Sender};
use glue_protocol::FrameCodec;
use metrics::counter;
use parking_lot::{Mutex, MutexGuard};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Maximum bytes pulled from the port per read.
const READ_CHUNK_SIZE: usize = 1024;

/// Default pause between polls when no data is waiting.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Notifications published by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A port was opened.
    Connected {
        /// Name of the opened port.
        port: String,
    },
    /// The link is closed (explicitly or after a fault).
    Disconnected,
    /// A complete frame payload arrived.
    Message(Vec<u8>),
    /// A non-fatal fault, as human-readable text.
    Error(String),
}

/// Connection state of a [`Transport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No open link.
    Disconnected,
    /// A link is open.
    Connected,
}

struct LinkState {
    link: Option<Box<dyn SerialLink>>,
    port_name: Option<String>,
    codec: FrameCodec,
    /// Bumped whenever a link is torn down so stale readers exit.
    generation: u64,
}

impl LinkState {
    fn drop_link(&mut self) -> Option<(Box<dyn SerialLink>, String)> {
        self.generation = self.generation.wrapping_add(1);
        self.codec.reset();
        let name = self.port_name.take().unwrap_or_default();
        self.link.take().map(|link| (link, name))
    }
}

struct ReaderHandle {
    stop: Arc<AtomicBool>,
    join: JoinHandle<()>,
}

/// Serial transport with a background reader.
pub struct Transport {
    connector: Arc<dyn SerialConnector>,
    state: Arc<Mutex<LinkState>>,
    reader: Mutex<Option<ReaderHandle>>,
    events: Sender<TransportEvent>,
    poll_interval: Duration,
}

impl Transport {
    /// Create a transport and the receiver its events are delivered to.
    pub fn new(
        connector: Arc<dyn SerialConnector>,
        poll_interval: Duration,
    ) -> (Self, Receiver<TransportEvent>) {
        let (events, receiver) = crossbeam_channel::unbounded();
        let transport = Transport {
            connector,
            state: Arc::new(Mutex::new(LinkState {
                link: None,
                port_name: None,
                codec: FrameCodec::new(),
                generation: 0,
            })),
            reader: Mutex::new(None),
            events,
            poll_interval,
        };
        (transport, receiver)
    }

    /// Ports currently present on the host. Enumerated on every call.
    pub fn list_ports(&self) -> Vec<String> {
        match self.connector.list_ports() {
            Ok(ports) => ports,
            Err(e) => {
                warn!("Port enumeration failed: {}", e);
                self.emit(TransportEvent::Error(format!("Port enumeration failed: {}", e)));
                Vec::new()
            }
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        if self.state.lock().link.is_some() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    /// Whether a link is open.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Name of the open port, if any.
    pub fn port_name(&self) -> Option<String> {
        self.state.lock().port_name.clone()
    }

    /// Open `port` at `baud_rate`, closing any link that is already open.
    ///
    /// Publishes `Disconnected` for a replaced link, then `Connected` on
    /// success or `Error` on failure.
    pub fn open(&self, port: &str, baud_rate: u32) -> Result<(), TransportError> {
        let mut reader = self.reader.lock();

        if let Some(previous) = self.shutdown(&mut reader) {
            info!("Closed {} before opening {}", previous, port);
            self.emit(TransportEvent::Disconnected);
        }

        debug!("Opening {} at {} baud", port, baud_rate);
        let link = match self.connector.open(port, baud_rate) {
            Ok(link) => link,
            Err(e) => {
                warn!("Failed to open {}: {}", port, e);
                self.emit(TransportEvent::Error(format!("Connection failed: {}", e)));
                return Err(TransportError::Connection {
                    port: port.to_string(),
                    source: e,
                });
            }
        };

        let generation = {
            let mut state = self.state.lock();
            state.link = Some(link);
            state.port_name = Some(port.to_string());
            state.codec.reset();
            state.generation
        };
        counter!("glue_transport_connects_total").increment(1);
        self.emit(TransportEvent::Connected {
            port: port.to_string(),
        });

        let stop = Arc::new(AtomicBool::new(false));
        let reader_loop = ReaderLoop {
            state: Arc::clone(&self.state),
            events: self.events.clone(),
            stop: Arc::clone(&stop),
            generation,
            poll_interval: self.poll_interval,
        };
        let spawned = thread::Builder::new()
            .name(format!("serial-rx {}", port))
            .spawn(move || reader_loop.run());

        match spawned {
            Ok(join) => {
                *reader = Some(ReaderHandle { stop, join });
                info!("Connected to {} at {} baud", port, baud_rate);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to start reader for {}: {}", port, e);
                self.shutdown(&mut reader);
                self.emit(TransportEvent::Error(format!("Connection failed: {}", e)));
                self.emit(TransportEvent::Disconnected);
                Err(TransportError::Connection {
                    port: port.to_string(),
                    source: e,
                })
            }
        }
    }

    /// Close the link. Always publishes exactly one `Disconnected`.
    ///
    /// Faults while closing are logged and otherwise ignored.
    pub fn close(&self) {
        let mut reader = self.reader.lock();
        if let Some(port) = self.shutdown(&mut reader) {
            info!("Disconnected from {}", port);
        }
        self.emit(TransportEvent::Disconnected);
    }

    /// Write a complete frame to the link.
    ///
    /// Write faults are published as `Error` events and returned; the link
    /// stays open.
    pub fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        let Some(link) = state.link.as_mut() else {
            return Err(TransportError::NotConnected);
        };

        trace!("tx {}", hex::encode(data));
        match link.write_all(data).and_then(|_| link.flush()) {
            Ok(()) => {
                counter!("glue_transport_bytes_tx_total").increment(data.len() as u64);
                Ok(())
            }
            Err(e) => {
                drop(state);
                counter!("glue_transport_write_errors_total").increment(1);
                warn!("Write of {} bytes failed: {}", data.len(), e);
                self.emit(TransportEvent::Error(format!("Send error: {}", e)));
                Err(TransportError::Io(e))
            }
        }
    }

    /// Tear down the link and stop the reader. Returns the closed port's name.
    fn shutdown(&self, reader: &mut Option<ReaderHandle>) -> Option<String> {
        let closed = self.state.lock().drop_link();

        let name = closed.map(|(mut link, name)| {
            if let Err(e) = link.flush() {
                warn!("Ignoring error while closing {}: {}", name, e);
            }
            name
        });

        if let Some(handle) = reader.take() {
            handle.stop.store(true, Ordering::Release);
            if handle.join.join().is_err() {
                warn!("Serial reader thread panicked");
            }
        }

        name
    }

    fn emit(&self, event: TransportEvent) {
        // The receiver lives as long as the session; a send error only means
        // nobody is listening any more.
        let _ = self.events.send(event);
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        let mut reader = self.reader.lock();
        self.shutdown(&mut reader);
    }
}

struct ReaderLoop {
    state: Arc<Mutex<LinkState>>,
    events: Sender<TransportEvent>,
    stop: Arc<AtomicBool>,
    generation: u64,
    poll_interval: Duration,
}

impl ReaderLoop {
    fn run(self) {
        debug!("Reader started (generation {})", self.generation);
        let mut buf = [0u8; READ_CHUNK_SIZE];

        while !self.stop.load(Ordering::Acquire) {
            let mut state = self.state.lock();
            if state.generation != self.generation {
                break;
            }
            let Some(link) = state.link.as_mut() else {
                break;
            };

            match read_available(link.as_mut(), &mut buf) {
                Ok(0) => {
                    drop(state);
                    thread::sleep(self.poll_interval);
                }
                Ok(n) => {
                    counter!("glue_transport_bytes_rx_total").increment(n as u64);
                    trace!("rx {}", hex::encode(&buf[..n]));
                    for payload in state.codec.feed(&buf[..n]) {
                        counter!("glue_transport_frames_rx_total").increment(1);
                        let _ = self.events.send(TransportEvent::Message(payload));
                    }
                    MutexGuard::unlock_fair(state);
                }
                Err(e) if is_transient(&e) => {
                    drop(state);
                    thread::sleep(self.poll_interval);
                }
                Err(e) => {
                    let port = state
                        .drop_link()
                        .map(|(_, name)| name)
                        .unwrap_or_default();
                    drop(state);
                    warn!("Read from {} failed, closing link: {}", port, e);
                    let _ = self.events.send(TransportEvent::Error(format!("Read error: {}", e)));
                    let _ = self.events.send(TransportEvent::Disconnected);
                    break;
                }
            }
        }

        debug!("Reader stopped (generation {})", self.generation);
    }
}

/// Read whatever is waiting, without blocking when nothing is.
fn read_available(link: &mut dyn SerialLink, buf: &mut [u8]) -> io::Result<usize> {
    let available = link.bytes_to_read()?;
    if available == 0 {
        return Ok(0);
    }
    let n = available.min(buf.len());
    link.read(&mut buf[..n])
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryConnector;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(2);

    fn transport_with_port(name: &str) -> (Transport, Receiver<TransportEvent>, crate::MemoryDevice) {
        let connector = MemoryConnector::new();
        let device = connector.add_port(name);
        let (transport, events) = Transport::new(Arc::new(connector), Duration::from_millis(1));
        (transport, events, device)
    }

    #[test]
    fn test_send_while_disconnected_is_rejected() {
        let (transport, events, device) = transport_with_port("ttyA");
        assert!(matches!(
            transport.send(b"\x02x\x03"),
            Err(TransportError::NotConnected)
        ));
        assert!(device.take_written().is_empty());
        assert_eq!(device.open_count(), 0);
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_open_and_send() {
        let (transport, events, device) = transport_with_port("ttyA");
        transport.open("ttyA", 115_200).unwrap();
        assert_eq!(
            events.recv_timeout(WAIT).unwrap(),
            TransportEvent::Connected {
                port: "ttyA".to_string()
            }
        );
        assert_eq!(transport.state(), ConnectionState::Connected);
        assert_eq!(transport.port_name().as_deref(), Some("ttyA"));

        transport.send(b"\x02hello\x03").unwrap();
        assert_eq!(device.take_written(), b"\x02hello\x03");
    }

    #[test]
    fn test_open_missing_port_reports_error() {
        let (transport, events, _device) = transport_with_port("ttyA");
        let result = transport.open("ttyZ", 115_200);
        assert!(matches!(result, Err(TransportError::Connection { .. })));
        match events.recv_timeout(WAIT).unwrap() {
            TransportEvent::Error(text) => assert!(text.starts_with("Connection failed")),
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(!transport.is_connected());
    }

    #[test]
    fn test_close_is_idempotent() {
        let (transport, events, _device) = transport_with_port("ttyA");
        transport.close();
        transport.close();
        assert_eq!(events.recv_timeout(WAIT).unwrap(), TransportEvent::Disconnected);
        assert_eq!(events.recv_timeout(WAIT).unwrap(), TransportEvent::Disconnected);
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_inbound_frames_are_published() {
        let (transport, events, device) = transport_with_port("ttyA");
        transport.open("ttyA", 115_200).unwrap();
        let _connected = events.recv_timeout(WAIT).unwrap();

        device.inject(b"\x02fir");
        device.inject(b"st\x03\x02second\x03");

        assert_eq!(
            events.recv_timeout(WAIT).unwrap(),
            TransportEvent::Message(b"first".to_vec())
        );
        assert_eq!(
            events.recv_timeout(WAIT).unwrap(),
            TransportEvent::Message(b"second".to_vec())
        );
    }

    #[test]
    fn test_transient_read_errors_are_ignored() {
        let (transport, events, device) = transport_with_port("ttyA");
        transport.open("ttyA", 115_200).unwrap();
        let _connected = events.recv_timeout(WAIT).unwrap();

        device.fail_reads(Some(io::ErrorKind::TimedOut));
        thread::sleep(Duration::from_millis(20));
        device.fail_reads(None);
        device.inject(b"\x02ok\x03");

        assert_eq!(
            events.recv_timeout(WAIT).unwrap(),
            TransportEvent::Message(b"ok".to_vec())
        );
        assert!(transport.is_connected());
    }
}
