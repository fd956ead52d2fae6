//! In-memory serial ports.
//!
//! [`MemoryConnector`] stands in for the host's serial ports. Each registered
//! port has a [`MemoryDevice`] handle that plays the controller side: it
//! injects bytes towards the host, collects what the host wrote, and can be told
//! to fail reads, writes or flushes.

use crate::link::{SerialConnector, SerialLink};
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::io;
use std::sync::Arc;

#[derive(Debug, Default)]
struct DeviceState {
    to_host: VecDeque<u8>,
    from_host: Vec<u8>,
    claimed: bool,
    opens: usize,
    closes: usize,
    read_error: Option<io::ErrorKind>,
    write_error: Option<io::ErrorKind>,
    flush_error: Option<io::ErrorKind>,
}

/// Controller-side handle of an in-memory port.
#[derive(Debug, Clone)]
pub struct MemoryDevice {
    state: Arc<Mutex<DeviceState>>,
}

impl MemoryDevice {
    /// Queue bytes for the host to read.
    pub fn inject(&self, data: &[u8]) {
        self.state.lock().to_host.extend(data);
    }

    /// Take everything the host has written so far.
    pub fn take_written(&self) -> Vec<u8> {
        std::mem::take(&mut self.state.lock().from_host)
    }

    /// Whether the host currently holds the port open.
    pub fn is_open(&self) -> bool {
        self.state.lock().claimed
    }

    /// Number of times the port has been opened.
    pub fn open_count(&self) -> usize {
        self.state.lock().opens
    }

    /// Number of times the port has been closed.
    pub fn close_count(&self) -> usize {
        self.state.lock().closes
    }

    /// Make every subsequent read fail with `kind` (`None` to clear).
    pub fn fail_reads(&self, kind: Option<io::ErrorKind>) {
        self.state.lock().read_error = kind;
    }

    /// Make every subsequent write fail with `kind` (`None` to clear).
    pub fn fail_writes(&self, kind: Option<io::ErrorKind>) {
        self.state.lock().write_error = kind;
    }

    /// Make every subsequent flush fail with `kind` (`None` to clear).
    pub fn fail_flush(&self, kind: Option<io::ErrorKind>) {
        self.state.lock().flush_error = kind;
    }
}

/// A set of in-memory ports.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    ports: Arc<Mutex<BTreeMap<String, MemoryDevice>>>,
}

impl MemoryConnector {
    /// Create a connector with no ports.
    pub fn new() -> Self {
        MemoryConnector::default()
    }

    /// Register a port and return its controller-side handle.
    pub fn add_port(&self, name: &str) -> MemoryDevice {
        let device = MemoryDevice {
            state: Arc::new(Mutex::new(DeviceState::default())),
        };
        self.ports.lock().insert(name.to_string(), device.clone());
        device
    }

    /// Unplug a port. Links already open keep working until closed.
    pub fn remove_port(&self, name: &str) {
        self.ports.lock().remove(name);
    }
}

impl SerialConnector for MemoryConnector {
    fn list_ports(&self) -> io::Result<Vec<String>> {
        Ok(self.ports.lock().keys().cloned().collect())
    }

    fn open(&self, port: &str, _baud_rate: u32) -> io::Result<Box<dyn SerialLink>> {
        let device = self.ports.lock().get(port).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no such port: {}", port))
        })?;

        {
            let mut state = device.state.lock();
            if state.claimed {
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    format!("port {} is already in use", port),
                ));
            }
            state.claimed = true;
            state.opens += 1;
        }

        Ok(Box::new(MemoryLink { device }))
    }
}

struct MemoryLink {
    device: MemoryDevice,
}

impl SerialLink for MemoryLink {
    fn bytes_to_read(&mut self) -> io::Result<usize> {
        let state = self.device.state.lock();
        if let Some(kind) = state.read_error {
            return Err(io::Error::new(kind, "injected read failure"));
        }
        Ok(state.to_host.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.device.state.lock();
        if let Some(kind) = state.read_error {
            return Err(io::Error::new(kind, "injected read failure"));
        }
        let n = buf.len().min(state.to_host.len());
        for (slot, byte) in buf.iter_mut().zip(state.to_host.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        let mut state = self.device.state.lock();
        if let Some(kind) = state.write_error {
            return Err(io::Error::new(kind, "injected write failure"));
        }
        state.from_host.extend_from_slice(data);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.device.state.lock().flush_error {
            Some(kind) => Err(io::Error::new(kind, "injected flush failure")),
            None => Ok(()),
        }
    }
}

impl Drop for MemoryLink {
    fn drop(&mut self) {
        let mut state = self.device.state.lock();
        state.claimed = false;
        state.closes += 1;
    }
}
