//! Serial port abstraction.
//!
//! The transport talks to the hardware through two small traits so it can run
//! against a real port ([`SystemConnector`], backed by the `serialport` crate)
//! or an in-memory peer ([`MemoryConnector`](crate::MemoryConnector)).

use std::io::{self, Read, Write};
use std::time::Duration;

/// An open, bidirectional serial link.
pub trait SerialLink: Send {
    /// Number of received bytes that can be read without blocking.
    fn bytes_to_read(&mut self) -> io::Result<usize>;

    /// Read up to `buf.len()` bytes.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write all of `data`, bounded by the link's write timeout.
    fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Flush pending output.
    fn flush(&mut self) -> io::Result<()>;
}

/// Enumerates and opens serial ports.
pub trait SerialConnector: Send + Sync {
    /// Names of the ports currently present on the host.
    fn list_ports(&self) -> io::Result<Vec<String>>;

    /// Open `port` at `baud_rate`.
    fn open(&self, port: &str, baud_rate: u32) -> io::Result<Box<dyn SerialLink>>;
}

/// Connector for the host's real serial ports.
#[derive(Debug, Clone)]
pub struct SystemConnector {
    timeout: Duration,
}

impl SystemConnector {
    /// Create a connector whose ports use `timeout` for reads and writes.
    pub fn new(timeout: Duration) -> Self {
        SystemConnector { timeout }
    }
}

impl SerialConnector for SystemConnector {
    fn list_ports(&self) -> io::Result<Vec<String>> {
        let mut names: Vec<String> = serialport::available_ports()?
            .into_iter()
            .map(|p| p.port_name)
            .collect();
        names.sort();
        Ok(names)
    }

    fn open(&self, port: &str, baud_rate: u32) -> io::Result<Box<dyn SerialLink>> {
        let mut serial = serialport::new(port, baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .timeout(self.timeout)
            .open()?;

        serial.write_data_terminal_ready(true)?;
        serial.write_request_to_send(true)?;

        Ok(Box::new(SystemLink { serial }))
    }
}

struct SystemLink {
    serial: Box<dyn serialport::SerialPort>,
}

impl SerialLink for SystemLink {
    fn bytes_to_read(&mut self) -> io::Result<usize> {
        Ok(self.serial.bytes_to_read()? as usize)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Read::read(&mut self.serial, buf)
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        Write::write_all(&mut self.serial, data)
    }

    fn flush(&mut self) -> io::Result<()> {
        Write::flush(&mut self.serial)
    }
}
