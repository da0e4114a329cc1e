//! Byte sinks that carry encoded commands to the head.
//!
//! The core only needs `write` and `close`; it never reads back. Callers pick
//! a variant ([`LoggingTransport`] for simulation, [`SerialTransport`] for a
//! device, [`RecordingTransport`] for tests and dry runs) and hand it to an
//! [`ActuatorState`](crate::actuator::ActuatorState), which owns it for the
//! session.
//!
//! `close` is idempotent on every variant. Writing after close fails with
//! [`TransportError::Closed`].

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::TransportConfig;
use crate::error::TransportError;

/// Capability set required from a command sink.
pub trait Transport: Send {
    /// Fire-and-forget write of one encoded command.
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Release the sink. Calling it again is a no-op.
    fn close(&mut self) -> Result<(), TransportError>;

    fn is_closed(&self) -> bool;

    /// Short human-readable name used in logs.
    fn label(&self) -> &str;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        (**self).write(bytes)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        (**self).close()
    }

    fn is_closed(&self) -> bool {
        (**self).is_closed()
    }

    fn label(&self) -> &str {
        (**self).label()
    }
}

/// Build the transport selected by configuration.
pub fn open_transport(cfg: &TransportConfig) -> Result<Box<dyn Transport>, TransportError> {
    match cfg {
        TransportConfig::Logging { label } => Ok(Box::new(LoggingTransport::new(label.clone()))),
        TransportConfig::Serial { path, baud } => {
            Ok(Box::new(SerialTransport::open(path, *baud)?))
        }
    }
}

/// Simulation transport: logs every command and keeps a copy.
#[derive(Debug, Default)]
pub struct LoggingTransport {
    label: String,
    sent: Vec<String>,
    closed: bool,
    close_calls: usize,
}

impl LoggingTransport {
    pub fn new(label: impl Into<String>) -> Self {
        let label = label.into();
        log::info!("[{label}] simulated transport opened");
        Self {
            label,
            ..Self::default()
        }
    }

    /// Commands written so far, oldest first.
    pub fn sent(&self) -> &[String] {
        &self.sent
    }

    /// Number of `close()` calls that actually released the sink.
    pub fn close_count(&self) -> usize {
        self.close_calls
    }
}

impl Transport for LoggingTransport {
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed {
                label: self.label.clone(),
            });
        }
        let text = String::from_utf8_lossy(bytes).into_owned();
        log::info!("[{}] send {}", self.label, text);
        self.sent.push(text);
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        if !self.closed {
            self.closed = true;
            self.close_calls += 1;
            log::info!("[{}] simulated transport closed", self.label);
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn label(&self) -> &str {
        &self.label
    }
}

/// Transport writing raw command bytes to an exclusively owned writer,
/// normally a serial device node.
///
/// Line settings (baud, framing) are applied outside this crate; the baud
/// rate is kept for logging only.
#[derive(Debug)]
pub struct SerialTransport<W: Write + Send = File> {
    label: String,
    baud: u32,
    writer: Option<W>,
}

impl SerialTransport<File> {
    /// Open a device node for writing.
    pub fn open(path: impl AsRef<Path>, baud: u32) -> Result<Self, TransportError> {
        let path = path.as_ref();
        let label = path.display().to_string();
        let file = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|source| TransportError::Io {
                label: label.clone(),
                source,
            })?;
        log::info!("[{label}] serial device opened; baud {baud} requested, line settings left to the OS");
        Ok(Self::from_writer(file, label, baud))
    }
}

impl<W: Write + Send> SerialTransport<W> {
    pub fn from_writer(writer: W, label: impl Into<String>, baud: u32) -> Self {
        Self {
            label: label.into(),
            baud,
            writer: Some(writer),
        }
    }

    /// Requested baud rate. Recorded for logs, never applied to the line.
    pub fn baud(&self) -> u32 {
        self.baud
    }

    /// The underlying writer, until the transport is closed.
    pub fn get_ref(&self) -> Option<&W> {
        self.writer.as_ref()
    }

    fn io_error(&self, source: std::io::Error) -> TransportError {
        TransportError::Io {
            label: self.label.clone(),
            source,
        }
    }
}

impl<W: Write + Send> Transport for SerialTransport<W> {
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(TransportError::Closed {
                label: self.label.clone(),
            });
        };
        let res = writer.write_all(bytes).and_then(|_| writer.flush());
        res.map_err(|e| self.io_error(e))
    }

    fn close(&mut self) -> Result<(), TransportError> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(());
        };
        log::info!("[{}] serial port closed", self.label);
        writer.flush().map_err(|e| self.io_error(e))
    }

    fn is_closed(&self) -> bool {
        self.writer.is_none()
    }

    fn label(&self) -> &str {
        &self.label
    }
}

#[derive(Debug, Default)]
struct RecordingLog {
    commands: Vec<String>,
    closed: bool,
    close_calls: usize,
}

/// In-memory transport whose log is shared between clones, so a test can
/// keep a handle after the session has taken ownership of the transport.
#[derive(Clone, Debug, Default)]
pub struct RecordingTransport {
    log: Arc<Mutex<RecordingLog>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> Vec<String> {
        self.log.lock().commands.clone()
    }

    pub fn close_count(&self) -> usize {
        self.log.lock().close_calls
    }

    pub fn clear(&self) {
        self.log.lock().commands.clear();
    }
}

impl Transport for RecordingTransport {
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let mut log = self.log.lock();
        if log.closed {
            return Err(TransportError::Closed {
                label: "recording".into(),
            });
        }
        log.commands
            .push(String::from_utf8_lossy(bytes).into_owned());
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        let mut log = self.log.lock();
        if !log.closed {
            log.closed = true;
            log.close_calls += 1;
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.log.lock().closed
    }

    fn label(&self) -> &str {
        "recording"
    }
}
