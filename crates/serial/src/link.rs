//! Serial link lifecycle.
//!
//! A link owns an optional reader and an optional writer over the same
//! port. The reader runs on a blocking thread and feeds every inbound
//! chunk to both the IMU scanner and the line decoder. Writes are queued
//! and serialized through a single writer thread, so callers never wait
//! on the port. When the stream ends or fails the link reverts to
//! [`LinkState::Disconnected`] and releases the writer; the rest of the
//! session keeps running without haptics.

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use handguide_common::error::{HandguideError, HandguideResult};
use handguide_common::SerialConfig;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use crate::command::DirectionCommand;
use crate::imu::{ImuReading, ImuScanner};
use crate::lines::LineDecoder;

const READ_TIMEOUT: Duration = Duration::from_millis(100);
const READ_CHUNK: usize = 1024;
const LINE_BACKLOG: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    Disconnected,
    Connected,
}

impl LinkState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

/// A serial port visible to the system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortInfo {
    pub name: String,
    pub kind: String,
}

/// List serial ports.
pub fn available_ports() -> HandguideResult<Vec<PortInfo>> {
    let ports = serialport::available_ports().map_err(map_serial_error)?;
    Ok(ports
        .into_iter()
        .map(|p| PortInfo {
            kind: describe_port_type(&p.port_type),
            name: p.port_name,
        })
        .collect())
}

fn describe_port_type(port_type: &serialport::SerialPortType) -> String {
    match port_type {
        serialport::SerialPortType::UsbPort(usb) => {
            let mut kind = format!("usb {:04x}:{:04x}", usb.vid, usb.pid);
            if let Some(product) = &usb.product {
                kind.push(' ');
                kind.push_str(product);
            }
            kind
        }
        serialport::SerialPortType::PciPort => "pci".to_string(),
        serialport::SerialPortType::BluetoothPort => "bluetooth".to_string(),
        serialport::SerialPortType::Unknown => "unknown".to_string(),
    }
}

fn map_serial_error(err: serialport::Error) -> HandguideError {
    match err.kind {
        serialport::ErrorKind::NoDevice => HandguideError::serial(format!("no device: {}", err.description)),
        serialport::ErrorKind::Io(io::ErrorKind::PermissionDenied) => HandguideError::PermissionDenied {
            message: err.description,
        },
        serialport::ErrorKind::Io(io::ErrorKind::NotFound) => {
            HandguideError::serial(format!("port not found: {}", err.description))
        }
        _ => HandguideError::serial(err.description),
    }
}

type Writer = mpsc::UnboundedSender<Vec<u8>>;

struct Shared {
    port: String,
    state: watch::Sender<LinkState>,
    imu: watch::Sender<Option<ImuReading>>,
    line: watch::Sender<Option<String>>,
    command: watch::Sender<DirectionCommand>,
    lines: broadcast::Sender<String>,
    writer: Mutex<Option<Writer>>,
    closed: AtomicBool,
}

impl Shared {
    /// Revert to disconnected and drop the writer queue. Idempotent.
    fn disconnect(&self) {
        self.closed.store(true, Ordering::SeqCst);
        if let Ok(mut writer) = self.writer.lock() {
            writer.take();
        }
        self.state.send_if_modified(|state| {
            let changed = state.is_connected();
            *state = LinkState::Disconnected;
            changed
        });
    }

    fn writer(&self) -> Option<Writer> {
        self.writer.lock().ok().and_then(|w| w.clone())
    }
}

/// Connection to the wearable.
pub struct SerialLink {
    shared: Arc<Shared>,
    reader: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
}

impl SerialLink {
    /// Open `port` at the configured baud rate.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(port: &str, config: &SerialConfig) -> HandguideResult<Self> {
        tracing::info!(port, baud = config.baud_rate, "Opening serial port");
        let reader = serialport::new(port, config.baud_rate)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(map_serial_error)?;
        let writer = reader.try_clone().map_err(map_serial_error)?;
        Ok(Self::from_io(
            port,
            Some(Box::new(reader)),
            Some(Box::new(writer)),
            &config.line_delimiter,
        ))
    }

    /// Build a link over arbitrary streams. Either half may be absent.
    ///
    /// Must be called from within a tokio runtime.
    pub fn from_io(
        port: &str,
        reader: Option<Box<dyn Read + Send>>,
        writer: Option<Box<dyn Write + Send>>,
        line_delimiter: &str,
    ) -> Self {
        let (state, _) = watch::channel(LinkState::Connected);
        let (imu, _) = watch::channel(None);
        let (line, _) = watch::channel(None);
        let (command, _) = watch::channel(DirectionCommand::default());
        let (lines, _) = broadcast::channel(LINE_BACKLOG);

        let shared = Arc::new(Shared {
            port: port.to_string(),
            state,
            imu,
            line,
            command,
            lines,
            writer: Mutex::new(None),
            closed: AtomicBool::new(false),
        });

        let writer_handle = writer.map(|w| {
            let (tx, rx) = mpsc::unbounded_channel();
            if let Ok(mut slot) = shared.writer.lock() {
                *slot = Some(tx);
            }
            spawn_writer(shared.clone(), w, rx)
        });

        let reader = reader.map(|r| spawn_reader(shared.clone(), r, LineDecoder::new(line_delimiter)));
        tracing::info!(
            port,
            reader = reader.is_some(),
            writer = writer_handle.is_some(),
            "Serial link connected"
        );

        Self {
            shared,
            reader,
            writer: writer_handle,
        }
    }

    pub fn port(&self) -> &str {
        &self.shared.port
    }

    pub fn state(&self) -> LinkState {
        *self.shared.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<LinkState> {
        self.shared.state.subscribe()
    }

    /// Most recent fully decoded IMU frame.
    pub fn latest_imu(&self) -> Option<ImuReading> {
        *self.shared.imu.borrow()
    }

    pub fn subscribe_imu(&self) -> watch::Receiver<Option<ImuReading>> {
        self.shared.imu.subscribe()
    }

    pub fn latest_line(&self) -> Option<String> {
        self.shared.line.borrow().clone()
    }

    /// Every decoded line from now on. Slow receivers lag and skip.
    pub fn subscribe_lines(&self) -> broadcast::Receiver<String> {
        self.shared.lines.subscribe()
    }

    /// Last command queued for sending.
    pub fn last_command(&self) -> DirectionCommand {
        *self.shared.command.borrow()
    }

    pub fn subscribe_commands(&self) -> watch::Receiver<DirectionCommand> {
        self.shared.command.subscribe()
    }

    /// Queue raw bytes. Does not wait for the port.
    pub fn write(&self, bytes: Vec<u8>) -> HandguideResult<()> {
        if !self.is_connected() {
            return Err(HandguideError::serial("not connected"));
        }
        let writer = self
            .shared
            .writer()
            .ok_or_else(|| HandguideError::serial("link has no writer"))?;
        writer
            .send(bytes)
            .map_err(|_| HandguideError::serial("writer closed"))
    }

    /// Queue a direction command and record it as the last sent.
    pub fn send_command(&self, command: DirectionCommand) -> HandguideResult<()> {
        self.write(command.encode().to_vec())?;
        self.shared.command.send_replace(command);
        Ok(())
    }

    /// Disconnect without waiting for the threads.
    pub fn close(&self) {
        if self.is_connected() {
            tracing::info!(port = %self.shared.port, "Closing serial link");
        }
        self.shared.disconnect();
    }

    /// Disconnect and wait for the reader and writer to finish.
    ///
    /// A reader blocked on a stream without a read timeout finishes only
    /// once the stream yields.
    pub async fn shutdown(mut self) {
        self.close();
        for handle in [self.writer.take(), self.reader.take()].into_iter().flatten() {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Serial thread panicked");
            }
        }
    }
}

impl Drop for SerialLink {
    fn drop(&mut self) {
        self.shared.disconnect();
    }
}

impl std::fmt::Debug for SerialLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLink")
            .field("port", &self.shared.port)
            .field("state", &self.state())
            .finish()
    }
}

fn spawn_writer(
    shared: Arc<Shared>,
    mut writer: Box<dyn Write + Send>,
    mut rx: mpsc::UnboundedReceiver<Vec<u8>>,
) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        while let Some(bytes) = rx.blocking_recv() {
            if let Err(e) = writer.write_all(&bytes).and_then(|_| writer.flush()) {
                tracing::error!(port = %shared.port, error = %e, "Serial write failed");
                shared.disconnect();
                break;
            }
        }
        tracing::debug!(port = %shared.port, "Serial writer released");
    })
}

fn spawn_reader(
    shared: Arc<Shared>,
    mut reader: Box<dyn Read + Send>,
    mut lines: LineDecoder,
) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        let mut imu = ImuScanner::new();
        let mut chunk = [0u8; READ_CHUNK];

        let result = loop {
            if shared.closed.load(Ordering::SeqCst) {
                break Ok(());
            }
            match reader.read(&mut chunk) {
                Ok(0) => break Ok(()),
                Ok(n) => {
                    let bytes = &chunk[..n];
                    if let Some(reading) = imu.push(bytes) {
                        shared.imu.send_replace(Some(reading));
                    }
                    for line in lines.push(bytes) {
                        tracing::trace!(line = %line, "Serial line");
                        let _ = shared.lines.send(line.clone());
                        shared.line.send_replace(Some(line));
                    }
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                    ) => {}
                Err(e) => break Err(e),
            }
        };

        match result {
            Ok(()) => tracing::info!(port = %shared.port, frames = imu.frames(), "Serial stream ended"),
            Err(e) => tracing::error!(port = %shared.port, error = %e, "Serial read failed"),
        }
        drop(reader);
        shared.disconnect();
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_writer_only_link() {
        let link = SerialLink::from_io("mem", None, Some(Box::new(io::sink())), "\n");
        assert!(link.is_connected());
        link.send_command(DirectionCommand::from_vector(1.0, 0.0)).unwrap();
        assert_eq!(link.last_command().right, 255);

        link.close();
        assert!(!link.is_connected());
        assert!(link.send_command(DirectionCommand::default()).is_err());
        link.shutdown().await;
    }

    #[tokio::test]
    async fn test_reader_only_link_rejects_writes() {
        let link = SerialLink::from_io("mem", Some(Box::new(io::empty())), None, "\n");
        let mut state = link.subscribe_state();
        assert!(link.write(vec![1]).is_err());
        state.wait_for(|s| !s.is_connected()).await.unwrap();
        link.shutdown().await;
    }
}
