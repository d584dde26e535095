//! Serial port transport implementation

use super::{PortCandidate, SerialLink, TransportError};
use async_trait::async_trait;
use bytes::Bytes;
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, SerialPortType, StopBits};
use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Duration;

/// Line settings shared by every port the walker opens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSettings {
    /// Baud rate
    pub baud_rate: u32,
    /// Delay between a write and reading the response
    pub settle_time: Duration,
    /// Blocking read timeout
    pub read_timeout: Duration,
}

impl SerialSettings {
    /// 8N1 settings at `baud_rate`
    pub fn new(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            settle_time: Duration::from_millis(300),
            read_timeout: Duration::from_millis(100),
        }
    }

    /// Set the settle delay
    #[must_use]
    pub fn settle_time(mut self, settle: Duration) -> Self {
        self.settle_time = settle;
        self
    }

    /// Set the read timeout
    #[must_use]
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self::new(115_200)
    }
}

/// Serial port transport
pub struct SerialTransport {
    settings: SerialSettings,
    path: Option<String>,
    port: Arc<parking_lot::Mutex<Option<Box<dyn SerialPort + Send>>>>,
}

impl SerialTransport {
    /// Create a closed transport
    pub fn new(settings: SerialSettings) -> Self {
        Self {
            settings,
            path: None,
            port: Arc::new(parking_lot::Mutex::new(None)),
        }
    }

    /// Path of the open port
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Line settings
    pub fn settings(&self) -> &SerialSettings {
        &self.settings
    }
}

fn map_open_error(path: &str, e: serialport::Error) -> TransportError {
    match e.kind() {
        serialport::ErrorKind::NoDevice => TransportError::PortNotFound(path.to_string()),
        serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied) => {
            TransportError::PermissionDenied(path.to_string())
        }
        serialport::ErrorKind::Io(std::io::ErrorKind::NotFound) => {
            TransportError::PortNotFound(path.to_string())
        }
        _ => TransportError::ConnectionFailed(e.to_string()),
    }
}

#[async_trait]
impl SerialLink for SerialTransport {
    async fn open(&mut self, path: &str) -> Result<(), TransportError> {
        self.close().await?;
        let port = serialport::new(path, self.settings.baud_rate)
            .data_bits(DataBits::Eight)
            .stop_bits(StopBits::One)
            .parity(Parity::None)
            .flow_control(FlowControl::None)
            .timeout(self.settings.read_timeout)
            .open()
            .map_err(|e| map_open_error(path, e))?;

        *self.port.lock() = Some(port);
        self.path = Some(path.to_string());
        tracing::debug!("{} opened", path);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if self.port.lock().take().is_some() {
            if let Some(path) = self.path.take() {
                tracing::debug!("{} closed", path);
            }
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.lock().is_some()
    }

    async fn flush(&mut self) -> Result<(), TransportError> {
        let mut guard = self.port.lock();
        let port = guard.as_mut().ok_or(TransportError::NotOpen)?;
        port.clear(ClearBuffer::All)
            .map_err(|e| TransportError::Io(e.into()))
    }

    async fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        let mut guard = self.port.lock();
        let port = guard.as_mut().ok_or(TransportError::NotOpen)?;
        port.write_all(data)?;
        port.flush()?;
        Ok(data.len())
    }

    async fn read_available(&mut self) -> Result<Bytes, TransportError> {
        let mut guard = self.port.lock();
        let port = guard.as_mut().ok_or(TransportError::NotOpen)?;

        let pending = port
            .bytes_to_read()
            .map_err(|e| TransportError::Io(e.into()))? as usize;
        if pending == 0 {
            return Ok(Bytes::new());
        }

        let mut buffer = vec![0u8; pending];
        match port.read(&mut buffer) {
            Ok(n) => {
                buffer.truncate(n);
                Ok(Bytes::from(buffer))
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(Bytes::new()),
            Err(e) => Err(TransportError::Io(e)),
        }
    }

    fn available_ports(&self) -> Result<Vec<PortCandidate>, TransportError> {
        list_ports()
    }

    fn settle_time(&self) -> Duration {
        self.settings.settle_time
    }
}

/// List serial ports the host knows about
pub fn list_ports() -> Result<Vec<PortCandidate>, TransportError> {
    let ports = serialport::available_ports().map_err(|e| TransportError::Io(e.into()))?;
    Ok(ports
        .into_iter()
        .map(|info| {
            let (description, hardware_id) = match info.port_type {
                SerialPortType::UsbPort(usb) => (
                    usb.product.unwrap_or_default(),
                    format!(
                        "USB VID:PID={:04X}:{:04X} SER={}",
                        usb.vid,
                        usb.pid,
                        usb.serial_number.unwrap_or_default()
                    ),
                ),
                SerialPortType::PciPort => ("PCI".to_string(), String::new()),
                SerialPortType::BluetoothPort => ("Bluetooth".to_string(), String::new()),
                SerialPortType::Unknown => (String::new(), String::new()),
            };
            PortCandidate {
                path: info.port_name,
                description,
                hardware_id,
            }
        })
        .collect())
}
