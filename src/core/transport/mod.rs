//! Serial link abstraction
//!
//! The walker talks to sender cards through [`SerialLink`]: open a port,
//! flush, write a frame, wait a fixed settle interval, read whatever bytes
//! arrived. The real implementation is [`SerialTransport`]; tests and the
//! `--simulate` mode use the virtual controller in `core::simulator`.

mod serial;

pub use serial::{list_ports, SerialSettings, SerialTransport};

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Transport error types
#[derive(Error, Debug)]
pub enum TransportError {
    /// Port does not exist
    #[error("Port not found: {0}")]
    PortNotFound(String),

    /// Port exists but may not be opened by this user
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Any other open failure
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Operation on a closed link
    #[error("Port not open")]
    NotOpen,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A serial port that may host a sender card
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortCandidate {
    /// Device path (`/dev/ttyUSB0`, `COM3`)
    pub path: String,
    /// Human readable description
    pub description: String,
    /// USB vendor/product and serial, when known
    pub hardware_id: String,
}

impl PortCandidate {
    /// Candidate with only a path
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            description: String::new(),
            hardware_id: String::new(),
        }
    }
}

/// Request/response access to one serial port at a time
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SerialLink: Send {
    /// Open `path`, closing any port already open
    async fn open(&mut self, path: &str) -> Result<(), TransportError>;

    /// Close the current port; closing a closed link is a no-op
    async fn close(&mut self) -> Result<(), TransportError>;

    /// Whether a port is open
    fn is_open(&self) -> bool;

    /// Discard pending input and output
    async fn flush(&mut self) -> Result<(), TransportError>;

    /// Write a whole frame
    async fn write(&mut self, data: &[u8]) -> Result<usize, TransportError>;

    /// Read every byte currently buffered; empty when nothing arrived
    async fn read_available(&mut self) -> Result<Bytes, TransportError>;

    /// Ports that may host a sender card
    fn available_ports(&self) -> Result<Vec<PortCandidate>, TransportError>;

    /// Fixed delay between a write and the matching read
    fn settle_time(&self) -> Duration;

    /// Write, wait the settle interval, read what arrived
    async fn exchange(&mut self, frame: &[u8]) -> Result<Bytes, TransportError> {
        self.write(frame).await?;
        tokio::time::sleep(self.settle_time()).await;
        self.read_available().await
    }
}
