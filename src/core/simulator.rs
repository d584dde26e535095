//! Virtual controller
//!
//! A scriptable stand-in for a chain of sender and receiver cards. It
//! implements [`SerialLink`], so the walker runs against it unchanged; used by
//! the test suite and by `ledwatch poll --simulate`.
//!
//! Each virtual port is either offline (open fails), silent (never answers),
//! or hosts a sender with a number of receivers. Register data can be
//! overridden per receiver, commands can be rejected with a status code, and a
//! port can be told to fail with an I/O error after a number of writes.

use crate::core::protocol::checksum;
use crate::core::protocol::commands;
use crate::core::protocol::frame::{
    CommandTemplate, DATA_LENGTH_OFFSET, RECEIVER_INDEX_OFFSET, STATUS_OFFSET,
};
use crate::core::protocol::registers::{module_status_length, module_status_stride};
use crate::core::transport::{PortCandidate, SerialLink, TransportError};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Build a response to `request`: its header with `status`, a data length
/// in bytes 16-17, `data` from byte 18 and a checksum
pub fn respond(request: &[u8], status: u8, data: &[u8]) -> Vec<u8> {
    let mut response = request[..request.len().min(DATA_LENGTH_OFFSET)].to_vec();
    response.resize(DATA_LENGTH_OFFSET, 0);
    response[0] = 0xAA;
    response[1] = 0x55;
    response[STATUS_OFFSET] = status;
    let length = u16::try_from(data.len()).unwrap_or(u16::MAX);
    response.extend_from_slice(&length.to_le_bytes());
    response.extend_from_slice(data);
    response.extend_from_slice(&[0, 0]);
    checksum::apply(&mut response);
    response
}

/// How a virtual port behaves
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortBehavior {
    /// Open fails
    Offline,
    /// Opens, never answers
    Silent,
    /// A sender card with this many receivers
    Controller {
        /// Receivers in the chain
        receivers: usize,
    },
}

/// One virtual serial port
#[derive(Debug, Clone)]
pub struct VirtualPort {
    /// Port candidate reported by `available_ports`
    pub candidate: PortCandidate,
    /// Behaviour
    pub behavior: PortBehavior,
    /// Fail every write after this many succeeded
    pub fail_after_writes: Option<usize>,
}

/// One answered or rejected query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRecord {
    /// Port the query went to
    pub port: String,
    /// Command name
    pub command: &'static str,
    /// Receiver index for receiver-addressed commands
    pub receiver: Option<u8>,
}

#[derive(Debug, Default)]
struct State {
    ports: Vec<VirtualPort>,
    registers: HashMap<(&'static str, Option<u8>), Vec<u8>>,
    rejections: HashMap<(&'static str, Option<u8>), u8>,
    open: Option<usize>,
    writes: usize,
    pending: Vec<u8>,
    log: Vec<QueryRecord>,
}

/// Virtual sender/receiver chain behind a [`SerialLink`]
#[derive(Debug, Clone)]
pub struct VirtualController {
    state: Arc<Mutex<State>>,
    modules: usize,
    data_groups: usize,
    settle_time: Duration,
}

impl Default for VirtualController {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualController {
    /// Empty controller, four modules of four data groups per receiver
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            modules: 4,
            data_groups: 4,
            settle_time: Duration::ZERO,
        }
    }

    /// One sender with `receivers` receivers on `path`
    pub fn single(path: &str, receivers: usize) -> Self {
        Self::new().with_controller(path, receivers)
    }

    /// Add a port hosting a sender card
    #[must_use]
    pub fn with_controller(self, path: &str, receivers: usize) -> Self {
        self.with_port(path, PortBehavior::Controller { receivers })
    }

    /// Add a port with the given behaviour
    #[must_use]
    pub fn with_port(self, path: &str, behavior: PortBehavior) -> Self {
        self.state.lock().ports.push(VirtualPort {
            candidate: PortCandidate {
                path: path.to_string(),
                description: "Virtual sender card".to_string(),
                hardware_id: "VIRTUAL".to_string(),
            },
            behavior,
            fail_after_writes: None,
        });
        self
    }

    /// Module layout used for flash and live status answers
    #[must_use]
    pub fn with_layout(mut self, modules: usize, data_groups: usize) -> Self {
        self.modules = modules;
        self.data_groups = data_groups;
        self
    }

    /// Delay reported through `settle_time`
    #[must_use]
    pub fn with_settle_time(mut self, settle: Duration) -> Self {
        self.settle_time = settle;
        self
    }

    /// Make writes on `path` fail after `writes` succeeded
    pub fn fail_after(&self, path: &str, writes: usize) {
        let mut state = self.state.lock();
        if let Some(port) = state.ports.iter_mut().find(|p| p.candidate.path == path) {
            port.fail_after_writes = Some(writes);
        }
    }

    /// Override the data bytes (from offset 18) answered for `command`;
    /// `receiver` narrows the override to one receiver
    pub fn set_register(&self, command: &CommandTemplate, receiver: Option<u8>, data: Vec<u8>) {
        self.state.lock().registers.insert((command.name, receiver), data);
    }

    /// Answer `command` with a failure `status`
    pub fn reject(&self, command: &CommandTemplate, receiver: Option<u8>, status: u8) {
        self.state.lock().rejections.insert((command.name, receiver), status);
    }

    /// Queries seen so far
    pub fn query_log(&self) -> Vec<QueryRecord> {
        self.state.lock().log.clone()
    }

    /// Number of queries for `command`
    pub fn count(&self, command: &CommandTemplate) -> usize {
        self.state
            .lock()
            .log
            .iter()
            .filter(|r| r.command == command.name)
            .count()
    }

    fn default_data(&self, command: &CommandTemplate, request: &[u8]) -> Vec<u8> {
        match command.name {
            n if n == commands::CONNECTION.name => vec![0x01, 0x00],
            n if n == commands::SENDER_MODEL.name => vec![0x01, 0x11],
            n if n == commands::SENDER_FIRMWARE.name => vec![4, 5, 0, 0],
            n if n == commands::DISPLAY_BRIGHTNESS.name => vec![0xFF],
            n if n == commands::FUNCTION_CARD.name => vec![0x00, 0x00],
            n if n == commands::ALS_DIRECT.name => vec![0x40, 0x80],
            n if n == commands::ALS_FUNCTION_CARD.name => vec![0x00, 0x00, 0x80, 0x40],
            n if n == commands::ALS_MODE.name => vec![0xFF],
            n if n == commands::ALS_SETTINGS.name => {
                let mut v = vec![0u8; 33];
                v[0] = 1;
                v[4..6].copy_from_slice(&10_000u16.to_le_bytes());
                v[6..8].copy_from_slice(&100u16.to_le_bytes());
                v[8] = 0xFF;
                v[9] = 0x33;
                v[10] = 8;
                v
            }
            n if n == commands::DVI_SIGNAL.name => vec![0x01],
            n if n == commands::INPUT_SOURCE_MODE.name => vec![0x5A],
            n if n == commands::INPUT_SOURCE_SELECTED.name => vec![0x58],
            n if n == commands::INPUT_SOURCE_STATUS.name => vec![0x04],
            n if n == commands::CABINET_WIDTH.name => vec![0x80, 0x00],
            n if n == commands::CABINET_HEIGHT.name => vec![0x80, 0x00],
            n if n == commands::REDUNDANCY.name => vec![0x00],
            n if n == commands::RECEIVER_MODEL.name => vec![0x21, 0x46],
            n if n == commands::RECEIVER_FIRMWARE.name => vec![4, 6, 1, 0x0A],
            n if n == commands::MONITORING.name => {
                let mut v = vec![0u8; 33];
                // 40.0 C, 5.0 V, monitoring card fitted
                v[0] = 0x80;
                v[1] = 0x50;
                v[3] = 0x80 | 50;
                v[32] = 0xFF;
                v
            }
            n if n == commands::RECEIVER_BRIGHTNESS.name => vec![0xFF; 5],
            n if n == commands::KILL_MODE.name => vec![0x00],
            n if n == commands::LOCK_MODE.name => vec![0x00],
            n if n == commands::GAMMA.name => vec![28],
            n if n == commands::RIBBON_CABLE.name => vec![0u8; 16],
            n if n == commands::MODULE_FLASH_READBACK.name => {
                [0x05, 0x05, 0x00, 0x00].repeat(self.modules)
            }
            n if n == commands::MODULE_STATUS.name => {
                let requested = request
                    .get(DATA_LENGTH_OFFSET..DATA_LENGTH_OFFSET + 2)
                    .map_or(0, |b| usize::from(u16::from_le_bytes([b[0], b[1]])));
                let expected = usize::from(module_status_length(self.modules, self.data_groups));
                let stride = module_status_stride(self.data_groups);
                let mut v = vec![0u8; requested.min(expected)];
                for element in v.chunks_mut(stride) {
                    element[0] = 0xFF;
                }
                v
            }
            _ => Vec::new(),
        }
    }

    fn answer(&self, port: usize, request: &[u8]) -> Vec<u8> {
        let Some(command) = commands::identify(request) else {
            tracing::debug!("virtual controller: unknown frame");
            return Vec::new();
        };
        let receiver = command
            .is_receiver_addressed()
            .then(|| request[RECEIVER_INDEX_OFFSET]);

        let (receivers, path) = {
            let state = self.state.lock();
            let p = &state.ports[port];
            let receivers = match p.behavior {
                PortBehavior::Controller { receivers } => receivers,
                _ => return Vec::new(),
            };
            (receivers, p.candidate.path.clone())
        };

        let mut state = self.state.lock();
        state.log.push(QueryRecord {
            port: path,
            command: command.name,
            receiver,
        });

        if receiver.is_some_and(|r| usize::from(r) >= receivers) {
            return respond(request, 0x01, &[]);
        }
        let rejection = state
            .rejections
            .get(&(command.name, receiver))
            .or_else(|| state.rejections.get(&(command.name, None)))
            .copied();
        if let Some(status) = rejection {
            return respond(request, status, &[]);
        }
        let data = state
            .registers
            .get(&(command.name, receiver))
            .or_else(|| state.registers.get(&(command.name, None)))
            .cloned();
        drop(state);

        let data = data.unwrap_or_else(|| self.default_data(command, request));
        respond(request, 0x00, &data)
    }
}

#[async_trait]
impl SerialLink for VirtualController {
    async fn open(&mut self, path: &str) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        let Some(index) = state.ports.iter().position(|p| p.candidate.path == path) else {
            return Err(TransportError::PortNotFound(path.to_string()));
        };
        if state.ports[index].behavior == PortBehavior::Offline {
            return Err(TransportError::ConnectionFailed(format!("{}: device offline", path)));
        }
        state.open = Some(index);
        state.writes = 0;
        state.pending.clear();
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state.open = None;
        state.pending.clear();
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state.lock().open.is_some()
    }

    async fn flush(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if state.open.is_none() {
            return Err(TransportError::NotOpen);
        }
        state.pending.clear();
        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        let port = {
            let mut state = self.state.lock();
            let port = state.open.ok_or(TransportError::NotOpen)?;
            if state.ports[port].fail_after_writes.is_some_and(|n| state.writes >= n) {
                return Err(TransportError::Io(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "virtual device unplugged",
                )));
            }
            state.writes += 1;
            port
        };
        let response = self.answer(port, data);
        self.state.lock().pending.extend_from_slice(&response);
        Ok(data.len())
    }

    async fn read_available(&mut self) -> Result<Bytes, TransportError> {
        let mut state = self.state.lock();
        if state.open.is_none() {
            return Err(TransportError::NotOpen);
        }
        Ok(Bytes::from(std::mem::take(&mut state.pending)))
    }

    fn available_ports(&self) -> Result<Vec<PortCandidate>, TransportError> {
        Ok(self
            .state
            .lock()
            .ports
            .iter()
            .map(|p| p.candidate.clone())
            .collect())
    }

    fn settle_time(&self) -> Duration {
        self.settle_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::protocol::frame::{compose, validate, Patch};
    use crate::core::protocol::registers;

    #[test]
    fn test_respond_layout() {
        let request = compose(&commands::KILL_MODE, &[Patch::ReceiverIndex(2)]);
        let response = respond(request.as_bytes(), 0, &[0xFF]);
        assert_eq!(&response[..2], &[0xAA, 0x55]);
        assert_eq!(response[RECEIVER_INDEX_OFFSET], 2);
        assert_eq!(response[16], 1);
        assert_eq!(response[18], 0xFF);
        assert_eq!(response.len(), 21);
        assert!(checksum::verify(&response));
    }

    #[tokio::test]
    async fn test_controller_answers_registers() {
        let mut sim = VirtualController::single("/dev/ttyV0", 1);
        sim.open("/dev/ttyV0").await.unwrap();

        let frame = compose(&commands::CONNECTION, &[]);
        let raw = sim.exchange(frame.as_bytes()).await.unwrap();
        let payload = validate(&raw).unwrap();
        assert_eq!(registers::decode_connection(&payload), registers::Reading::Value(true));

        let frame = compose(&commands::MONITORING, &[Patch::ReceiverIndex(0)]);
        let payload = validate(&sim.exchange(frame.as_bytes()).await.unwrap()).unwrap();
        let monitoring = registers::decode_monitoring(&payload).into_option().unwrap();
        assert_eq!(monitoring.temperature, registers::Reading::Value(40.0));
        assert_eq!(monitoring.voltage, registers::Reading::Value(5.0));
        assert!(monitoring.monitoring_card);
    }

    #[tokio::test]
    async fn test_missing_receiver_times_out() {
        let mut sim = VirtualController::single("/dev/ttyV0", 2);
        sim.open("/dev/ttyV0").await.unwrap();
        let frame = compose(&commands::RECEIVER_MODEL, &[Patch::ReceiverIndex(2)]);
        let raw = sim.exchange(frame.as_bytes()).await.unwrap();
        assert_eq!(validate(&raw).unwrap_err(), crate::core::protocol::ResponseStatus::Timeout);
    }

    #[tokio::test]
    async fn test_offline_and_silent_ports() {
        let mut sim = VirtualController::new()
            .with_port("/dev/ttyV0", PortBehavior::Offline)
            .with_port("/dev/ttyV1", PortBehavior::Silent);
        assert!(sim.open("/dev/ttyV0").await.is_err());
        sim.open("/dev/ttyV1").await.unwrap();
        let frame = compose(&commands::CONNECTION, &[]);
        assert!(sim.exchange(frame.as_bytes()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fail_after_writes() {
        let mut sim = VirtualController::single("/dev/ttyV0", 1);
        sim.fail_after("/dev/ttyV0", 1);
        sim.open("/dev/ttyV0").await.unwrap();
        let frame = compose(&commands::CONNECTION, &[]);
        assert!(sim.write(frame.as_bytes()).await.is_ok());
        assert!(matches!(sim.write(frame.as_bytes()).await, Err(TransportError::Io(_))));
    }

    #[tokio::test]
    async fn test_module_status_honours_requested_length() {
        let mut sim = VirtualController::single("/dev/ttyV0", 1).with_layout(2, 2);
        sim.open("/dev/ttyV0").await.unwrap();
        let length = module_status_length(2, 2);
        let frame = compose(
            &commands::MODULE_STATUS,
            &[Patch::ReceiverIndex(0), Patch::DataLength(length)],
        );
        let payload = validate(&sim.exchange(frame.as_bytes()).await.unwrap()).unwrap();
        let modules = registers::decode_module_status(&payload, 2, 2).into_option().unwrap();
        assert_eq!(modules.len(), 2);
        assert!(modules.iter().all(|m| m.is_ok()));
    }
}
