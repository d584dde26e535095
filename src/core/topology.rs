//! Topology snapshot
//!
//! One poll produces one [`Topology`]: every sender-card port that was
//! walked, the receiver chain behind each connected sender, and the list of
//! register reads that came back empty. The walker owns the snapshot while
//! it is being built and hands it off by value once the poll ends.

use crate::core::protocol::registers::{
    AlsMode, AlsSettings, AmbientLight, Brightness, DviSignal, FunctionCardModel, InputSelection,
    InputSourceMode, InputStatus, KillMode, LockMode, Monitoring, ReceiverBrightness, Redundancy,
    RibbonCable,
};
use crate::core::protocol::{ModelId, Module, Reading, RegisterKind, ResponseStatus};
use crate::core::walker::PollError;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt;

/// How the walk of one port ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PortOutcome {
    /// A sender card answered the connection probe
    Connected,
    /// The port opened but nothing acknowledged the probe
    NotConnected,
    /// The port could not be opened
    OpenFailed,
    /// A transport error interrupted enumeration; reported as unknown
    #[serde(rename = "UNKNOWN")]
    Aborted,
}

impl fmt::Display for PortOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PortOutcome::Connected => "connected",
            PortOutcome::NotConnected => "not connected",
            PortOutcome::OpenFailed => "open failed",
            PortOutcome::Aborted => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Why a register read produced no value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MissCause {
    /// Nothing arrived within the settle interval
    NoData,
    /// The controller answered with a failure status
    Status(ResponseStatus),
    /// `Ok` response too short for the register layout
    Undecodable,
    /// The link failed mid-walk
    Transport(String),
}

impl fmt::Display for MissCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissCause::NoData => write!(f, "no data available at the input buffer"),
            MissCause::Status(status) => write!(f, "command failed: {}", status),
            MissCause::Undecodable => write!(f, "response too short"),
            MissCause::Transport(e) => write!(f, "transport error: {}", e),
        }
    }
}

/// A register read that produced the not-available sentinel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisterMiss {
    /// Port of the sender card
    pub port: String,
    /// Receiver index, `None` for sender registers
    pub receiver: Option<u8>,
    /// Register that missed
    pub register: RegisterKind,
    /// What went wrong
    pub cause: MissCause,
}

/// Input source registers of multi-input senders
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InputSource {
    /// Manual or automatic selection
    pub mode: Reading<InputSourceMode>,
    /// Selected input
    pub selected: Reading<InputSelection>,
    /// First input with a valid signal
    pub status: Reading<InputStatus>,
}

/// Cabinet size in pixels
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CabinetSize {
    /// Width
    pub width: Reading<u16>,
    /// Height
    pub height: Reading<u16>,
}

/// One receiver card in a sender's chain
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReceiverCard {
    /// Chain index (byte 8 of every receiver command)
    pub index: u8,
    pub model: Reading<ModelId>,
    pub firmware: Reading<String>,
    pub kill_mode: Reading<KillMode>,
    pub lock_mode: Reading<LockMode>,
    pub brightness: Reading<ReceiverBrightness>,
    pub ribbon_cable: Reading<RibbonCable>,
    pub monitoring: Reading<Monitoring>,
    pub gamma: Reading<f64>,
    pub modules: Reading<Vec<Module>>,
}

impl ReceiverCard {
    /// Receiver at `index` with nothing read yet
    pub fn new(index: u8) -> Self {
        Self {
            index,
            ..Self::default()
        }
    }
}

/// One sender-card port and everything read through it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SenderCard {
    /// Device path
    pub port: String,
    /// Port description from the OS
    pub description: String,
    /// Hardware id from the OS
    pub hardware_id: String,
    /// A sender card answered on this port
    pub discovered: bool,
    /// How the walk ended
    pub outcome: PortOutcome,
    pub model: Reading<ModelId>,
    pub firmware: Reading<String>,
    pub display_brightness: Reading<Brightness>,
    pub function_card: Reading<FunctionCardModel>,
    pub ambient_light: Reading<AmbientLight>,
    pub als_mode: Reading<AlsMode>,
    pub als_settings: Reading<AlsSettings>,
    pub dvi_signal: Reading<DviSignal>,
    /// Only read on multi-input senders
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_source: Option<InputSource>,
    pub cabinet_size: CabinetSize,
    pub redundancy: Reading<Redundancy>,
    pub receivers: Vec<ReceiverCard>,
}

impl SenderCard {
    /// Port not yet probed
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            description: String::new(),
            hardware_id: String::new(),
            discovered: false,
            outcome: PortOutcome::NotConnected,
            model: Reading::NotAvailable,
            firmware: Reading::NotAvailable,
            display_brightness: Reading::NotAvailable,
            function_card: Reading::NotAvailable,
            ambient_light: Reading::NotAvailable,
            als_mode: Reading::NotAvailable,
            als_settings: Reading::NotAvailable,
            dvi_signal: Reading::NotAvailable,
            input_source: None,
            cabinet_size: CabinetSize::default(),
            redundancy: Reading::NotAvailable,
            receivers: Vec::new(),
        }
    }
}

/// Expected topology sizes from the configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Expectations {
    /// Sender cards that should answer
    pub devices: Option<usize>,
    /// Receiver cards that should be enumerated, across all senders
    pub receiver_cards: Option<usize>,
}

/// Result of one poll
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Topology {
    /// When the poll started
    pub polled_at: DateTime<Local>,
    /// Every walked port, in walk order
    pub senders: Vec<SenderCard>,
    /// Register reads that came back empty
    pub misses: Vec<RegisterMiss>,
}

impl Default for Topology {
    fn default() -> Self {
        Self::new()
    }
}

impl Topology {
    /// Empty snapshot stamped now
    pub fn new() -> Self {
        Self {
            polled_at: Local::now(),
            senders: Vec::new(),
            misses: Vec::new(),
        }
    }

    /// Senders that answered the connection probe
    pub fn connected(&self) -> impl Iterator<Item = &SenderCard> {
        self.senders.iter().filter(|s| s.discovered)
    }

    /// Number of sender cards found
    pub fn devices_found(&self) -> usize {
        self.connected().count()
    }

    /// Receivers enumerated across all senders
    pub fn receiver_count(&self) -> usize {
        self.senders.iter().map(|s| s.receivers.len()).sum()
    }

    fn missed(&self, port: &str, receiver: Option<u8>, register: RegisterKind) -> bool {
        self.misses
            .iter()
            .any(|m| m.port == port && m.receiver == receiver && m.register == register)
    }

    /// Every cabinet whose kill mode was attempted reports `On`
    pub fn display_on(&self) -> bool {
        self.senders.iter().all(|s| {
            s.receivers.iter().all(|r| match r.kill_mode.value() {
                Some(k) => k.is_on(),
                None => !self.missed(&s.port, Some(r.index), RegisterKind::KillMode),
            })
        })
    }

    /// No module reported an error and no module read came back empty
    pub fn modules_ok(&self) -> bool {
        self.senders.iter().all(|s| {
            s.receivers.iter().all(|r| match r.modules.value() {
                Some(modules) => modules.iter().all(Module::is_ok),
                None => {
                    !self.missed(&s.port, Some(r.index), RegisterKind::ModuleFlash)
                        && !self.missed(&s.port, Some(r.index), RegisterKind::ModuleStatus)
                }
            })
        })
    }

    /// At least one sender found and every found sender sees a valid DVI signal
    pub fn dvi_valid(&self) -> bool {
        self.devices_found() > 0
            && self
                .connected()
                .all(|s| s.dvi_signal == Reading::Value(DviSignal::Valid))
    }

    /// Ports whose walk was interrupted
    pub fn aborted_ports(&self) -> impl Iterator<Item = &str> {
        self.senders
            .iter()
            .filter(|s| s.outcome == PortOutcome::Aborted)
            .map(|s| s.port.as_str())
    }

    /// Classify the snapshot: no sender, incomplete, or complete
    pub fn check(&self, expect: &Expectations) -> Result<(), PollError> {
        if self.devices_found() == 0 {
            return Err(PollError::DeviceNotFound);
        }

        let mut problems = Vec::new();
        if let Some(devices) = expect.devices {
            if self.devices_found() < devices {
                problems.push(format!(
                    "{} sender card(s) expected, {} found",
                    devices,
                    self.devices_found()
                ));
            }
        }
        if let Some(receivers) = expect.receiver_cards {
            if self.receiver_count() < receivers {
                problems.push(format!(
                    "{} receiver card(s) expected, {} found",
                    receivers,
                    self.receiver_count()
                ));
            }
        }
        let aborted: Vec<_> = self.aborted_ports().collect();
        if !aborted.is_empty() {
            problems.push(format!("walk aborted on {}", aborted.join(", ")));
        }
        if !self.misses.is_empty() {
            problems.push(format!("{} register read(s) unavailable", self.misses.len()));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(PollError::PartialTopology(problems.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::protocol::ModuleHealth;

    fn sender_with(receivers: Vec<ReceiverCard>) -> SenderCard {
        let mut s = SenderCard::new("/dev/ttyUSB0");
        s.discovered = true;
        s.outcome = PortOutcome::Connected;
        s.dvi_signal = Reading::Value(DviSignal::Valid);
        s.receivers = receivers;
        s
    }

    fn module(health: ModuleHealth) -> Module {
        Module {
            index: 0,
            health,
            raw: vec![],
            block_fault: None,
        }
    }

    #[test]
    fn test_empty_topology_is_device_not_found() {
        let t = Topology::new();
        assert_eq!(t.devices_found(), 0);
        assert!(!t.dvi_valid());
        assert!(matches!(
            t.check(&Expectations::default()),
            Err(PollError::DeviceNotFound)
        ));
    }

    #[test]
    fn test_display_on() {
        let mut on = ReceiverCard::new(0);
        on.kill_mode = Reading::Value(KillMode::On);
        let mut unknown = ReceiverCard::new(1);
        unknown.kill_mode = Reading::Value(KillMode::Unknown(0x7E));

        let mut t = Topology::new();
        t.senders.push(sender_with(vec![on.clone()]));
        assert!(t.display_on());

        t.senders[0].receivers.push(unknown);
        assert!(!t.display_on());

        // not collected is not judged, a miss is
        t.senders[0].receivers = vec![on, ReceiverCard::new(1)];
        assert!(t.display_on());
        t.misses.push(RegisterMiss {
            port: "/dev/ttyUSB0".into(),
            receiver: Some(1),
            register: RegisterKind::KillMode,
            cause: MissCause::NoData,
        });
        assert!(!t.display_on());
    }

    #[test]
    fn test_modules_ok() {
        let mut r = ReceiverCard::new(0);
        r.modules = Reading::Value(vec![module(ModuleHealth::Ok), module(ModuleHealth::Unknown)]);
        let mut t = Topology::new();
        t.senders.push(sender_with(vec![r]));
        assert!(t.modules_ok());

        t.senders[0].receivers[0].modules = Reading::Value(vec![module(ModuleHealth::Error)]);
        assert!(!t.modules_ok());
    }

    #[test]
    fn test_check_partial() {
        let mut t = Topology::new();
        t.senders.push(sender_with(vec![ReceiverCard::new(0)]));
        assert!(t.check(&Expectations::default()).is_ok());

        let expect = Expectations {
            devices: Some(1),
            receiver_cards: Some(2),
        };
        match t.check(&expect) {
            Err(PollError::PartialTopology(msg)) => assert!(msg.contains("2 receiver card(s)")),
            other => panic!("unexpected {:?}", other),
        }

        let mut aborted = SenderCard::new("/dev/ttyUSB1");
        aborted.outcome = PortOutcome::Aborted;
        t.senders.push(aborted);
        assert!(matches!(
            t.check(&Expectations::default()),
            Err(PollError::PartialTopology(_))
        ));
    }

    #[test]
    fn test_snapshot_serializes_sentinels() {
        let mut t = Topology::new();
        t.senders.push(sender_with(vec![ReceiverCard::new(0)]));
        let json = serde_json::to_value(&t).unwrap();
        let sender = &json["senders"][0];
        assert_eq!(sender["outcome"], "CONNECTED");
        assert_eq!(sender["model"], "N/A");
        assert!(sender.get("input_source").is_none());
        assert_eq!(sender["receivers"][0]["kill_mode"], "N/A");

        let mut aborted = SenderCard::new("/dev/ttyUSB1");
        aborted.outcome = PortOutcome::Aborted;
        assert_eq!(serde_json::to_value(&aborted).unwrap()["outcome"], "UNKNOWN");
    }
}
