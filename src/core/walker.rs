//! Topology walker
//!
//! Walks every candidate serial port in path order. Each port goes through
//! `CLOSED -> OPENING -> PROBING -> CONNECTED | NOT_CONNECTED -> CLOSED`;
//! for a connected sender the receiver chain is enumerated by index until a
//! receiver stops answering.
//!
//! Register reads never retry. A read that returns nothing, a failure status
//! or a short response leaves the not-available sentinel in the snapshot and
//! records a [`RegisterMiss`]. A transport error aborts the current port only;
//! the walk continues with the next one.

use crate::core::protocol::commands;
use crate::core::protocol::frame::{compose, hex_dump, validate, CommandTemplate, Patch, Payload};
use crate::core::protocol::registers::{self, Reading, RegisterKind};
use crate::core::protocol::ResponseStatus;
use crate::core::topology::{
    CabinetSize, InputSource, MissCause, PortOutcome, ReceiverCard, RegisterMiss, SenderCard,
    Topology,
};
use crate::core::transport::{PortCandidate, SerialLink, TransportError};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Highest receiver index byte 8 can address
pub const MAX_RECEIVER_INDEX: u8 = u8::MAX;

/// Poll errors
#[derive(Error, Debug)]
pub enum PollError {
    /// The controller rejected a command
    #[error("{register}: command failed due to {status}")]
    Status {
        /// Register that was queried
        register: &'static str,
        /// Reported status
        status: ResponseStatus,
    },

    /// No bytes arrived within the settle interval
    #[error("{register}: no data available at the input buffer")]
    TransportUnavailable {
        /// Register that was queried
        register: &'static str,
    },

    /// No sender card answered on any port
    #[error("no sender card responded on any port")]
    DeviceNotFound,

    /// The walk finished but some of the topology is missing
    #[error("partial topology: {0}")]
    PartialTopology(String),

    /// The serial link failed
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Port walk states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortState {
    /// No port open
    Closed,
    /// Opening the device
    Opening,
    /// Connection probe sent
    Probing,
    /// A sender card acknowledged the probe
    Connected,
    /// Nothing acknowledged the probe
    NotConnected,
}

impl PortState {
    /// Whether registers may be read in this state
    pub fn can_query(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Closed => "CLOSED",
            Self::Opening => "OPENING",
            Self::Probing => "PROBING",
            Self::Connected => "CONNECTED",
            Self::NotConnected => "NOT_CONNECTED",
        };
        f.write_str(s)
    }
}

/// Receiver enumeration states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReceiverState {
    /// Before the first query
    Init,
    /// Presence query sent to an index
    Query(u8),
    /// Receiver answered; registers are being collected
    Present(u8),
    /// Receiver did not answer
    Absent(u8),
    /// Enumeration finished
    Done,
}

/// Sender card register groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SenderCheck {
    /// Model id
    Model,
    /// Firmware version
    Firmware,
    /// Global brightness
    DisplayBrightness,
    /// Function card model, then ambient light through it or directly
    AmbientLight,
    /// Automatic brightness mode
    AlsMode,
    /// Automatic brightness settings
    AlsSettings,
    /// DVI input signal
    DviSignal,
    /// Input source registers, multi-input senders only
    InputSource,
    /// Cabinet width and height
    CabinetSize,
    /// Output port redundancy
    Redundancy,
}

/// Receiver card register groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReceiverCheck {
    /// FPGA firmware
    Firmware,
    /// Kill mode
    KillMode,
    /// Brightness and colour levels
    Brightness,
    /// Ribbon cable map
    RibbonCable,
    /// Temperature, voltage, monitoring card
    Monitoring,
    /// Lock mode
    LockMode,
    /// Gamma
    Gamma,
    /// Module flash self test
    ModuleFlash,
    /// Live module status
    ModuleStatus,
}

/// What to read during a walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkPlan {
    /// Sender registers, in read order
    pub sender: Vec<SenderCheck>,
    /// Receiver registers, in read order
    pub receiver: Vec<ReceiverCheck>,
    /// Whether to enumerate receivers at all
    pub enumerate_receivers: bool,
}

impl WalkPlan {
    /// Every register, in the order the display status poll reads them
    pub fn full() -> Self {
        Self {
            sender: vec![
                SenderCheck::Model,
                SenderCheck::Firmware,
                SenderCheck::DisplayBrightness,
                SenderCheck::AmbientLight,
                SenderCheck::AlsMode,
                SenderCheck::AlsSettings,
                SenderCheck::DviSignal,
                SenderCheck::InputSource,
                SenderCheck::CabinetSize,
                SenderCheck::Redundancy,
            ],
            receiver: vec![
                ReceiverCheck::Firmware,
                ReceiverCheck::KillMode,
                ReceiverCheck::Brightness,
                ReceiverCheck::RibbonCable,
                ReceiverCheck::Monitoring,
                ReceiverCheck::LockMode,
                ReceiverCheck::Gamma,
                ReceiverCheck::ModuleFlash,
            ],
            enumerate_receivers: true,
        }
    }

    /// Live module status per receiver
    pub fn modules() -> Self {
        Self::receivers_only(vec![ReceiverCheck::Firmware, ReceiverCheck::ModuleStatus])
    }

    /// DVI signal per sender
    pub fn dvi() -> Self {
        Self::senders_only(vec![SenderCheck::DviSignal])
    }

    /// Display brightness per sender
    pub fn brightness() -> Self {
        Self::senders_only(vec![SenderCheck::DisplayBrightness])
    }

    /// Cabinet on/off per receiver
    pub fn cabinet() -> Self {
        Self::receivers_only(vec![ReceiverCheck::Firmware, ReceiverCheck::KillMode])
    }

    /// Receiver temperature and voltage
    pub fn voltage() -> Self {
        Self::receivers_only(vec![ReceiverCheck::Monitoring])
    }

    /// Kill mode only
    pub fn display_on() -> Self {
        Self::receivers_only(vec![ReceiverCheck::KillMode])
    }

    /// Connection probe only
    pub fn connectivity() -> Self {
        Self::senders_only(Vec::new())
    }

    fn senders_only(sender: Vec<SenderCheck>) -> Self {
        Self {
            sender,
            receiver: Vec::new(),
            enumerate_receivers: false,
        }
    }

    fn receivers_only(receiver: Vec<ReceiverCheck>) -> Self {
        Self {
            sender: Vec::new(),
            receiver,
            enumerate_receivers: true,
        }
    }
}

impl Default for WalkPlan {
    fn default() -> Self {
        Self::full()
    }
}

/// Named walk plans
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlanPreset {
    /// [`WalkPlan::full`]
    Full,
    /// [`WalkPlan::modules`]
    Modules,
    /// [`WalkPlan::dvi`]
    Dvi,
    /// [`WalkPlan::brightness`]
    Brightness,
    /// [`WalkPlan::cabinet`]
    Cabinet,
    /// [`WalkPlan::voltage`]
    Voltage,
    /// [`WalkPlan::display_on`]
    DisplayOn,
    /// [`WalkPlan::connectivity`]
    Connectivity,
}

impl PlanPreset {
    /// All presets
    pub const ALL: [PlanPreset; 8] = [
        PlanPreset::Full,
        PlanPreset::Modules,
        PlanPreset::Dvi,
        PlanPreset::Brightness,
        PlanPreset::Cabinet,
        PlanPreset::Voltage,
        PlanPreset::DisplayOn,
        PlanPreset::Connectivity,
    ];

    /// Preset name, also the default broker task name
    pub fn name(&self) -> &'static str {
        match self {
            PlanPreset::Full => "full",
            PlanPreset::Modules => "modules",
            PlanPreset::Dvi => "dvi",
            PlanPreset::Brightness => "brightness",
            PlanPreset::Cabinet => "cabinet",
            PlanPreset::Voltage => "voltage",
            PlanPreset::DisplayOn => "display-on",
            PlanPreset::Connectivity => "connectivity",
        }
    }

    /// Build the plan
    pub fn plan(&self) -> WalkPlan {
        match self {
            PlanPreset::Full => WalkPlan::full(),
            PlanPreset::Modules => WalkPlan::modules(),
            PlanPreset::Dvi => WalkPlan::dvi(),
            PlanPreset::Brightness => WalkPlan::brightness(),
            PlanPreset::Cabinet => WalkPlan::cabinet(),
            PlanPreset::Voltage => WalkPlan::voltage(),
            PlanPreset::DisplayOn => WalkPlan::display_on(),
            PlanPreset::Connectivity => WalkPlan::connectivity(),
        }
    }
}

impl fmt::Display for PlanPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PlanPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('_', "-");
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.name() == wanted)
            .ok_or_else(|| format!("unknown plan '{}'", s))
    }
}

/// Timing and layout parameters of a poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSettings {
    /// Wait between the module flash trigger and the read-back
    pub flash_wait: Duration,
    /// Modules expected behind each receiver
    pub modules: usize,
    /// Data groups per module in the live status block
    pub data_groups: usize,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            flash_wait: Duration::from_secs(1),
            modules: 4,
            data_groups: 4,
        }
    }
}

/// Walks sender ports and their receiver chains over one serial link
pub struct TopologyWalker<L: SerialLink> {
    link: L,
    settings: PollSettings,
    state: PortState,
    port: String,
    misses: Vec<RegisterMiss>,
}

impl<L: SerialLink> TopologyWalker<L> {
    /// Walker over `link`
    pub fn new(link: L, settings: PollSettings) -> Self {
        Self {
            link,
            settings,
            state: PortState::Closed,
            port: String::new(),
            misses: Vec::new(),
        }
    }

    /// Borrow the link
    pub fn link(&self) -> &L {
        &self.link
    }

    /// Give the link back
    pub fn into_link(self) -> L {
        self.link
    }

    /// Current port state
    pub fn state(&self) -> PortState {
        self.state
    }

    /// Discover ports through the link and walk them all
    pub async fn poll(&mut self, plan: &WalkPlan) -> Result<Topology, PollError> {
        let ports = self.link.available_ports()?;
        tracing::info!("Found {} serial ports", ports.len());
        Ok(self.walk(ports, plan).await)
    }

    /// Walk `ports` in path order
    pub async fn walk(&mut self, mut ports: Vec<PortCandidate>, plan: &WalkPlan) -> Topology {
        ports.sort_by(|a, b| a.path.cmp(&b.path));
        let mut topology = Topology::new();
        self.misses.clear();

        for (i, candidate) in ports.iter().enumerate() {
            tracing::info!("*******************    PORT {}   *******************", i);
            let card = self.walk_port(candidate, plan).await;
            topology.senders.push(card);
        }

        topology.misses = std::mem::take(&mut self.misses);
        tracing::info!(
            "Found {} device(s), {} receiver card(s)",
            topology.devices_found(),
            topology.receiver_count()
        );
        topology
    }

    fn transition(&mut self, to: PortState) {
        tracing::debug!("{}: {} -> {}", self.port, self.state, to);
        self.state = to;
    }

    async fn walk_port(&mut self, candidate: &PortCandidate, plan: &WalkPlan) -> SenderCard {
        self.port = candidate.path.clone();
        let mut card = SenderCard::new(&candidate.path);
        card.description = candidate.description.clone();
        card.hardware_id = candidate.hardware_id.clone();

        self.transition(PortState::Opening);
        if let Err(e) = self.link.open(&candidate.path).await {
            tracing::error!("Error opening serial port {}: {}", candidate.path, e);
            card.outcome = PortOutcome::OpenFailed;
            self.transition(PortState::Closed);
            return card;
        }

        if let Err(e) = self.enumerate(&mut card, plan).await {
            tracing::error!("Error communicating with device on {}: {}", candidate.path, e);
            card.outcome = PortOutcome::Aborted;
            self.misses.push(RegisterMiss {
                port: candidate.path.clone(),
                receiver: None,
                register: RegisterKind::Connection,
                cause: MissCause::Transport(e.to_string()),
            });
        }

        if let Err(e) = self.link.close().await {
            tracing::warn!("Error closing {}: {}", candidate.path, e);
        }
        self.transition(PortState::Closed);
        card
    }

    async fn enumerate(
        &mut self,
        card: &mut SenderCard,
        plan: &WalkPlan,
    ) -> Result<(), TransportError> {
        self.link.flush().await?;

        self.transition(PortState::Probing);
        let connected = match self.query(&commands::CONNECTION, &[]).await {
            Ok(payload) => registers::decode_connection(&payload) == Reading::Value(true),
            Err(PollError::Transport(e)) => return Err(e),
            Err(e) => {
                tracing::debug!("{}", e);
                false
            }
        };
        if !connected {
            tracing::info!("Device not connected on {}", card.port);
            card.outcome = PortOutcome::NotConnected;
            self.transition(PortState::NotConnected);
            return Ok(());
        }

        tracing::info!(
            "Device found on port: {} | {} | {}",
            card.port,
            card.description,
            card.hardware_id
        );
        card.discovered = true;
        card.outcome = PortOutcome::Connected;
        self.transition(PortState::Connected);

        self.collect_sender(card, plan).await?;
        if plan.enumerate_receivers {
            self.enumerate_receivers(card, plan).await?;
        }
        Ok(())
    }

    async fn collect_sender(
        &mut self,
        card: &mut SenderCard,
        plan: &WalkPlan,
    ) -> Result<(), TransportError> {
        let wants_model = plan
            .sender
            .iter()
            .any(|c| matches!(c, SenderCheck::Model | SenderCheck::InputSource));
        if wants_model {
            card.model = self
                .read(None, RegisterKind::SenderModel, &[], registers::decode_model)
                .await?;
            tracing::info!("Sender card model: {}", card.model);
        }

        for check in &plan.sender {
            match check {
                SenderCheck::Model => {}
                SenderCheck::Firmware => {
                    card.firmware = self
                        .read(
                            None,
                            RegisterKind::SenderFirmware,
                            &[],
                            registers::decode_sender_firmware,
                        )
                        .await?;
                    tracing::info!("Sender card firmware version: {}", card.firmware);
                }
                SenderCheck::DisplayBrightness => {
                    card.display_brightness = self
                        .read(
                            None,
                            RegisterKind::DisplayBrightness,
                            &[],
                            registers::decode_display_brightness,
                        )
                        .await?;
                }
                SenderCheck::AmbientLight => self.collect_ambient_light(card).await?,
                SenderCheck::AlsMode => {
                    card.als_mode = self
                        .read(None, RegisterKind::AlsMode, &[], registers::decode_als_mode)
                        .await?;
                }
                SenderCheck::AlsSettings => {
                    card.als_settings = self
                        .read(None, RegisterKind::AlsSettings, &[], registers::decode_als_settings)
                        .await?;
                }
                SenderCheck::DviSignal => {
                    card.dvi_signal = self
                        .read(None, RegisterKind::DviSignal, &[], registers::decode_dvi_signal)
                        .await?;
                    tracing::info!("DVI signal: {:?}", card.dvi_signal);
                }
                SenderCheck::InputSource => {
                    if card.model.value().is_some_and(|m| m.is_multi_input()) {
                        card.input_source = Some(self.collect_input_source().await?);
                    }
                }
                SenderCheck::CabinetSize => {
                    card.cabinet_size = CabinetSize {
                        width: self
                            .read(
                                None,
                                RegisterKind::CabinetWidth,
                                &[],
                                registers::decode_cabinet_dimension,
                            )
                            .await?,
                        height: self
                            .read(
                                None,
                                RegisterKind::CabinetHeight,
                                &[],
                                registers::decode_cabinet_dimension,
                            )
                            .await?,
                    };
                }
                SenderCheck::Redundancy => {
                    card.redundancy = self
                        .read(None, RegisterKind::Redundancy, &[], registers::decode_redundancy)
                        .await?;
                }
            }
        }
        Ok(())
    }

    async fn collect_ambient_light(&mut self, card: &mut SenderCard) -> Result<(), TransportError> {
        card.function_card = self
            .read(None, RegisterKind::FunctionCard, &[], registers::decode_function_card)
            .await?;

        let via_card = card.function_card.value().is_some_and(|m| m.is_present());
        card.ambient_light = if via_card {
            tracing::info!("Refreshing function card register");
            match self.query(&commands::FUNCTION_CARD_REFRESH, &[]).await {
                Ok(_) => {}
                Err(PollError::Transport(e)) => return Err(e),
                Err(e) => tracing::warn!("{}", e),
            }
            self.read(
                None,
                RegisterKind::AmbientLightFunctionCard,
                &[],
                registers::decode_ambient_light_function_card,
            )
            .await?
        } else {
            self.read(
                None,
                RegisterKind::AmbientLightDirect,
                &[],
                registers::decode_ambient_light_direct,
            )
            .await?
        };
        tracing::info!("Ambient light level: {:?}", card.ambient_light);
        Ok(())
    }

    async fn collect_input_source(&mut self) -> Result<InputSource, TransportError> {
        Ok(InputSource {
            mode: self
                .read(None, RegisterKind::InputSourceMode, &[], registers::decode_input_source_mode)
                .await?,
            selected: self
                .read(
                    None,
                    RegisterKind::InputSourceSelected,
                    &[],
                    registers::decode_input_source_selected,
                )
                .await?,
            status: self
                .read(
                    None,
                    RegisterKind::InputSourceStatus,
                    &[],
                    registers::decode_input_source_status,
                )
                .await?,
        })
    }

    async fn enumerate_receivers(
        &mut self,
        card: &mut SenderCard,
        plan: &WalkPlan,
    ) -> Result<(), TransportError> {
        self.receiver_transition(ReceiverState::Init);

        for index in 0..=MAX_RECEIVER_INDEX {
            self.receiver_transition(ReceiverState::Query(index));
            tracing::info!("Connecting to receiver number: {}", u16::from(index) + 1);

            // the model query doubles as the presence probe
            let payload = match self
                .query(&commands::RECEIVER_MODEL, &[Patch::ReceiverIndex(index)])
                .await
            {
                Ok(payload) => payload,
                Err(PollError::Transport(e)) => return Err(e),
                Err(e) => {
                    tracing::debug!("{}", e);
                    tracing::info!("Receiver card not connected");
                    self.receiver_transition(ReceiverState::Absent(index));
                    break;
                }
            };
            self.receiver_transition(ReceiverState::Present(index));

            let mut receiver = ReceiverCard::new(index);
            receiver.model = registers::decode_model(&payload);
            if !receiver.model.is_available() {
                self.miss(Some(index), RegisterKind::ReceiverModel, MissCause::Undecodable);
            }
            tracing::info!("Receiver card model: {}", receiver.model);

            self.collect_receiver(&mut receiver, plan).await?;
            card.receivers.push(receiver);
        }

        self.receiver_transition(ReceiverState::Done);
        tracing::info!("{} receiver card(s) on {}", card.receivers.len(), card.port);
        Ok(())
    }

    fn receiver_transition(&self, to: ReceiverState) {
        tracing::trace!("{}: receiver {:?}", self.port, to);
    }

    async fn collect_receiver(
        &mut self,
        receiver: &mut ReceiverCard,
        plan: &WalkPlan,
    ) -> Result<(), TransportError> {
        let index = receiver.index;
        let at = Some(index);
        let patch = [Patch::ReceiverIndex(index)];

        for check in &plan.receiver {
            match check {
                ReceiverCheck::Firmware => {
                    receiver.firmware = self
                        .read(
                            at,
                            RegisterKind::ReceiverFirmware,
                            &patch,
                            registers::decode_receiver_firmware,
                        )
                        .await?;
                    tracing::info!("Receiver card FPGA firmware version: {}", receiver.firmware);
                }
                ReceiverCheck::KillMode => {
                    receiver.kill_mode = self
                        .read(at, RegisterKind::KillMode, &patch, registers::decode_kill_mode)
                        .await?;
                    tracing::info!(
                        "Cabinet operating status (kill mode): {:?}",
                        receiver.kill_mode
                    );
                }
                ReceiverCheck::Brightness => {
                    receiver.brightness = self
                        .read(
                            at,
                            RegisterKind::ReceiverBrightness,
                            &patch,
                            registers::decode_receiver_brightness,
                        )
                        .await?;
                }
                ReceiverCheck::RibbonCable => {
                    receiver.ribbon_cable = self
                        .read(at, RegisterKind::RibbonCable, &patch, registers::decode_ribbon_cable)
                        .await?;
                }
                ReceiverCheck::Monitoring => {
                    receiver.monitoring = self
                        .read(at, RegisterKind::Monitoring, &patch, registers::decode_monitoring)
                        .await?;
                    if let Some(m) = receiver.monitoring.value() {
                        tracing::info!("Temperature: {}, voltage: {}", m.temperature, m.voltage);
                    }
                }
                ReceiverCheck::LockMode => {
                    receiver.lock_mode = self
                        .read(at, RegisterKind::LockMode, &patch, registers::decode_lock_mode)
                        .await?;
                }
                ReceiverCheck::Gamma => {
                    receiver.gamma = self
                        .read(at, RegisterKind::Gamma, &patch, registers::decode_gamma)
                        .await?;
                }
                ReceiverCheck::ModuleFlash => {
                    receiver.modules = self.module_flash(index).await?;
                }
                ReceiverCheck::ModuleStatus => {
                    let (modules, groups) = (self.settings.modules, self.settings.data_groups);
                    let length = registers::module_status_length(modules, groups);
                    receiver.modules = self
                        .read(
                            at,
                            RegisterKind::ModuleStatus,
                            &[Patch::ReceiverIndex(index), Patch::DataLength(length)],
                            |p| registers::decode_module_status(p, modules, groups),
                        )
                        .await?;
                }
            }
        }
        Ok(())
    }

    /// Trigger the flash self test, wait, read the result back
    async fn module_flash(
        &mut self,
        index: u8,
    ) -> Result<Reading<Vec<registers::Module>>, TransportError> {
        tracing::info!("Sending module flash request and wait");
        let patch = [Patch::ReceiverIndex(index)];
        match self.query(&commands::MODULE_FLASH_TRIGGER, &patch).await {
            Ok(_) => tokio::time::sleep(self.settings.flash_wait).await,
            Err(PollError::Transport(e)) => return Err(e),
            Err(e) => tracing::error!("Module flash trigger failed: {}", e),
        }

        let modules = self
            .read(Some(index), RegisterKind::ModuleFlash, &patch, registers::decode_module_flash)
            .await?;
        if let Some(list) = modules.value() {
            tracing::info!("Total amount of modules: {}", list.len());
        }
        Ok(modules)
    }

    /// Compose, exchange, validate
    async fn query(
        &mut self,
        template: &CommandTemplate,
        patches: &[Patch],
    ) -> Result<Payload, PollError> {
        let frame = compose(template, patches);
        tracing::debug!("Sending command: {}", frame);
        let raw = self.link.exchange(frame.as_bytes()).await?;
        if raw.is_empty() {
            tracing::warn!("No data available at the input buffer");
            return Err(PollError::TransportUnavailable {
                register: template.name,
            });
        }
        tracing::debug!("Received data: {}", hex_dump(&raw));
        validate(&raw).map_err(|status| PollError::Status {
            register: template.name,
            status,
        })
    }

    /// Query one register and decode it; soft failures become misses
    async fn read<T>(
        &mut self,
        receiver: Option<u8>,
        kind: RegisterKind,
        patches: &[Patch],
        decode: impl FnOnce(&Payload) -> Reading<T>,
    ) -> Result<Reading<T>, TransportError> {
        match self.query(kind.template(), patches).await {
            Ok(payload) => {
                let reading = decode(&payload);
                if !reading.is_available() {
                    self.miss(receiver, kind, MissCause::Undecodable);
                }
                Ok(reading)
            }
            Err(PollError::Status { status, .. }) => {
                tracing::error!("{}: command failed due to {}", kind, status);
                self.miss(receiver, kind, MissCause::Status(status));
                Ok(Reading::NotAvailable)
            }
            Err(PollError::Transport(e)) => Err(e),
            Err(_) => {
                self.miss(receiver, kind, MissCause::NoData);
                Ok(Reading::NotAvailable)
            }
        }
    }

    fn miss(&mut self, receiver: Option<u8>, register: RegisterKind, cause: MissCause) {
        self.misses.push(RegisterMiss {
            port: self.port.clone(),
            receiver,
            register,
            cause,
        });
    }
}
