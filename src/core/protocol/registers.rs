//! Register decoding
//!
//! Every decoder is a pure function of a response [`Payload`]. Field
//! positions live in small descriptor constants ([`ByteField`],
//! [`ScaledField`]) and are read through one extraction routine that checks
//! the response status and bounds. A decoder that cannot read what it needs
//! returns [`Reading::NotAvailable`]; none of them panic on short or failed
//! responses.

use super::commands;
use super::frame::{CommandTemplate, Payload, DATA_LENGTH_OFFSET, DATA_OFFSET};
use serde::{Serialize, Serializer};
use std::fmt;

/// Value rendered for any reading that could not be obtained
pub const NOT_AVAILABLE: &str = "N/A";

/// A decoded register value, or the not-available sentinel
#[derive(Debug, Clone, PartialEq)]
pub enum Reading<T> {
    /// Decoded value
    Value(T),
    /// No data, a failed status or a response too short to decode
    NotAvailable,
}

impl<T> Reading<T> {
    /// Borrow the value, if any
    pub fn value(&self) -> Option<&T> {
        match self {
            Reading::Value(v) => Some(v),
            Reading::NotAvailable => None,
        }
    }

    /// Consume into an `Option`
    pub fn into_option(self) -> Option<T> {
        match self {
            Reading::Value(v) => Some(v),
            Reading::NotAvailable => None,
        }
    }

    /// Whether a value was decoded
    pub fn is_available(&self) -> bool {
        matches!(self, Reading::Value(_))
    }

    /// Map the contained value
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Reading<U> {
        match self {
            Reading::Value(v) => Reading::Value(f(v)),
            Reading::NotAvailable => Reading::NotAvailable,
        }
    }
}

impl<T> Default for Reading<T> {
    fn default() -> Self {
        Reading::NotAvailable
    }
}

impl<T> From<Option<T>> for Reading<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Reading::Value(v),
            None => Reading::NotAvailable,
        }
    }
}

impl<T: Serialize> Serialize for Reading<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Reading::Value(v) => v.serialize(serializer),
            Reading::NotAvailable => serializer.serialize_str(NOT_AVAILABLE),
        }
    }
}

impl<T: fmt::Display> fmt::Display for Reading<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reading::Value(v) => v.fmt(f),
            Reading::NotAvailable => f.write_str(NOT_AVAILABLE),
        }
    }
}

/// One byte of a response, optionally masked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteField {
    /// Offset from the start of the response frame
    pub offset: usize,
    /// Mask applied after reading
    pub mask: u8,
}

impl ByteField {
    /// Whole byte at `offset`
    pub const fn at(offset: usize) -> Self {
        Self { offset, mask: 0xFF }
    }

    /// Masked byte at `offset`
    pub const fn masked(offset: usize, mask: u8) -> Self {
        Self { offset, mask }
    }

    /// Read the field from an `Ok` payload
    pub fn extract(&self, payload: &Payload) -> Option<u8> {
        if !payload.status().is_ok() {
            return None;
        }
        payload.byte(self.offset).map(|b| b & self.mask)
    }

    /// Whether every bit of the mask is set
    pub fn is_set(&self, payload: &Payload) -> Option<bool> {
        self.extract(payload).map(|b| b == self.mask)
    }
}

/// A masked byte multiplied by a scale, rounded to two decimals
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaledField {
    /// Raw field
    pub field: ByteField,
    /// Multiplier applied to the raw value
    pub scale: f64,
}

impl ScaledField {
    /// Field with a scale
    pub const fn new(field: ByteField, scale: f64) -> Self {
        Self { field, scale }
    }

    /// Read and scale
    pub fn extract(&self, payload: &Payload) -> Option<f64> {
        self.field
            .extract(payload)
            .map(|raw| round2(f64::from(raw) * self.scale))
    }
}

/// Little-endian u16 at `offset` of an `Ok` payload
fn le_u16(payload: &Payload, offset: usize) -> Option<u16> {
    let low = ByteField::at(offset).extract(payload)?;
    let high = ByteField::at(offset + 1).extract(payload)?;
    Some(u16::from_le_bytes([low, high]))
}

/// `len` data bytes from an `Ok` payload
fn block(payload: &Payload, offset: usize, len: usize) -> Option<&[u8]> {
    if !payload.status().is_ok() {
        return None;
    }
    payload.slice(offset, len)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn percent_rounded(level: u8) -> u8 {
    // at most 100, always fits
    (f64::from(level) * 100.0 / 255.0).round() as u8
}

fn percent_truncated(level: u8) -> u8 {
    (u16::from(level) * 100 / 255) as u8
}

// Descriptor table

const ACK_LOW: ByteField = ByteField::at(18);
const ACK_HIGH: ByteField = ByteField::at(19);
const LEVEL: ByteField = ByteField::at(18);
const TEMPERATURE_VALID: ByteField = ByteField::masked(18, 0x80);
const TEMPERATURE_NEGATIVE: ByteField = ByteField::masked(18, 0x01);
const TEMPERATURE: ScaledField = ScaledField::new(ByteField::masked(19, 0xFE), 0.5);
const VOLTAGE_VALID: ByteField = ByteField::masked(21, 0x80);
const VOLTAGE: ScaledField = ScaledField::new(ByteField::masked(21, 0x7F), 0.1);
const MONITORING_CARD: ByteField = ByteField::at(50);
const GAMMA: ScaledField = ScaledField::new(ByteField::at(18), 0.1);
const FLASH_DATA_LENGTH: ByteField = ByteField::at(DATA_LENGTH_OFFSET);
const ALS_DIRECT_VALID: ByteField = ByteField::masked(19, 0x80);
const ALS_DIRECT_LEVEL: ByteField = ByteField::at(18);
const ALS_CARD_VALID: ByteField = ByteField::masked(20, 0x80);
const ALS_CARD_LEVEL: ByteField = ByteField::at(21);

/// Light sensor levels are 8-bit scaled onto 0..=65535 lux
const LUX_PER_STEP: u32 = 0xFFFF / 0xFF;

/// Flash read-back elements are four bytes wide; `b16` counts bytes, so the
/// module count is `b16 / 4`. Slicing by the module count instead only lines
/// up when there happen to be four modules.
const FLASH_STRIDE: usize = 4;
const FLASH_OK: u8 = 0x05;
const FLASH_ERROR: u8 = 0x03;
const FLASH_MISSING: u8 = 0x00;
const MODULE_LIVE_OK: u8 = 0xFF;
const MODULE_LIVE_ERROR: u8 = 0x00;
const MODULE_BLOCK_BASE: usize = 22;
const RIBBON_LEN: usize = 16;

/// Register kinds, one per decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegisterKind {
    /// Sender presence probe
    Connection,
    /// Sender card model id
    SenderModel,
    /// Sender card firmware
    SenderFirmware,
    /// Global display brightness
    DisplayBrightness,
    /// Multifunction card model
    FunctionCard,
    /// Ambient light straight from the sender
    AmbientLightDirect,
    /// Ambient light through the function card
    AmbientLightFunctionCard,
    /// Automatic brightness mode
    AlsMode,
    /// Automatic brightness settings
    AlsSettings,
    /// DVI input signal
    DviSignal,
    /// Manual or automatic input selection
    InputSourceMode,
    /// Selected input
    InputSourceSelected,
    /// Inputs with a valid signal
    InputSourceStatus,
    /// Cabinet width
    CabinetWidth,
    /// Cabinet height
    CabinetHeight,
    /// Output port redundancy
    Redundancy,
    /// Receiver card model id
    ReceiverModel,
    /// Receiver FPGA firmware
    ReceiverFirmware,
    /// Temperature, voltage, monitoring card
    Monitoring,
    /// Receiver brightness and colour levels
    ReceiverBrightness,
    /// Cabinet kill mode
    KillMode,
    /// Cabinet lock mode
    LockMode,
    /// Gamma value
    Gamma,
    /// Ribbon cable line map
    RibbonCable,
    /// Module health from the flash self test
    ModuleFlash,
    /// Module health from the live status block
    ModuleStatus,
}

impl RegisterKind {
    /// Command that reads this register
    pub fn template(&self) -> &'static CommandTemplate {
        match self {
            RegisterKind::Connection => &commands::CONNECTION,
            RegisterKind::SenderModel => &commands::SENDER_MODEL,
            RegisterKind::SenderFirmware => &commands::SENDER_FIRMWARE,
            RegisterKind::DisplayBrightness => &commands::DISPLAY_BRIGHTNESS,
            RegisterKind::FunctionCard => &commands::FUNCTION_CARD,
            RegisterKind::AmbientLightDirect => &commands::ALS_DIRECT,
            RegisterKind::AmbientLightFunctionCard => &commands::ALS_FUNCTION_CARD,
            RegisterKind::AlsMode => &commands::ALS_MODE,
            RegisterKind::AlsSettings => &commands::ALS_SETTINGS,
            RegisterKind::DviSignal => &commands::DVI_SIGNAL,
            RegisterKind::InputSourceMode => &commands::INPUT_SOURCE_MODE,
            RegisterKind::InputSourceSelected => &commands::INPUT_SOURCE_SELECTED,
            RegisterKind::InputSourceStatus => &commands::INPUT_SOURCE_STATUS,
            RegisterKind::CabinetWidth => &commands::CABINET_WIDTH,
            RegisterKind::CabinetHeight => &commands::CABINET_HEIGHT,
            RegisterKind::Redundancy => &commands::REDUNDANCY,
            RegisterKind::ReceiverModel => &commands::RECEIVER_MODEL,
            RegisterKind::ReceiverFirmware => &commands::RECEIVER_FIRMWARE,
            RegisterKind::Monitoring => &commands::MONITORING,
            RegisterKind::ReceiverBrightness => &commands::RECEIVER_BRIGHTNESS,
            RegisterKind::KillMode => &commands::KILL_MODE,
            RegisterKind::LockMode => &commands::LOCK_MODE,
            RegisterKind::Gamma => &commands::GAMMA,
            RegisterKind::RibbonCable => &commands::RIBBON_CABLE,
            RegisterKind::ModuleFlash => &commands::MODULE_FLASH_READBACK,
            RegisterKind::ModuleStatus => &commands::MODULE_STATUS,
        }
    }

    /// Register name as used in logs
    pub fn name(&self) -> &'static str {
        self.template().name
    }
}

impl fmt::Display for RegisterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Hardware model id, byte 18 low and byte 19 high
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelId(pub u16);

impl ModelId {
    /// Sender family with several video inputs (`01 11` on the wire)
    pub const MULTI_INPUT_SENDER: ModelId = ModelId(0x1101);

    /// MFN300 multifunction card family (`01 81` on the wire)
    pub const MFN300: ModelId = ModelId(0x8101);

    /// Low byte (offset 18)
    pub fn low(&self) -> u8 {
        self.0.to_le_bytes()[0]
    }

    /// High byte (offset 19)
    pub fn high(&self) -> u8 {
        self.0.to_le_bytes()[1]
    }

    /// Whether the sender card has the input source registers
    pub fn is_multi_input(&self) -> bool {
        *self == Self::MULTI_INPUT_SENDER
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}

impl Serialize for ModelId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Brightness level and its percentage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Brightness {
    /// Raw level 0-255
    pub level: u8,
    /// `round(100 * level / 255)`
    pub percent: u8,
}

impl Brightness {
    fn from_level(level: u8) -> Self {
        Self {
            level,
            percent: percent_rounded(level),
        }
    }
}

/// Receiver brightness with per-colour levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReceiverBrightness {
    /// Global level
    #[serde(flatten)]
    pub global: Brightness,
    /// Red level
    pub red: u8,
    /// Green level
    pub green: u8,
    /// Blue level
    pub blue: u8,
    /// Virtual red level
    pub v_red: u8,
}

/// Temperature, voltage and monitoring card presence
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Monitoring {
    /// Degrees Celsius, when the card reports it valid
    pub temperature: Reading<f64>,
    /// Volts, when the card reports it valid
    pub voltage: Reading<f64>,
    /// Monitoring card fitted
    pub monitoring_card: bool,
}

/// Cabinet output state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum KillMode {
    /// Output enabled
    On,
    /// Output forced off
    Off,
    /// Unrecognised value
    Unknown(u8),
}

impl KillMode {
    /// Only a definite `On` counts as lit
    pub fn is_on(&self) -> bool {
        matches!(self, KillMode::On)
    }
}

/// Cabinet lock state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LockMode {
    /// Normal operation
    Normal,
    /// Cabinet locked
    Locked,
    /// Unrecognised value
    Unknown(u8),
}

/// Per-module health
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ModuleHealth {
    /// Module healthy
    Ok,
    /// Module faulty
    Error,
    /// No module answered at this position
    Missing,
    /// Unrecognised status
    Unknown,
}

/// One LED module behind a receiver card
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Module {
    /// Position in the receiver's module array
    pub index: usize,
    /// Derived health
    pub health: ModuleHealth,
    /// Status bytes the health was derived from
    pub raw: Vec<u8>,
    /// Cable detection fault, live status only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_fault: Option<bool>,
}

impl Module {
    /// Unknown counts as healthy; `Error` and `Missing` fail
    pub fn is_ok(&self) -> bool {
        !matches!(self.health, ModuleHealth::Error | ModuleHealth::Missing)
    }
}

/// Ribbon cable signal lines; a set bit marks a faulty line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RibbonCable {
    /// Data groups G0..G15, four lines each
    pub groups: Vec<u8>,
    /// Address line A
    pub a: u8,
    /// Address line B
    pub b: u8,
    /// Address line C
    pub c: u8,
    /// Address line D
    pub d: u8,
    /// Latch
    pub lat: u8,
    /// Output enable
    pub oe: u8,
    /// Data clock
    pub dclk: u8,
    /// Control
    pub ctrl: u8,
}

impl RibbonCable {
    /// Any line reported faulty
    pub fn has_fault(&self) -> bool {
        self.groups.iter().any(|g| *g != 0)
            || [
                self.a, self.b, self.c, self.d, self.lat, self.oe, self.dclk, self.ctrl,
            ]
            .iter()
            .any(|l| *l != 0)
    }
}

/// DVI input signal state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DviSignal {
    /// No valid signal
    NotValid,
    /// Valid signal present
    Valid,
    /// Unrecognised value
    Unknown(u8),
}

/// Automatic brightness mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AlsMode {
    /// Brightness follows the light sensor
    Enabled,
    /// Fixed brightness
    Disabled,
    /// Unrecognised value
    Unknown(u8),
}

/// Automatic brightness settings block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AlsSettings {
    /// Number of light sensors
    pub sensors: u8,
    /// Lux at which maximum brightness applies
    pub max_lux: u16,
    /// Lux at which minimum brightness applies
    pub min_lux: u16,
    /// Maximum brightness level
    pub max_brightness: u8,
    /// Maximum brightness, truncated percent
    pub max_brightness_percent: u8,
    /// Minimum brightness level
    pub min_brightness: u8,
    /// Minimum brightness, truncated percent
    pub min_brightness_percent: u8,
    /// Number of adjustment steps
    pub steps: u8,
    /// Function card position
    pub function_card_position: u16,
    /// Sensor address on the function card
    pub sensor_address: u8,
    /// Light sensor position
    pub sensor_position: u8,
    /// Port address position
    pub port_position: u8,
}

/// Per output-port redundancy flags (two bits each, ports 1-4)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Redundancy {
    /// Two-bit field per port
    pub ports: [u8; 4],
}

/// Input selection mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InputSourceMode {
    /// Operator picked an input
    Manual,
    /// Sender picks the input
    Automatic,
}

/// Video input port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InputPort {
    /// DVI
    Dvi,
    /// Dual-link DVI
    DualDvi,
    /// HDMI
    Hdmi,
    /// HDMI 1.4
    Hdmi14,
    /// 3G-SDI
    Sdi3g,
    /// DVI connector 1
    Dvi1,
    /// DVI connector 2
    Dvi2,
    /// DVI connector 3
    Dvi3,
    /// DVI connector 4
    Dvi4,
    /// DisplayPort
    DisplayPort,
}

/// Result of the selected-input register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InputSelection {
    /// A known input is selected
    Selected(InputPort),
    /// Nothing recognisable is selected
    NotSelected(u8),
}

/// Result of the input status register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InputStatus {
    /// First input carrying a valid signal
    Active(InputPort),
    /// No input has a valid signal
    NoSignal(u8),
}

/// Ambient light level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AmbientLight {
    /// Valid reading in lux
    Lux(u32),
    /// Sensor flagged the reading invalid; raw level kept
    Invalid(u8),
}

/// Multifunction card detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FunctionCardModel {
    /// No function card answered
    Absent,
    /// MFN300 family
    Mfn300,
    /// Some other card
    Other(ModelId),
}

impl FunctionCardModel {
    /// Whether ambient light should be read through the card
    pub fn is_present(&self) -> bool {
        !matches!(self, FunctionCardModel::Absent)
    }
}

// Decoders

/// Connection probe: a non-zero acknowledge means a sender is attached
pub fn decode_connection(payload: &Payload) -> Reading<bool> {
    let low = ACK_LOW.extract(payload);
    let high = ACK_HIGH.extract(payload);
    match (low, high) {
        (Some(l), Some(h)) => Reading::Value(l != 0 || h != 0),
        _ => Reading::NotAvailable,
    }
}

/// Model id, bytes 18 (low) and 19 (high); shared by sender and receiver
pub fn decode_model(payload: &Payload) -> Reading<ModelId> {
    le_u16(payload, DATA_OFFSET).map(ModelId).into()
}

/// Sender firmware as four decimal components
pub fn decode_sender_firmware(payload: &Payload) -> Reading<String> {
    block(payload, DATA_OFFSET, 4)
        .map(|v| format!("{}.{}.{}.{}", v[0], v[1], v[2], v[3]))
        .into()
}

/// Receiver FPGA firmware, last component in hex
pub fn decode_receiver_firmware(payload: &Payload) -> Reading<String> {
    block(payload, DATA_OFFSET, 4)
        .map(|v| format!("{}.{}.{}.{:02x}", v[0], v[1], v[2], v[3]))
        .into()
}

/// Global display brightness
pub fn decode_display_brightness(payload: &Payload) -> Reading<Brightness> {
    LEVEL.extract(payload).map(Brightness::from_level).into()
}

/// Receiver brightness plus colour levels at bytes 19-22
pub fn decode_receiver_brightness(payload: &Payload) -> Reading<ReceiverBrightness> {
    block(payload, DATA_OFFSET, 5)
        .map(|v| ReceiverBrightness {
            global: Brightness::from_level(v[0]),
            red: v[1],
            green: v[2],
            blue: v[3],
            v_red: v[4],
        })
        .into()
}

/// Temperature, voltage and monitoring card presence
pub fn decode_monitoring(payload: &Payload) -> Reading<Monitoring> {
    // byte 50 is the furthest field read
    if block(payload, DATA_OFFSET, MONITORING_CARD.offset - DATA_OFFSET + 1).is_none() {
        return Reading::NotAvailable;
    }
    let temperature = match TEMPERATURE_VALID.is_set(payload) {
        Some(true) => {
            let negative = TEMPERATURE_NEGATIVE.is_set(payload).unwrap_or(false);
            TEMPERATURE
                .extract(payload)
                .map(|t| if negative { -t } else { t })
                .into()
        }
        _ => Reading::NotAvailable,
    };
    let voltage = match VOLTAGE_VALID.is_set(payload) {
        Some(true) => VOLTAGE.extract(payload).into(),
        _ => Reading::NotAvailable,
    };
    let monitoring_card = MONITORING_CARD.extract(payload) == Some(0xFF);
    Reading::Value(Monitoring {
        temperature,
        voltage,
        monitoring_card,
    })
}

/// Kill mode: 0x00 on, 0xFF off
pub fn decode_kill_mode(payload: &Payload) -> Reading<KillMode> {
    LEVEL
        .extract(payload)
        .map(|b| match b {
            0x00 => KillMode::On,
            0xFF => KillMode::Off,
            other => KillMode::Unknown(other),
        })
        .into()
}

/// Lock mode: 0x00 normal, 0xFF locked
pub fn decode_lock_mode(payload: &Payload) -> Reading<LockMode> {
    LEVEL
        .extract(payload)
        .map(|b| match b {
            0x00 => LockMode::Normal,
            0xFF => LockMode::Locked,
            other => LockMode::Unknown(other),
        })
        .into()
}

/// Gamma, byte 18 in tenths
pub fn decode_gamma(payload: &Payload) -> Reading<f64> {
    GAMMA.extract(payload).into()
}

/// Module flash read-back: `b16 / 4` entries of four bytes from offset 18
///
/// Status and acknowledge both 0x05 is healthy; 0x03 in either is an error,
/// then 0x00 in either marks a missing module. The stride stays four bytes
/// whatever the module count.
///
/// A response that announces more entries than it carries is treated as
/// unavailable as a whole.
pub fn decode_module_flash(payload: &Payload) -> Reading<Vec<Module>> {
    let Some(length) = FLASH_DATA_LENGTH.extract(payload) else {
        return Reading::NotAvailable;
    };
    let count = usize::from(length) / FLASH_STRIDE;
    let Some(data) = block(payload, DATA_OFFSET, count * FLASH_STRIDE) else {
        return Reading::NotAvailable;
    };
    let modules = data
        .chunks_exact(FLASH_STRIDE)
        .enumerate()
        .map(|(index, element)| {
            let (status, ack) = (element[0], element[1]);
            let health = if status == FLASH_OK && ack == FLASH_OK {
                ModuleHealth::Ok
            } else if status == FLASH_ERROR || ack == FLASH_ERROR {
                ModuleHealth::Error
            } else if status == FLASH_MISSING || ack == FLASH_MISSING {
                ModuleHealth::Missing
            } else {
                ModuleHealth::Unknown
            };
            Module {
                index,
                health,
                raw: vec![status, ack],
                block_fault: None,
            }
        })
        .collect();
    Reading::Value(modules)
}

/// Size in bytes of one module element in the live status block
pub fn module_status_stride(data_groups: usize) -> usize {
    MODULE_BLOCK_BASE + 2 * data_groups
}

/// Data length to request for the live status block
pub fn module_status_length(modules: usize, data_groups: usize) -> u16 {
    u16::try_from(modules * module_status_stride(data_groups)).unwrap_or(u16::MAX)
}

/// Live module status: `modules` elements of `22 + 2 * data_groups` bytes
///
/// Element byte 0 carries health (0xFF ok, 0x00 error); the low nibble of
/// each data group's first byte flags a cable fault.
pub fn decode_module_status(
    payload: &Payload,
    modules: usize,
    data_groups: usize,
) -> Reading<Vec<Module>> {
    let stride = module_status_stride(data_groups);
    let Some(data) = block(payload, DATA_OFFSET, modules * stride) else {
        return Reading::NotAvailable;
    };
    let decoded = data
        .chunks_exact(stride)
        .enumerate()
        .map(|(index, element)| {
            let health = match element[0] {
                MODULE_LIVE_OK => ModuleHealth::Ok,
                MODULE_LIVE_ERROR => ModuleHealth::Error,
                _ => ModuleHealth::Unknown,
            };
            let block_fault = (0..data_groups)
                .any(|g| element[MODULE_BLOCK_BASE + 2 * g] & 0x0F != 0);
            Module {
                index,
                health,
                raw: vec![element[0]],
                block_fault: Some(block_fault),
            }
        })
        .collect();
    Reading::Value(decoded)
}

/// Ribbon cable map, 16 bytes from offset 18
pub fn decode_ribbon_cable(payload: &Payload) -> Reading<RibbonCable> {
    block(payload, DATA_OFFSET, RIBBON_LEN)
        .map(|v| RibbonCable {
            groups: v[..8].iter().flat_map(|b| [b >> 4, b & 0x0F]).collect(),
            a: v[8],
            b: v[9],
            c: v[10],
            d: v[11],
            lat: v[12],
            oe: v[13],
            dclk: v[14],
            ctrl: v[15],
        })
        .into()
}

/// DVI signal: 0x00 not valid, 0x01 valid
pub fn decode_dvi_signal(payload: &Payload) -> Reading<DviSignal> {
    LEVEL
        .extract(payload)
        .map(|b| match b {
            0x00 => DviSignal::NotValid,
            0x01 => DviSignal::Valid,
            other => DviSignal::Unknown(other),
        })
        .into()
}

/// Automatic brightness mode: 0x7D enabled, 0xFF disabled
pub fn decode_als_mode(payload: &Payload) -> Reading<AlsMode> {
    LEVEL
        .extract(payload)
        .map(|b| match b {
            0x7D => AlsMode::Enabled,
            0xFF => AlsMode::Disabled,
            other => AlsMode::Unknown(other),
        })
        .into()
}

/// Automatic brightness settings block
pub fn decode_als_settings(payload: &Payload) -> Reading<AlsSettings> {
    // offsets 18..=50
    block(payload, DATA_OFFSET, 33)
        .map(|v| {
            let at = |offset: usize| v[offset - DATA_OFFSET];
            AlsSettings {
                sensors: at(18),
                max_lux: u16::from_le_bytes([at(22), at(23)]),
                min_lux: u16::from_le_bytes([at(24), at(25)]),
                max_brightness: at(26),
                max_brightness_percent: percent_truncated(at(26)),
                min_brightness: at(27),
                min_brightness_percent: percent_truncated(at(27)),
                steps: at(28),
                function_card_position: u16::from_le_bytes([at(41), at(42)]),
                sensor_address: at(43),
                sensor_position: at(49),
                port_position: at(50),
            }
        })
        .into()
}

/// Redundancy: two bits per output port, port 1 in the low bits
pub fn decode_redundancy(payload: &Payload) -> Reading<Redundancy> {
    LEVEL
        .extract(payload)
        .map(|b| Redundancy {
            ports: [b & 0x03, (b >> 2) & 0x03, (b >> 4) & 0x03, (b >> 6) & 0x03],
        })
        .into()
}

/// Input selection: 0x5A manual, anything else automatic
pub fn decode_input_source_mode(payload: &Payload) -> Reading<InputSourceMode> {
    LEVEL
        .extract(payload)
        .map(|b| {
            if b == 0x5A {
                InputSourceMode::Manual
            } else {
                InputSourceMode::Automatic
            }
        })
        .into()
}

/// Selected input port
pub fn decode_input_source_selected(payload: &Payload) -> Reading<InputSelection> {
    LEVEL
        .extract(payload)
        .map(|b| match b {
            0x58 => InputSelection::Selected(InputPort::Dvi),
            0x61 => InputSelection::Selected(InputPort::DualDvi),
            0x05 => InputSelection::Selected(InputPort::Hdmi),
            0x01 => InputSelection::Selected(InputPort::Sdi3g),
            0x5F => InputSelection::Selected(InputPort::DisplayPort),
            0x5A => InputSelection::Selected(InputPort::Hdmi14),
            other => InputSelection::NotSelected(other),
        })
        .into()
}

/// First input with a valid signal, by lowest set bit
pub fn decode_input_source_status(payload: &Payload) -> Reading<InputStatus> {
    const PORTS: [InputPort; 7] = [
        InputPort::Sdi3g,
        InputPort::Hdmi,
        InputPort::Dvi1,
        InputPort::Dvi2,
        InputPort::Dvi3,
        InputPort::Dvi4,
        InputPort::DisplayPort,
    ];
    LEVEL
        .extract(payload)
        .map(|b| {
            if b == 0xFF {
                return InputStatus::NoSignal(b);
            }
            PORTS
                .iter()
                .enumerate()
                .find(|(bit, _)| b & (1 << bit) != 0)
                .map_or(InputStatus::NoSignal(b), |(_, port)| {
                    InputStatus::Active(*port)
                })
        })
        .into()
}

fn ambient(payload: &Payload, valid: ByteField, level: ByteField) -> Reading<AmbientLight> {
    match (valid.is_set(payload), level.extract(payload)) {
        (Some(true), Some(raw)) => Reading::Value(AmbientLight::Lux(u32::from(raw) * LUX_PER_STEP)),
        (Some(false), Some(raw)) => Reading::Value(AmbientLight::Invalid(raw)),
        _ => Reading::NotAvailable,
    }
}

/// Ambient light from the sender: valid flag in byte 19, level in byte 18
pub fn decode_ambient_light_direct(payload: &Payload) -> Reading<AmbientLight> {
    ambient(payload, ALS_DIRECT_VALID, ALS_DIRECT_LEVEL)
}

/// Ambient light via the function card: valid flag in byte 20, level in byte 21
pub fn decode_ambient_light_function_card(payload: &Payload) -> Reading<AmbientLight> {
    ambient(payload, ALS_CARD_VALID, ALS_CARD_LEVEL)
}

/// Multifunction card model
pub fn decode_function_card(payload: &Payload) -> Reading<FunctionCardModel> {
    decode_model(payload).map(|id| match id {
        ModelId(0) => FunctionCardModel::Absent,
        ModelId::MFN300 => FunctionCardModel::Mfn300,
        other => FunctionCardModel::Other(other),
    })
}

/// Cabinet width or height in pixels
pub fn decode_cabinet_dimension(payload: &Payload) -> Reading<u16> {
    le_u16(payload, DATA_OFFSET).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `Ok` response with `data` placed from offset 18
    fn response(data: &[u8]) -> Payload {
        let mut raw = vec![0u8; DATA_OFFSET];
        raw[0] = 0x55;
        raw[1] = 0xAA;
        raw[DATA_LENGTH_OFFSET] = data.len() as u8;
        raw.extend_from_slice(data);
        raw.extend([0, 0]);
        Payload::new(raw)
    }

    fn with_byte(offset: usize, value: u8) -> Payload {
        let mut data = vec![0u8; 64];
        data[offset - DATA_OFFSET] = value;
        response(&data)
    }

    fn failed(status: u8) -> Payload {
        let mut raw = vec![0xFFu8; 96];
        raw[2] = status;
        Payload::new(raw)
    }

    #[test]
    fn test_reading_serializes_sentinel() {
        let r: Reading<u8> = Reading::NotAvailable;
        assert_eq!(serde_json::to_string(&r).unwrap(), "\"N/A\"");
        assert_eq!(serde_json::to_string(&Reading::Value(7u8)).unwrap(), "7");
        assert_eq!(r.to_string(), "N/A");
    }

    #[test]
    fn test_every_decoder_yields_sentinel_on_failed_status() {
        for status in [1u8, 2, 3, 4, 0x42] {
            let p = failed(status);
            assert!(!decode_connection(&p).is_available());
            assert!(!decode_model(&p).is_available());
            assert!(!decode_sender_firmware(&p).is_available());
            assert!(!decode_receiver_firmware(&p).is_available());
            assert!(!decode_display_brightness(&p).is_available());
            assert!(!decode_receiver_brightness(&p).is_available());
            assert!(!decode_monitoring(&p).is_available());
            assert!(!decode_kill_mode(&p).is_available());
            assert!(!decode_lock_mode(&p).is_available());
            assert!(!decode_gamma(&p).is_available());
            assert!(!decode_module_flash(&p).is_available());
            assert!(!decode_module_status(&p, 4, 4).is_available());
            assert!(!decode_ribbon_cable(&p).is_available());
            assert!(!decode_dvi_signal(&p).is_available());
            assert!(!decode_als_mode(&p).is_available());
            assert!(!decode_als_settings(&p).is_available());
            assert!(!decode_redundancy(&p).is_available());
            assert!(!decode_input_source_mode(&p).is_available());
            assert!(!decode_input_source_selected(&p).is_available());
            assert!(!decode_input_source_status(&p).is_available());
            assert!(!decode_ambient_light_direct(&p).is_available());
            assert!(!decode_ambient_light_function_card(&p).is_available());
            assert!(!decode_function_card(&p).is_available());
            assert!(!decode_cabinet_dimension(&p).is_available());
        }
    }

    #[test]
    fn test_short_payload_never_panics() {
        for len in 0..DATA_OFFSET + 2 {
            let p = Payload::new(vec![0u8; len]);
            assert!(!decode_monitoring(&p).is_available());
            assert!(!decode_als_settings(&p).is_available());
            assert!(!decode_ribbon_cable(&p).is_available());
            assert!(!decode_receiver_brightness(&p).is_available());
            assert!(!decode_sender_firmware(&p).is_available());
        }
    }

    #[test]
    fn test_temperature() {
        let mut data = vec![0u8; 40];
        data[0] = 0x80;
        data[1] = 0x14;
        let m = decode_monitoring(&response(&data)).into_option().unwrap();
        assert_eq!(m.temperature, Reading::Value(10.0));

        data[0] = 0x81;
        let m = decode_monitoring(&response(&data)).into_option().unwrap();
        assert_eq!(m.temperature, Reading::Value(-10.0));

        data[0] = 0x00;
        let m = decode_monitoring(&response(&data)).into_option().unwrap();
        assert_eq!(m.temperature, Reading::NotAvailable);
    }

    #[test]
    fn test_temperature_ignores_low_bit_of_magnitude() {
        let mut data = vec![0u8; 40];
        data[0] = 0x80;
        data[1] = 0x4B;
        let m = decode_monitoring(&response(&data)).into_option().unwrap();
        assert_eq!(m.temperature, Reading::Value(37.0));
    }

    #[test]
    fn test_voltage_and_monitoring_card() {
        let mut data = vec![0u8; 40];
        data[3] = 0xB2;
        data[50 - DATA_OFFSET] = 0xFF;
        let m = decode_monitoring(&response(&data)).into_option().unwrap();
        assert_eq!(m.voltage, Reading::Value(5.0));
        assert!(m.monitoring_card);

        data[3] = 0x32;
        data[50 - DATA_OFFSET] = 0x00;
        let m = decode_monitoring(&response(&data)).into_option().unwrap();
        assert_eq!(m.voltage, Reading::NotAvailable);
        assert!(!m.monitoring_card);
    }

    #[test]
    fn test_kill_mode() {
        assert_eq!(decode_kill_mode(&with_byte(18, 0x00)), Reading::Value(KillMode::On));
        assert_eq!(decode_kill_mode(&with_byte(18, 0xFF)), Reading::Value(KillMode::Off));
        let unknown = decode_kill_mode(&with_byte(18, 0x7E));
        assert_eq!(unknown, Reading::Value(KillMode::Unknown(0x7E)));
        assert!(!unknown.value().is_some_and(KillMode::is_on));
        let missing = decode_kill_mode(&Payload::new(Vec::new()));
        assert_eq!(missing, Reading::NotAvailable);
        assert!(!missing.value().is_some_and(KillMode::is_on));
    }

    #[test]
    fn test_lock_mode_and_gamma() {
        assert_eq!(decode_lock_mode(&with_byte(18, 0xFF)), Reading::Value(LockMode::Locked));
        assert_eq!(decode_lock_mode(&with_byte(18, 0x00)), Reading::Value(LockMode::Normal));
        assert_eq!(decode_gamma(&with_byte(18, 28)), Reading::Value(2.8));
    }

    #[test]
    fn test_brightness_percent() {
        let b = decode_display_brightness(&with_byte(18, 128)).into_option().unwrap();
        assert_eq!(b.percent, 50);
        let b = decode_display_brightness(&with_byte(18, 255)).into_option().unwrap();
        assert_eq!(b.percent, 100);
        let r = decode_receiver_brightness(&response(&[255, 10, 20, 30, 40]))
            .into_option()
            .unwrap();
        assert_eq!((r.red, r.green, r.blue, r.v_red), (10, 20, 30, 40));
    }

    #[test]
    fn test_firmware_formats() {
        let p = response(&[4, 5, 1, 0x1A]);
        assert_eq!(decode_sender_firmware(&p), Reading::Value("4.5.1.26".to_string()));
        assert_eq!(decode_receiver_firmware(&p), Reading::Value("4.5.1.1a".to_string()));
    }

    #[test]
    fn test_models() {
        let sender = decode_model(&response(&[0x01, 0x11])).into_option().unwrap();
        assert!(sender.is_multi_input());
        assert_eq!(sender.to_string(), "0x1101");
        assert_eq!(
            decode_function_card(&response(&[0x01, 0x81])),
            Reading::Value(FunctionCardModel::Mfn300)
        );
        assert_eq!(
            decode_function_card(&response(&[0x00, 0x00])),
            Reading::Value(FunctionCardModel::Absent)
        );
    }

    #[test]
    fn test_module_flash() {
        let data = [
            0x05, 0x05, 0, 0, // ok
            0x03, 0x05, 0, 0, // error
            0x05, 0x03, 0, 0, // error on acknowledge
            0x05, 0x07, 0, 0, // unknown
            0x00, 0x00, 0, 0, // missing
            0x05, 0x00, 0, 0, // missing acknowledge
            0x03, 0x00, 0, 0, // error wins over missing
        ];
        let modules = decode_module_flash(&response(&data)).into_option().unwrap();
        let health: Vec<_> = modules.iter().map(|m| m.health).collect();
        assert_eq!(
            health,
            [
                ModuleHealth::Ok,
                ModuleHealth::Error,
                ModuleHealth::Error,
                ModuleHealth::Unknown,
                ModuleHealth::Missing,
                ModuleHealth::Missing,
                ModuleHealth::Error
            ]
        );
        assert_eq!(modules[1].raw, vec![0x03, 0x05]);
        assert!(modules[3].is_ok());
        assert!(!modules[4].is_ok());
        assert!(!modules[5].is_ok());
    }

    #[test]
    fn test_module_flash_truncated_is_unavailable() {
        let mut p = response(&[0x05, 0x05, 0, 0, 0x05, 0x05, 0, 0]);
        let mut raw = p.as_bytes().to_vec();
        raw[DATA_LENGTH_OFFSET] = 16;
        p = Payload::new(raw);
        assert_eq!(decode_module_flash(&p), Reading::NotAvailable);
    }

    #[test]
    fn test_module_status_live() {
        let stride = module_status_stride(4);
        assert_eq!(stride, 30);
        let mut data = vec![0u8; 3 * stride];
        data[0] = 0xFF;
        data[stride] = 0x00;
        data[2 * stride] = 0x42;
        data[2 * stride + 26] = 0x01;
        let modules = decode_module_status(&response(&data), 3, 4)
            .into_option()
            .unwrap();
        assert_eq!(modules[0].health, ModuleHealth::Ok);
        assert_eq!(modules[1].health, ModuleHealth::Error);
        assert_eq!(modules[2].health, ModuleHealth::Unknown);
        assert_eq!(modules[0].block_fault, Some(false));
        assert_eq!(modules[2].block_fault, Some(true));
        assert!(!modules[1].is_ok());
        assert!(modules[2].is_ok());
    }

    #[test]
    fn test_module_status_short_response() {
        let data = vec![0xFFu8; 2 * 30];
        assert_eq!(
            decode_module_status(&response(&data), 4, 4),
            Reading::NotAvailable
        );
        assert_eq!(module_status_length(4, 4), 120);
    }

    #[test]
    fn test_ribbon_cable() {
        let mut data = [0u8; 16];
        data[0] = 0x21;
        data[14] = 0x80;
        let r = decode_ribbon_cable(&response(&data)).into_option().unwrap();
        assert_eq!(r.groups.len(), 16);
        assert_eq!(&r.groups[..2], &[0x2, 0x1]);
        assert_eq!(r.dclk, 0x80);
        assert!(r.has_fault());
        let clean = decode_ribbon_cable(&response(&[0u8; 16])).into_option().unwrap();
        assert!(!clean.has_fault());
    }

    #[test]
    fn test_sender_flags() {
        assert_eq!(decode_dvi_signal(&with_byte(18, 1)), Reading::Value(DviSignal::Valid));
        assert_eq!(decode_dvi_signal(&with_byte(18, 0)), Reading::Value(DviSignal::NotValid));
        assert_eq!(decode_als_mode(&with_byte(18, 0x7D)), Reading::Value(AlsMode::Enabled));
        assert_eq!(decode_als_mode(&with_byte(18, 0xFF)), Reading::Value(AlsMode::Disabled));
        assert_eq!(
            decode_redundancy(&with_byte(18, 0b1110_0100)),
            Reading::Value(Redundancy { ports: [0, 1, 2, 3] })
        );
    }

    #[test]
    fn test_input_sources() {
        assert_eq!(
            decode_input_source_mode(&with_byte(18, 0x5A)),
            Reading::Value(InputSourceMode::Manual)
        );
        assert_eq!(
            decode_input_source_selected(&with_byte(18, 0x61)),
            Reading::Value(InputSelection::Selected(InputPort::DualDvi))
        );
        assert_eq!(
            decode_input_source_status(&with_byte(18, 0b0000_1100)),
            Reading::Value(InputStatus::Active(InputPort::Dvi1))
        );
        assert_eq!(
            decode_input_source_status(&with_byte(18, 0xFF)),
            Reading::Value(InputStatus::NoSignal(0xFF))
        );
        assert_eq!(
            decode_input_source_status(&with_byte(18, 0x80)),
            Reading::Value(InputStatus::NoSignal(0x80))
        );
    }

    #[test]
    fn test_ambient_light() {
        let direct = decode_ambient_light_direct(&response(&[10, 0x80]));
        assert_eq!(direct, Reading::Value(AmbientLight::Lux(2570)));
        let invalid = decode_ambient_light_direct(&response(&[10, 0x00]));
        assert_eq!(invalid, Reading::Value(AmbientLight::Invalid(10)));
        let card = decode_ambient_light_function_card(&response(&[0, 0, 0x80, 2]));
        assert_eq!(card, Reading::Value(AmbientLight::Lux(514)));
    }

    #[test]
    fn test_als_settings() {
        let mut data = vec![0u8; 33];
        let mut put = |offset: usize, value: u8| data[offset - DATA_OFFSET] = value;
        put(18, 2);
        put(22, 0x10);
        put(23, 0x27);
        put(24, 0x64);
        put(26, 255);
        put(27, 128);
        put(28, 8);
        put(41, 0x01);
        put(42, 0x02);
        put(50, 3);
        let s = decode_als_settings(&response(&data)).into_option().unwrap();
        assert_eq!(s.sensors, 2);
        assert_eq!(s.max_lux, 10_000);
        assert_eq!(s.min_lux, 100);
        assert_eq!(s.max_brightness_percent, 100);
        assert_eq!(s.min_brightness_percent, 50);
        assert_eq!(s.steps, 8);
        assert_eq!(s.function_card_position, 0x0201);
        assert_eq!(s.port_position, 3);
    }

    #[test]
    fn test_cabinet_dimension_and_connection() {
        assert_eq!(decode_cabinet_dimension(&response(&[0x80, 0x01])), Reading::Value(384));
        assert_eq!(decode_connection(&response(&[0, 0])), Reading::Value(false));
        assert_eq!(decode_connection(&response(&[0, 1])), Reading::Value(true));
    }

    #[test]
    fn test_register_kinds_have_templates() {
        assert_eq!(RegisterKind::ModuleFlash.name(), "module_flash_readback");
        assert_eq!(RegisterKind::Connection.to_string(), "connection");
    }
}
