//! Command frames and response validation
//!
//! Outgoing frames are built from immutable [`CommandTemplate`]s: the
//! template is copied, named [`Patch`]es are applied and the checksum is
//! appended. Incoming frames are validated on their status byte alone; the
//! controller's response checksum is never checked, matching how the
//! hardware is driven in the field.

use super::checksum;
use std::fmt;

/// Frame header bytes
pub const HEADER: [u8; 2] = [0x55, 0xAA];

/// Offset of the response status byte
pub const STATUS_OFFSET: usize = 2;

/// Offset of the target receiver-card index
pub const RECEIVER_INDEX_OFFSET: usize = 8;

/// Offset of the little-endian data length field
pub const DATA_LENGTH_OFFSET: usize = 16;

/// First byte of register data in a response
pub const DATA_OFFSET: usize = 18;

/// Minimum length of a command frame
pub const MIN_COMMAND_LEN: usize = 20;

/// Immutable prototype of one register command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandTemplate {
    /// Short register name used in logs and topology misses
    pub name: &'static str,
    bytes: &'static [u8],
    receiver_addressed: bool,
    variable_length: bool,
}

impl CommandTemplate {
    /// Template addressed to the sender card itself
    pub const fn sender(name: &'static str, bytes: &'static [u8]) -> Self {
        Self {
            name,
            bytes,
            receiver_addressed: false,
            variable_length: false,
        }
    }

    /// Template addressed to a receiver card through byte 8
    pub const fn receiver(name: &'static str, bytes: &'static [u8]) -> Self {
        Self {
            name,
            bytes,
            receiver_addressed: true,
            variable_length: false,
        }
    }

    /// Receiver template whose data length (bytes 16-17) is patched per request
    pub const fn receiver_with_length(name: &'static str, bytes: &'static [u8]) -> Self {
        Self {
            name,
            bytes,
            receiver_addressed: true,
            variable_length: true,
        }
    }

    /// Raw prototype bytes, including stale checksum placeholders
    pub fn bytes(&self) -> &'static [u8] {
        self.bytes
    }

    /// Template length
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Templates are never empty; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Whether byte 8 selects a receiver card
    pub fn is_receiver_addressed(&self) -> bool {
        self.receiver_addressed
    }

    /// Does `frame` carry this command, ignoring patch points and checksum?
    pub fn matches(&self, frame: &[u8]) -> bool {
        if frame.len() != self.bytes.len() {
            return false;
        }
        let body_end = self.bytes.len() - checksum::CHECKSUM_LEN;
        (0..body_end).all(|i| {
            let patched = (self.receiver_addressed && i == RECEIVER_INDEX_OFFSET)
                || (self.variable_length
                    && (i == DATA_LENGTH_OFFSET || i == DATA_LENGTH_OFFSET + 1));
            patched || frame[i] == self.bytes[i]
        })
    }
}

/// Named byte patch applied to a copy of a template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Patch {
    /// Target receiver card index (byte 8)
    ReceiverIndex(u8),
    /// Requested data length (byte 16 low, byte 17 high)
    DataLength(u16),
}

impl Patch {
    fn apply(self, bytes: &mut [u8]) {
        match self {
            Patch::ReceiverIndex(index) => {
                if let Some(b) = bytes.get_mut(RECEIVER_INDEX_OFFSET) {
                    *b = index;
                }
            }
            Patch::DataLength(length) => {
                let [low, high] = length.to_le_bytes();
                if bytes.len() > DATA_LENGTH_OFFSET + 1 {
                    bytes[DATA_LENGTH_OFFSET] = low;
                    bytes[DATA_LENGTH_OFFSET + 1] = high;
                }
            }
        }
    }
}

/// A frame ready for the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame(Vec<u8>);

impl Frame {
    /// Frame bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume into bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex_dump(&self.0))
    }
}

/// Build a frame from a template: copy, patch, checksum
pub fn compose(template: &CommandTemplate, patches: &[Patch]) -> Frame {
    let mut bytes = template.bytes().to_vec();
    for patch in patches {
        patch.apply(&mut bytes);
    }
    checksum::apply(&mut bytes);
    Frame(bytes)
}

/// Response status reported at offset 2
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ResponseStatus {
    /// Command succeeded
    Ok,
    /// Timed out accessing devices behind the sender card
    Timeout,
    /// Check error on the request package
    RequestCheckError,
    /// Check error on the acknowledge package
    AckCheckError,
    /// Command not recognised
    InvalidCommand,
    /// Any other code; `None` when the response was too short to carry one
    Unknown(Option<u8>),
}

impl ResponseStatus {
    /// Map a raw status byte
    pub fn from_u8(code: u8) -> Self {
        match code {
            0 => ResponseStatus::Ok,
            1 => ResponseStatus::Timeout,
            2 => ResponseStatus::RequestCheckError,
            3 => ResponseStatus::AckCheckError,
            4 => ResponseStatus::InvalidCommand,
            other => ResponseStatus::Unknown(Some(other)),
        }
    }

    /// Only `Ok` authorises payload decoding
    pub fn is_ok(&self) -> bool {
        matches!(self, ResponseStatus::Ok)
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseStatus::Ok => write!(f, "ok"),
            ResponseStatus::Timeout => write!(
                f,
                "time out accessing devices connected to the sending card"
            ),
            ResponseStatus::RequestCheckError => write!(f, "check error on request data package"),
            ResponseStatus::AckCheckError => write!(f, "check error on acknowledge data package"),
            ResponseStatus::InvalidCommand => write!(f, "invalid command"),
            ResponseStatus::Unknown(Some(code)) => write!(f, "unknown error (0x{code:02X})"),
            ResponseStatus::Unknown(None) => write!(f, "unknown error (short response)"),
        }
    }
}

/// Response bytes that register decoders may read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload(Vec<u8>);

impl Payload {
    /// Wrap raw response bytes without validating them
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Status byte of the wrapped response
    pub fn status(&self) -> ResponseStatus {
        match self.0.get(STATUS_OFFSET) {
            Some(&code) => ResponseStatus::from_u8(code),
            None => ResponseStatus::Unknown(None),
        }
    }

    /// Byte at `offset`, if present
    pub fn byte(&self, offset: usize) -> Option<u8> {
        self.0.get(offset).copied()
    }

    /// `len` bytes starting at `offset`, if all present
    pub fn slice(&self, offset: usize, len: usize) -> Option<&[u8]> {
        self.0.get(offset..offset.checked_add(len)?)
    }

    /// Full response bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Response length
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the response is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(&self.0))
    }
}

/// Validate a raw response on its status byte
pub fn validate(raw: &[u8]) -> Result<Payload, ResponseStatus> {
    let Some(&code) = raw.get(STATUS_OFFSET) else {
        return Err(ResponseStatus::Unknown(None));
    };
    match ResponseStatus::from_u8(code) {
        ResponseStatus::Ok => Ok(Payload(raw.to_vec())),
        status => Err(status),
    }
}

/// Space separated upper-case hex, as frames appear in the debug log
pub fn hex_dump(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::protocol::commands;

    #[test]
    fn test_compose_leaves_template_untouched() {
        let template = commands::KILL_MODE;
        let before = template.bytes().to_vec();
        let frame = compose(&template, &[Patch::ReceiverIndex(7)]);
        assert_eq!(template.bytes(), before.as_slice());
        assert_eq!(frame.as_bytes()[RECEIVER_INDEX_OFFSET], 7);
        assert!(checksum::verify(frame.as_bytes()));
    }

    #[test]
    fn test_compose_data_length_split() {
        let frame = compose(
            &commands::MODULE_STATUS,
            &[Patch::ReceiverIndex(1), Patch::DataLength(0x0178)],
        );
        let bytes = frame.as_bytes();
        assert_eq!(bytes[16], 0x78);
        assert_eq!(bytes[17], 0x01);
        assert!(checksum::verify(bytes));
    }

    #[test]
    fn test_connection_matches_documented_constant() {
        let frame = compose(&commands::CONNECTION, &[]);
        assert_eq!(&frame.as_bytes()[18..], &[0x01, 0x57]);
    }

    #[test]
    fn test_validate_round_trip() {
        for template in commands::ALL {
            let patches = if template.is_receiver_addressed() {
                vec![Patch::ReceiverIndex(3)]
            } else {
                Vec::new()
            };
            let frame = compose(template, &patches);
            let mut raw = frame.clone().into_bytes();
            raw[STATUS_OFFSET] = 0;
            let payload = validate(&raw).expect("status forced to ok");
            let n = raw.len() - checksum::CHECKSUM_LEN;
            assert_eq!(&payload.as_bytes()[..n], &frame.as_bytes()[..n], "{}", template.name);
        }
    }

    #[test]
    fn test_validate_statuses() {
        let mut raw = vec![0x55, 0xAA, 0x00, 0x32];
        for (code, expected) in [
            (1, ResponseStatus::Timeout),
            (2, ResponseStatus::RequestCheckError),
            (3, ResponseStatus::AckCheckError),
            (4, ResponseStatus::InvalidCommand),
            (9, ResponseStatus::Unknown(Some(9))),
        ] {
            raw[STATUS_OFFSET] = code;
            assert_eq!(validate(&raw), Err(expected));
        }
        assert_eq!(validate(&[0x55, 0xAA]), Err(ResponseStatus::Unknown(None)));
        assert_eq!(validate(&[]), Err(ResponseStatus::Unknown(None)));
    }

    #[test]
    fn test_template_matching_ignores_patch_points() {
        let frame = compose(&commands::RECEIVER_MODEL, &[Patch::ReceiverIndex(12)]);
        assert!(commands::RECEIVER_MODEL.matches(frame.as_bytes()));
        assert!(!commands::GAMMA.matches(frame.as_bytes()));
        let probe = compose(&commands::CONNECTION, &[]);
        assert!(!commands::SENDER_MODEL.matches(probe.as_bytes()));
    }

    #[test]
    fn test_hex_dump() {
        assert_eq!(hex_dump(&[0x55, 0xAA, 0x00]), "55 AA 00");
        assert_eq!(hex_dump(&[]), "");
    }
}
