//! Register command templates
//!
//! Byte prototypes for every register the poller reads. The trailing two
//! bytes of each template are placeholders; [`compose`](super::frame::compose)
//! always recomputes them, so stale values here are harmless.

use super::frame::CommandTemplate;

// Sender card

/// Connection probe; a non-zero acknowledge means a sender card is attached
pub const CONNECTION: CommandTemplate = CommandTemplate::sender(
    "connection",
    &[
        0x55, 0xAA, 0x00, 0xAA, 0xFE, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00,
        0x00, 0x02, 0x00, 0x01, 0x57,
    ],
);

/// Sender card model (base 0x0000_0000, 2 bytes)
pub const SENDER_MODEL: CommandTemplate = CommandTemplate::sender(
    "sender_model",
    &[
        0x55, 0xAA, 0x00, 0x32, 0xFE, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00,
        0x00, 0x02, 0x00, 0x87, 0x56,
    ],
);

/// Sender card firmware (base 0x0400_0000, 4 bytes)
pub const SENDER_FIRMWARE: CommandTemplate = CommandTemplate::sender(
    "sender_firmware",
    &[
        0x55, 0xAA, 0x00, 0x15, 0xFE, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x04, 0x00, 0x10,
        0x04, 0x04, 0x00, 0x84, 0x56,
    ],
);

/// Global display brightness
pub const DISPLAY_BRIGHTNESS: CommandTemplate = CommandTemplate::sender(
    "display_brightness",
    &[
        0x55, 0xAA, 0x00, 0x15, 0xFE, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00,
        0x02, 0x05, 0x00, 0x70, 0x56,
    ],
);

/// Multifunction card model
pub const FUNCTION_CARD: CommandTemplate = CommandTemplate::sender(
    "function_card",
    &[
        0x55, 0xAA, 0x00, 0x32, 0xFE, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00,
        0x00, 0x02, 0x00, 0x8B, 0x56,
    ],
);

/// Asks the function card to refresh its light sensor register
pub const FUNCTION_CARD_REFRESH: CommandTemplate = CommandTemplate::sender(
    "function_card_refresh",
    &[
        0x55, 0xAA, 0x00, 0x15, 0xFE, 0x00, 0x02, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00,
        0x06, 0x0B, 0x00, 0x00, 0x00, 0x00, 0x00, 0x55, 0xAA, 0x01, 0x02, 0x80, 0xFF, 0x81, 0x7E,
        0x59,
    ],
);

/// Ambient light read straight from the sender card (base 0x0200_0000)
pub const ALS_DIRECT: CommandTemplate = CommandTemplate::sender(
    "als_direct",
    &[
        0x55, 0xAA, 0x00, 0x5B, 0xFE, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x0F, 0x00, 0x00,
        0x02, 0x02, 0x00, 0xC1, 0x56,
    ],
);

/// Ambient light read through the multifunction card
pub const ALS_FUNCTION_CARD: CommandTemplate = CommandTemplate::sender(
    "als_function_card",
    &[
        0x55, 0xAA, 0x00, 0x15, 0xFE, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x06, 0x05, 0x00, 0x75, 0x56,
    ],
);

/// Automatic brightness mode (base 0x0A00_0000, 1 byte)
pub const ALS_MODE: CommandTemplate = CommandTemplate::sender(
    "als_mode",
    &[
        0x55, 0xAA, 0x00, 0x5B, 0xFE, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x0A, 0x01, 0x00, 0xB9, 0x56,
    ],
);

/// Automatic brightness settings block
pub const ALS_SETTINGS: CommandTemplate = CommandTemplate::sender(
    "als_settings",
    &[
        0x55, 0xAA, 0x00, 0x5B, 0xFE, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00,
        0x0A, 0x2F, 0x00, 0xB9, 0x56,
    ],
);

/// DVI input signal (base 0x0200_0000, 1 byte)
pub const DVI_SIGNAL: CommandTemplate = CommandTemplate::sender(
    "dvi_signal",
    &[
        0x55, 0xAA, 0x00, 0x16, 0xFE, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x17, 0x00, 0x00,
        0x02, 0x01, 0x00, 0x83, 0x56,
    ],
);

/// Manual or automatic input selection (multi-input senders)
pub const INPUT_SOURCE_MODE: CommandTemplate = CommandTemplate::sender(
    "input_source_mode",
    &[
        0x55, 0xAA, 0x00, 0x32, 0xFE, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x22, 0x00, 0x00,
        0x02, 0x01, 0x00, 0xAA, 0x56,
    ],
);

/// Currently selected input (multi-input senders)
pub const INPUT_SOURCE_SELECTED: CommandTemplate = CommandTemplate::sender(
    "input_source_selected",
    &[
        0x55, 0xAA, 0x00, 0x32, 0xFE, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x23, 0x00, 0x00,
        0x02, 0x01, 0x00, 0xAB, 0x56,
    ],
);

/// Inputs carrying a valid signal (multi-input senders)
pub const INPUT_SOURCE_STATUS: CommandTemplate = CommandTemplate::sender(
    "input_source_status",
    &[
        0x55, 0xAA, 0x00, 0x32, 0xFE, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x4D, 0x00, 0x00,
        0x02, 0x01, 0x00, 0xD5, 0x56,
    ],
);

/// Cabinet width in pixels
pub const CABINET_WIDTH: CommandTemplate = CommandTemplate::sender(
    "cabinet_width",
    &[
        0x55, 0xAA, 0x00, 0x32, 0xFE, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x06, 0x00, 0x10,
        0x02, 0x02, 0x00, 0x9F, 0x56,
    ],
);

/// Cabinet height in pixels
pub const CABINET_HEIGHT: CommandTemplate = CommandTemplate::sender(
    "cabinet_height",
    &[
        0x55, 0xAA, 0x00, 0x32, 0xFE, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x08, 0x00, 0x10,
        0x02, 0x02, 0x00, 0xA1, 0x56,
    ],
);

/// Output port redundancy (base 0x0200_0000, offset 0x1E)
pub const REDUNDANCY: CommandTemplate = CommandTemplate::sender(
    "redundancy",
    &[
        0x55, 0xAA, 0x00, 0x15, 0xFE, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x1E, 0x00,
        0x02, 0x01, 0x00, 0xE2, 0x56,
    ],
);

// Receiver card (byte 8 is patched with the chain index)

/// Receiver model; also serves as the presence probe
pub const RECEIVER_MODEL: CommandTemplate = CommandTemplate::receiver(
    "receiver_model",
    &[
        0x55, 0xAA, 0x00, 0x15, 0xFE, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x02, 0x00, 0x6B, 0x56,
    ],
);

/// Receiver FPGA firmware
pub const RECEIVER_FIRMWARE: CommandTemplate = CommandTemplate::receiver(
    "receiver_firmware",
    &[
        0x55, 0xAA, 0x00, 0x32, 0xFE, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x04, 0x00, 0x00,
        0x08, 0x04, 0x00, 0x96, 0x56,
    ],
);

/// Temperature, voltage and monitoring card (base 0x0A00_0000, 0x100 bytes)
pub const MONITORING: CommandTemplate = CommandTemplate::receiver(
    "monitoring",
    &[
        0x55, 0xAA, 0x00, 0x32, 0xFE, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x0A, 0x00, 0x01, 0x91, 0x56,
    ],
);

/// Receiver brightness and colour levels
pub const RECEIVER_BRIGHTNESS: CommandTemplate = CommandTemplate::receiver(
    "receiver_brightness",
    &[
        0x55, 0xAA, 0x00, 0x14, 0xFE, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00,
        0x02, 0x05, 0x00, 0x70, 0x56,
    ],
);

/// Cabinet kill mode (output forced off)
pub const KILL_MODE: CommandTemplate = CommandTemplate::receiver(
    "kill_mode",
    &[
        0x55, 0xAA, 0x00, 0x80, 0xFE, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00,
        0x02, 0x01, 0x00, 0xD8, 0x57,
    ],
);

/// Cabinet lock mode
pub const LOCK_MODE: CommandTemplate = CommandTemplate::receiver(
    "lock_mode",
    &[
        0x55, 0xAA, 0x00, 0x80, 0xFE, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x01, 0x00,
        0x02, 0x01, 0x00, 0xD8, 0x57,
    ],
);

/// Gamma value (base 0x0200_0000, 1 byte)
pub const GAMMA: CommandTemplate = CommandTemplate::receiver(
    "gamma",
    &[
        0x55, 0xAA, 0x00, 0x15, 0xFE, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x02, 0x01, 0x00, 0x6C, 0x56,
    ],
);

/// Ribbon cable line map, needs a monitoring card (base 0x0210_0000)
pub const RIBBON_CABLE: CommandTemplate = CommandTemplate::receiver(
    "ribbon_cable",
    &[
        0x55, 0xAA, 0x00, 0x32, 0xFE, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x42, 0x00, 0x00,
        0x0A, 0x10, 0x00, 0xE2, 0x56,
    ],
);

/// Starts the on-module flash self test
pub const MODULE_FLASH_TRIGGER: CommandTemplate = CommandTemplate::receiver(
    "module_flash_trigger",
    &[
        0x55, 0xAA, 0x00, 0xF2, 0xFE, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x00, 0x74, 0x00, 0x00,
        0x01, 0x01, 0x00, 0x04, 0xC1, 0x57,
    ],
);

/// Reads back the per-module flash self test result
pub const MODULE_FLASH_READBACK: CommandTemplate = CommandTemplate::receiver(
    "module_flash_readback",
    &[
        0x55, 0xAA, 0x00, 0x03, 0xFE, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0x30, 0x00,
        0x03, 0x10, 0x00, 0xAA, 0x56,
    ],
);

/// Live per-module status; bytes 16-17 carry `modules * (22 + 2 * data_groups)`
pub const MODULE_STATUS: CommandTemplate = CommandTemplate::receiver_with_length(
    "module_status",
    &[
        0x55, 0xAA, 0x00, 0x33, 0xFE, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x50, 0x00, 0x00,
        0x0A, 0x60, 0x00, 0x00, 0x00,
    ],
);

/// Every template, for lookups by the virtual controller
pub const ALL: &[CommandTemplate] = &[
    CONNECTION,
    SENDER_MODEL,
    SENDER_FIRMWARE,
    DISPLAY_BRIGHTNESS,
    FUNCTION_CARD,
    FUNCTION_CARD_REFRESH,
    ALS_DIRECT,
    ALS_FUNCTION_CARD,
    ALS_MODE,
    ALS_SETTINGS,
    DVI_SIGNAL,
    INPUT_SOURCE_MODE,
    INPUT_SOURCE_SELECTED,
    INPUT_SOURCE_STATUS,
    CABINET_WIDTH,
    CABINET_HEIGHT,
    REDUNDANCY,
    RECEIVER_MODEL,
    RECEIVER_FIRMWARE,
    MONITORING,
    RECEIVER_BRIGHTNESS,
    KILL_MODE,
    LOCK_MODE,
    GAMMA,
    RIBBON_CABLE,
    MODULE_FLASH_TRIGGER,
    MODULE_FLASH_READBACK,
    MODULE_STATUS,
];

/// Find the template a frame was composed from
pub fn identify(frame: &[u8]) -> Option<&'static CommandTemplate> {
    ALL.iter().find(|t| t.matches(frame))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::protocol::frame::{compose, Patch, MIN_COMMAND_LEN};

    #[test]
    fn test_template_lengths() {
        for t in ALL {
            assert!(t.len() >= MIN_COMMAND_LEN, "{}", t.name);
            assert_eq!(&t.bytes()[..2], &[0x55, 0xAA], "{}", t.name);
        }
        assert_eq!(MODULE_FLASH_TRIGGER.len(), 21);
        assert_eq!(FUNCTION_CARD_REFRESH.len(), 31);
    }

    #[test]
    fn test_documented_checksums() {
        let tail = |t: &CommandTemplate| {
            let f = compose(t, &[]).into_bytes();
            [f[f.len() - 2], f[f.len() - 1]]
        };
        assert_eq!(tail(&CONNECTION), [0x01, 0x57]);
        assert_eq!(tail(&RECEIVER_MODEL), [0x6B, 0x56]);
        assert_eq!(tail(&MONITORING), [0x91, 0x56]);
        assert_eq!(tail(&MODULE_FLASH_TRIGGER), [0xC1, 0x57]);
    }

    #[test]
    fn test_identify_is_unambiguous() {
        for t in ALL {
            let patches: &[Patch] = if t.is_receiver_addressed() {
                &[Patch::ReceiverIndex(5)]
            } else {
                &[]
            };
            let frame = compose(t, patches);
            let found: Vec<_> = ALL.iter().filter(|c| c.matches(frame.as_bytes())).collect();
            assert_eq!(found.len(), 1, "{} matched {:?}", t.name, found);
            assert_eq!(identify(frame.as_bytes()).map(|c| c.name), Some(t.name));
        }
    }

    #[test]
    fn test_identify_module_status_any_length() {
        let frame = compose(
            &MODULE_STATUS,
            &[Patch::ReceiverIndex(2), Patch::DataLength(120)],
        );
        assert_eq!(identify(frame.as_bytes()).map(|c| c.name), Some("module_status"));
    }
}
