//! Frame checksum
//!
//! The controller protocol uses a 16-bit additive checksum over the frame
//! body (everything between the `55 AA` header and the two trailing checksum
//! bytes), offset by a fixed constant.

/// Constant added to the byte sum
pub const CHECKSUM_OFFSET: u16 = 0x5555;

/// Number of trailing checksum bytes in every frame
pub const CHECKSUM_LEN: usize = 2;

/// First byte covered by the checksum (the header is excluded)
pub const BODY_START: usize = 2;

/// Simple 16-bit sum, wrapping
pub fn sum16_checksum(data: &[u8]) -> u16 {
    data.iter().fold(0u16, |acc, &b| acc.wrapping_add(b as u16))
}

/// Checksum of a complete frame, ignoring whatever currently sits in the
/// checksum positions.
///
/// Frames shorter than header + checksum have an empty body and yield the
/// bare offset.
pub fn frame_checksum(frame: &[u8]) -> u16 {
    let body = if frame.len() >= BODY_START + CHECKSUM_LEN {
        &frame[BODY_START..frame.len() - CHECKSUM_LEN]
    } else {
        &[]
    };
    sum16_checksum(body).wrapping_add(CHECKSUM_OFFSET)
}

/// Write the checksum into the last two bytes of `frame`.
///
/// Bits 0-7 land at `len - 2` and bits 8-15 at `len - 1`, which is the
/// order the controller expects on the wire.
pub fn apply(frame: &mut [u8]) {
    let len = frame.len();
    if len < BODY_START + CHECKSUM_LEN {
        return;
    }
    let [low, high] = frame_checksum(frame).to_le_bytes();
    frame[len - 2] = low;
    frame[len - 1] = high;
}

/// Check the trailing bytes of `frame` against its computed checksum.
///
/// Incoming responses are never verified this way during a poll; the helper
/// exists for tests and diagnostics.
pub fn verify(frame: &[u8]) -> bool {
    let len = frame.len();
    if len < BODY_START + CHECKSUM_LEN {
        return false;
    }
    frame[len - 2..] == frame_checksum(frame).to_le_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sum16_wraps() {
        let data = vec![0xFF; 300];
        // 300 * 255 = 76500 = 0x12AD4 -> 0x2AD4
        assert_eq!(sum16_checksum(&data), 0x2AD4);
    }

    #[test]
    fn test_connection_command_checksum() {
        let mut frame = [
            0x55, 0xAA, 0x00, 0xAA, 0xFE, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x00,
            0x00, 0x00, 0x02, 0x00, 0x00, 0x00,
        ];
        apply(&mut frame);
        assert_eq!(&frame[18..], &[0x01, 0x57]);
        assert!(verify(&frame));
    }

    #[test]
    fn test_offset_overflow_wraps() {
        // body sum 0xAAAB + 0x5555 = 0x10000 -> 0x0000
        let mut frame = vec![0x55, 0xAA];
        frame.extend(std::iter::repeat(0xFF).take(171));
        frame.push(0x56);
        frame.extend([0, 0]);
        assert_eq!(sum16_checksum(&frame[2..frame.len() - 2]), 0xAAAB);
        apply(&mut frame);
        assert_eq!(&frame[frame.len() - 2..], &[0x00, 0x00]);
    }

    #[test]
    fn test_short_frame_untouched() {
        let mut frame = [0x55, 0xAA, 0x01];
        apply(&mut frame);
        assert_eq!(frame, [0x55, 0xAA, 0x01]);
        assert!(!verify(&frame));
    }
}
