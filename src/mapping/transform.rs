//! 8-bit to 16-bit axis scaling

/// Raw value of a centred stick
pub const AXIS_CENTER: i32 = 128;

const AXIS_HALF_RANGE: f64 = 127.0;
const OUTPUT_HALF_RANGE: f64 = 32767.0;

/// Scales a raw stick byte into the signed 16-bit range
///
/// Values closer to the centre than `deadzone * 127` snap to zero. The
/// deadzone applies to this axis alone.
pub fn scale_stick(raw: u8, deadzone: f64, invert: bool) -> i16 {
    let mut centered = raw as i32 - AXIS_CENTER;
    if (centered.abs() as f64) < deadzone * AXIS_HALF_RANGE {
        centered = 0;
    }

    let direction = if invert { -1.0 } else { 1.0 };
    let normalized = direction * centered as f64 / AXIS_HALF_RANGE;
    (normalized * OUTPUT_HALF_RANGE)
        .round()
        .clamp(i16::MIN as f64, i16::MAX as f64) as i16
}

/// Raw trigger byte as magnitude, `255 - raw` when inverted
pub fn scale_trigger(raw: u8, invert: bool) -> u8 {
    if invert {
        u8::MAX - raw
    } else {
        raw
    }
}

/// Maps a two's-complement sample onto the unsigned scale centred at 128
pub fn signed_to_unsigned(raw: u8) -> u8 {
    ((raw as i8) as i16 + AXIS_CENTER as i16) as u8
}
