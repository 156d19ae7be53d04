//! Report decoding and numeric transforms
//!
//! ```text
//! raw report ──► decode (bytes, masks, hat) ──► transform (deadzone, invert, scale)
//!                                                      │
//!                                         NormalizedInputState
//!                                                      │
//!                           Mapper ──► OutputSink::{Gamepad | Mouse}
//! ```
//!
//! Everything up to [`NormalizedInputState`] is a pure function of the report,
//! the profile and a settings snapshot. The [`mapper::Mapper`] adds the
//! per-device session state on top.

pub mod decode;
pub mod mapper;
pub mod mouse;
pub mod transform;

use crate::profile::ButtonName;
use std::collections::BTreeSet;

pub use decode::{decode_report, MIN_REPORT_LEN};
pub use mapper::{Mapper, MapperSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DpadState {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

impl DpadState {
    pub fn is_released(&self) -> bool {
        !(self.up || self.down || self.left || self.right)
    }
}

/// One stick in signed 16-bit output range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StickState {
    pub x: i16,
    pub y: i16,
}

/// Decoded state of one report, ready for an output sink
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NormalizedInputState {
    pub left_stick: StickState,
    pub right_stick: StickState,
    pub left_trigger: u8,
    pub right_trigger: u8,
    pub buttons: BTreeSet<ButtonName>,
    pub dpad: DpadState,
}

impl NormalizedInputState {
    pub fn is_pressed(&self, button: ButtonName) -> bool {
        self.buttons.contains(&button)
    }
}
