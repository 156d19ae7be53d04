//! Xbox 360 XUSB report layout
//!
//! Twelve little-endian bytes: `wButtons`, `bLeftTrigger`, `bRightTrigger`,
//! then the four thumb axes as `i16`.

use crate::mapping::NormalizedInputState;
use crate::profile::ButtonName;

pub const DPAD_UP: u16 = 0x0001;
pub const DPAD_DOWN: u16 = 0x0002;
pub const DPAD_LEFT: u16 = 0x0004;
pub const DPAD_RIGHT: u16 = 0x0008;
pub const START: u16 = 0x0010;
pub const BACK: u16 = 0x0020;
pub const LEFT_THUMB: u16 = 0x0040;
pub const RIGHT_THUMB: u16 = 0x0080;
pub const LEFT_SHOULDER: u16 = 0x0100;
pub const RIGHT_SHOULDER: u16 = 0x0200;
pub const GUIDE: u16 = 0x0400;
pub const A: u16 = 0x1000;
pub const B: u16 = 0x2000;
pub const X: u16 = 0x4000;
pub const Y: u16 = 0x8000;

pub const REPORT_SIZE: usize = 12;

/// `wButtons` bit for a face, shoulder or menu button
pub fn button_bit(button: ButtonName) -> u16 {
    match button {
        ButtonName::A => A,
        ButtonName::B => B,
        ButtonName::X => X,
        ButtonName::Y => Y,
        ButtonName::LeftShoulder => LEFT_SHOULDER,
        ButtonName::RightShoulder => RIGHT_SHOULDER,
        ButtonName::Back => BACK,
        ButtonName::Start => START,
        ButtonName::Guide => GUIDE,
        ButtonName::LeftThumb => LEFT_THUMB,
        ButtonName::RightThumb => RIGHT_THUMB,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct XusbReport {
    pub buttons: u16,
    pub left_trigger: u8,
    pub right_trigger: u8,
    pub thumb_lx: i16,
    pub thumb_ly: i16,
    pub thumb_rx: i16,
    pub thumb_ry: i16,
}

impl XusbReport {
    /// Packs a decoded state, dpad included
    pub fn from_state(state: &NormalizedInputState) -> Self {
        let mut buttons = state
            .buttons
            .iter()
            .fold(0u16, |bits, button| bits | button_bit(*button));

        for (pressed, bit) in [
            (state.dpad.up, DPAD_UP),
            (state.dpad.down, DPAD_DOWN),
            (state.dpad.left, DPAD_LEFT),
            (state.dpad.right, DPAD_RIGHT),
        ] {
            if pressed {
                buttons |= bit;
            }
        }

        Self {
            buttons,
            left_trigger: state.left_trigger,
            right_trigger: state.right_trigger,
            thumb_lx: state.left_stick.x,
            thumb_ly: state.left_stick.y,
            thumb_rx: state.right_stick.x,
            thumb_ry: state.right_stick.y,
        }
    }

    /// Little-endian wire layout
    pub fn to_bytes(&self) -> [u8; REPORT_SIZE] {
        let mut bytes = [0u8; REPORT_SIZE];
        bytes[0..2].copy_from_slice(&self.buttons.to_le_bytes());
        bytes[2] = self.left_trigger;
        bytes[3] = self.right_trigger;
        bytes[4..6].copy_from_slice(&self.thumb_lx.to_le_bytes());
        bytes[6..8].copy_from_slice(&self.thumb_ly.to_le_bytes());
        bytes[8..10].copy_from_slice(&self.thumb_rx.to_le_bytes());
        bytes[10..12].copy_from_slice(&self.thumb_ry.to_le_bytes());
        bytes
    }
}
