//! Output sinks
//!
//! A mapper pushes every decoded state into exactly one active sink of its
//! [`OutputSink`]. The inactive one is parked so the mode can switch back:
//!
//! ```text
//!                     ┌─► Gamepad { pad, pointer }        pad.update(state)
//! NormalizedInputState┤
//!                     └─► Mouse { pointer, pad }          move_relative / click_*
//!
//! Mouse ── back pressed / mouse mode turned off ──► Gamepad
//! Gamepad ─────────── mouse mode turned on ───────► Mouse
//! ```
//!
//! Sinks are owned by the worker thread driving the device, so they only need
//! to be `Send`.

pub mod tracing_sink;
pub mod xusb;

use crate::mapping::NormalizedInputState;

pub use tracing_sink::{TracingGamepadSink, TracingMouseSink};
pub use xusb::XusbReport;

/// Virtual gamepad driver
pub trait GamepadSink: Send {
    fn update(&mut self, state: &NormalizedInputState);

    /// Returns the pad to neutral, called when the device stops
    fn reset(&mut self) {
        self.update(&NormalizedInputState::default());
    }
}

/// Pointer and click emitter
pub trait MouseSink: Send {
    fn move_relative(&mut self, dx: f64, dy: f64);

    fn click_left(&mut self);

    fn click_right(&mut self);
}

/// Discards every update
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl GamepadSink for NullSink {
    fn update(&mut self, _state: &NormalizedInputState) {}
}

impl MouseSink for NullSink {
    fn move_relative(&mut self, _dx: f64, _dy: f64) {}

    fn click_left(&mut self) {}

    fn click_right(&mut self) {}
}

/// Active output of one mapper, switched by mouse mode
pub enum OutputSink {
    /// `pointer` stays parked until mouse mode is turned on
    Gamepad {
        pad: Box<dyn GamepadSink>,
        pointer: Box<dyn MouseSink>,
    },
    /// `pad` takes over once the session leaves mouse mode
    Mouse {
        pointer: Box<dyn MouseSink>,
        pad: Box<dyn GamepadSink>,
    },
}

impl OutputSink {
    /// Picks the active sink for the current mouse mode setting
    pub fn resolve(
        mouse_mode: bool,
        pad: Box<dyn GamepadSink>,
        pointer: Box<dyn MouseSink>,
    ) -> Self {
        if mouse_mode {
            Self::Mouse { pointer, pad }
        } else {
            Self::Gamepad { pad, pointer }
        }
    }

    /// Whether the pointer sink is active
    pub fn is_mouse(&self) -> bool {
        matches!(self, Self::Mouse { .. })
    }

    /// Makes the pointer sink active; no-op when already in mouse mode
    pub fn enter_mouse_mode(&mut self) {
        if self.is_mouse() {
            return;
        }
        if let Self::Gamepad { pad, pointer } = self.take() {
            *self = Self::Mouse { pointer, pad };
        }
    }

    /// Hands output back to the gamepad sink; no-op for gamepad sinks
    pub fn leave_mouse_mode(&mut self) {
        if !self.is_mouse() {
            return;
        }
        if let Self::Mouse { pointer, pad } = self.take() {
            *self = Self::Gamepad { pad, pointer };
        }
    }

    /// Returns the gamepad to neutral if it is the active sink
    pub fn reset(&mut self) {
        match self {
            Self::Gamepad { pad, .. } => pad.reset(),
            Self::Mouse { .. } => {}
        }
    }

    fn take(&mut self) -> Self {
        std::mem::replace(
            self,
            Self::Gamepad {
                pad: Box::new(NullSink),
                pointer: Box::new(NullSink),
            },
        )
    }
}

impl std::fmt::Debug for OutputSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gamepad { .. } => f.write_str("OutputSink::Gamepad"),
            Self::Mouse { .. } => f.write_str("OutputSink::Mouse"),
        }
    }
}
