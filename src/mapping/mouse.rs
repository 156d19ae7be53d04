//! Mouse emulation from the left stick
//!
//! The stick sets a target pointer velocity which the pointer approaches by
//! exponential smoothing. `a` and `b` click on their rising edge, `back` asks
//! the mapper to leave mouse mode.

use super::NormalizedInputState;
use crate::output::MouseSink;
use crate::profile::ButtonName;
use std::collections::HashMap;

/// Pointer speed in pixels per report at full deflection and sensitivity 1
pub const POINTER_SPEED: f64 = 35.0;

pub const SMOOTHING_FACTOR: f64 = 0.25;

const STICK_RANGE: f64 = 32768.0;

/// Smoothed pointer velocity carried across reports
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointerSmoother {
    dx: f64,
    dy: f64,
}

impl PointerSmoother {
    /// Advances one report and returns the motion to emit
    pub fn step(&mut self, x: i16, y: i16, sensitivity: f64) -> (f64, f64) {
        let nx = x as f64 / STICK_RANGE;
        let ny = y as f64 / STICK_RANGE;

        let target_dx = nx * POINTER_SPEED * sensitivity;
        // Screen y grows downwards
        let target_dy = -ny * POINTER_SPEED * sensitivity;

        self.dx = self.dx * (1.0 - SMOOTHING_FACTOR) + target_dx * SMOOTHING_FACTOR;
        self.dy = self.dy * (1.0 - SMOOTHING_FACTOR) + target_dy * SMOOTHING_FACTOR;
        (self.dx, self.dy)
    }

    /// Current smoothed `(dx, dy)`
    pub fn velocity(&self) -> (f64, f64) {
        (self.dx, self.dy)
    }
}

/// Remembers the previous state of each tracked button
#[derive(Debug, Clone, Default)]
pub struct EdgeDetector {
    previous: HashMap<ButtonName, bool>,
}

impl EdgeDetector {
    /// True only on a released to pressed transition
    pub fn rising(&mut self, button: ButtonName, pressed: bool) -> bool {
        let was_pressed = self.previous.insert(button, pressed).unwrap_or(false);
        pressed && !was_pressed
    }

    pub fn is_held(&self, button: ButtonName) -> bool {
        self.previous.get(&button).copied().unwrap_or(false)
    }

    /// Forgets all held buttons
    pub fn reset(&mut self) {
        self.previous.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseOutcome {
    Continue,
    /// `back` was just pressed
    ExitRequested,
}

/// Emits one report worth of pointer motion and clicks
pub fn drive_pointer(
    state: &NormalizedInputState,
    sensitivity: f64,
    smoother: &mut PointerSmoother,
    edges: &mut EdgeDetector,
    sink: &mut dyn MouseSink,
) -> MouseOutcome {
    let (dx, dy) = smoother.step(state.left_stick.x, state.left_stick.y, sensitivity);
    sink.move_relative(dx, dy);

    if edges.rising(ButtonName::A, state.is_pressed(ButtonName::A)) {
        sink.click_left();
    }
    if edges.rising(ButtonName::B, state.is_pressed(ButtonName::B)) {
        sink.click_right();
    }

    if edges.rising(ButtonName::Back, state.is_pressed(ButtonName::Back)) {
        MouseOutcome::ExitRequested
    } else {
        MouseOutcome::Continue
    }
}
