use super::{GamepadSink, MouseSink, XusbReport};
use crate::mapping::NormalizedInputState;
use tracing::debug;

/// Logs XUSB reports instead of feeding a driver
///
/// Only changes are logged.
#[derive(Debug)]
pub struct TracingGamepadSink {
    name: String,
    last: Option<XusbReport>,
    updates: u64,
}

impl TracingGamepadSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            last: None,
            updates: 0,
        }
    }

    pub fn last_report(&self) -> Option<&XusbReport> {
        self.last.as_ref()
    }

    pub fn updates(&self) -> u64 {
        self.updates
    }
}

impl GamepadSink for TracingGamepadSink {
    fn update(&mut self, state: &NormalizedInputState) {
        self.updates += 1;
        let report = XusbReport::from_state(state);
        if self.last != Some(report) {
            debug!(
                "[{}] pad buttons={:#06x} lt={} rt={} l=({}, {}) r=({}, {})",
                self.name,
                report.buttons,
                report.left_trigger,
                report.right_trigger,
                report.thumb_lx,
                report.thumb_ly,
                report.thumb_rx,
                report.thumb_ry
            );
            self.last = Some(report);
        }
    }
}

/// Logs pointer motion and clicks, keeping a running position
#[derive(Debug)]
pub struct TracingMouseSink {
    name: String,
    position: (f64, f64),
    clicks: (u64, u64),
}

impl TracingMouseSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            position: (0.0, 0.0),
            clicks: (0, 0),
        }
    }

    pub fn position(&self) -> (f64, f64) {
        self.position
    }

    /// `(left, right)` click counts
    pub fn clicks(&self) -> (u64, u64) {
        self.clicks
    }
}

impl MouseSink for TracingMouseSink {
    fn move_relative(&mut self, dx: f64, dy: f64) {
        self.position.0 += dx;
        self.position.1 += dy;
        if dx.abs() >= 0.5 || dy.abs() >= 0.5 {
            debug!(
                "[{}] pointer move ({:.2}, {:.2}) -> ({:.1}, {:.1})",
                self.name, dx, dy, self.position.0, self.position.1
            );
        }
    }

    fn click_left(&mut self) {
        self.clicks.0 += 1;
        debug!("[{}] left click", self.name);
    }

    fn click_right(&mut self) {
        self.clicks.1 += 1;
        debug!("[{}] right click", self.name);
    }
}
