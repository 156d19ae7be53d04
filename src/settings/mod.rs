//! User-tunable settings
//!
//! The decode engine only ever reads settings through [`SettingsProvider`] and
//! always works on a sanitized [`SettingsSnapshot`] taken per report.

pub mod file;

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub use file::{SettingsError, SettingsFile};

pub const DEFAULT_DEADZONE: f64 = 0.1;
pub const DEFAULT_MOUSE_SENSITIVITY: f64 = 1.0;
pub const DEFAULT_POLLING_INTERVAL_MS: f64 = 8.0;
/// Longest pause a worker takes between two reports
pub const MAX_POLLING_INTERVAL_MS: f64 = 1000.0;

/// Per-axis inversion flags of one stick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StickInversion {
    pub x: bool,
    pub y: bool,
}

/// Typed read access to the user configuration
pub trait SettingsProvider: Send + Sync {
    /// `(left, right)` deadzone ratios
    fn deadzones(&self) -> (f64, f64);

    /// `(left, right)` stick inversion
    fn inversion(&self) -> (StickInversion, StickInversion);

    fn mouse_mode(&self) -> bool;

    fn mouse_sensitivity(&self) -> f64;

    fn polling_interval_ms(&self) -> f64;

    /// Collects every getter into one sanitized snapshot
    fn snapshot(&self) -> SettingsSnapshot {
        let (left_deadzone, right_deadzone) = self.deadzones();
        let (left_invert, right_invert) = self.inversion();
        SettingsSnapshot {
            left_deadzone,
            right_deadzone,
            left_invert,
            right_invert,
            mouse_mode: self.mouse_mode(),
            mouse_sensitivity: self.mouse_sensitivity(),
            polling_interval_ms: self.polling_interval_ms(),
        }
        .sanitized()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SettingsSnapshot {
    pub left_deadzone: f64,
    pub right_deadzone: f64,
    pub left_invert: StickInversion,
    pub right_invert: StickInversion,
    pub mouse_mode: bool,
    pub mouse_sensitivity: f64,
    pub polling_interval_ms: f64,
}

impl Default for SettingsSnapshot {
    fn default() -> Self {
        Self {
            left_deadzone: DEFAULT_DEADZONE,
            right_deadzone: DEFAULT_DEADZONE,
            left_invert: StickInversion::default(),
            right_invert: StickInversion::default(),
            mouse_mode: false,
            mouse_sensitivity: DEFAULT_MOUSE_SENSITIVITY,
            polling_interval_ms: DEFAULT_POLLING_INTERVAL_MS,
        }
    }
}

impl SettingsSnapshot {
    /// Clamps deadzones into `[0,1]`, replaces unusable sensitivity and interval values
    pub fn sanitized(self) -> Self {
        let deadzone = |value: f64| {
            if value.is_nan() {
                DEFAULT_DEADZONE
            } else {
                value.clamp(0.0, 1.0)
            }
        };

        let mouse_sensitivity = if self.mouse_sensitivity.is_finite() && self.mouse_sensitivity > 0.0
        {
            self.mouse_sensitivity
        } else {
            DEFAULT_MOUSE_SENSITIVITY
        };

        let polling_interval_ms =
            if self.polling_interval_ms.is_finite() && self.polling_interval_ms >= 0.0 {
                self.polling_interval_ms.min(MAX_POLLING_INTERVAL_MS)
            } else {
                0.0
            };

        Self {
            left_deadzone: deadzone(self.left_deadzone),
            right_deadzone: deadzone(self.right_deadzone),
            mouse_sensitivity,
            polling_interval_ms,
            ..self
        }
    }

    /// Pause after each report; saturates instead of panicking on huge values
    pub fn polling_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.polling_interval_ms.max(0.0) / 1000.0)
            .unwrap_or(Duration::MAX)
    }
}

impl SettingsProvider for SettingsSnapshot {
    fn deadzones(&self) -> (f64, f64) {
        (self.left_deadzone, self.right_deadzone)
    }

    fn inversion(&self) -> (StickInversion, StickInversion) {
        (self.left_invert, self.right_invert)
    }

    fn mouse_mode(&self) -> bool {
        self.mouse_mode
    }

    fn mouse_sensitivity(&self) -> f64 {
        self.mouse_sensitivity
    }

    fn polling_interval_ms(&self) -> f64 {
        self.polling_interval_ms
    }
}

/// Settings that can be changed while workers are running
///
/// Cloning shares the underlying values.
#[derive(Debug, Clone, Default)]
pub struct LiveSettings {
    inner: Arc<RwLock<SettingsSnapshot>>,
}

impl LiveSettings {
    /// Shared settings starting from `initial`
    pub fn new(initial: SettingsSnapshot) -> Self {
        Self {
            inner: Arc::new(RwLock::new(initial)),
        }
    }

    /// Applies `change` under the write lock; workers see it on their next report
    pub fn update(&self, change: impl FnOnce(&mut SettingsSnapshot)) {
        let mut settings = self.inner.write();
        change(&mut settings);
        debug!("Settings updated: {:?}", *settings);
    }
}

impl SettingsProvider for LiveSettings {
    fn deadzones(&self) -> (f64, f64) {
        self.inner.read().deadzones()
    }

    fn inversion(&self) -> (StickInversion, StickInversion) {
        self.inner.read().inversion()
    }

    fn mouse_mode(&self) -> bool {
        self.inner.read().mouse_mode
    }

    fn mouse_sensitivity(&self) -> f64 {
        self.inner.read().mouse_sensitivity
    }

    fn polling_interval_ms(&self) -> f64 {
        self.inner.read().polling_interval_ms
    }

    fn snapshot(&self) -> SettingsSnapshot {
        self.inner.read().sanitized()
    }
}
