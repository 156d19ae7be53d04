//! Declarative mapping profiles
//!
//! A profile describes where one controller family puts its axes, buttons and
//! directional pad inside a raw input report. Profiles are loaded once per
//! family when a [`Mapper`](crate::mapping::mapper::Mapper) is built and are
//! never modified afterwards.
//!
//! ```text
//! family name ──► ProfileSource ──► JSON document ──normalize──► MappingProfile
//!                      │
//!                      └── built-in "generic" profile
//! ```

pub mod document;
pub mod source;

use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

pub use source::{builtin_generic, ProfileDirectory, ProfileSource, GENERIC_FAMILY};

/// Default button mask: the whole byte
pub const FULL_MASK: u8 = 0xFF;

/// Default hat mask: the low nibble
pub const HAT_MASK: u8 = 0x0F;

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("No mapping profile found for controller family '{family}'")]
    NotFound { family: String },

    #[error("Mapping profile '{family}' is invalid: {reason}")]
    Invalid { family: String, reason: String },

    #[error("Failed to read mapping profile {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ProfileError {
    pub(crate) fn invalid(family: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            family: family.to_string(),
            reason: reason.into(),
        }
    }
}

/// The six analog channels a profile can map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AxisName {
    LeftStickX,
    LeftStickY,
    RightStickX,
    RightStickY,
    LeftTrigger,
    RightTrigger,
}

impl AxisName {
    pub const ALL: [AxisName; 6] = [
        AxisName::LeftStickX,
        AxisName::LeftStickY,
        AxisName::RightStickX,
        AxisName::RightStickY,
        AxisName::LeftTrigger,
        AxisName::RightTrigger,
    ];

    /// Resolves a profile key, accepting the short aliases (`lx`, `ljx`, `lt`, ...)
    pub fn from_alias(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "left_stick_x" | "ljx" | "lx" => Some(Self::LeftStickX),
            "left_stick_y" | "ljy" | "ly" => Some(Self::LeftStickY),
            "right_stick_x" | "rjx" | "rx" => Some(Self::RightStickX),
            "right_stick_y" | "rjy" | "ry" => Some(Self::RightStickY),
            "left_trigger" | "lt" => Some(Self::LeftTrigger),
            "right_trigger" | "rt" => Some(Self::RightTrigger),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LeftStickX => "left_stick_x",
            Self::LeftStickY => "left_stick_y",
            Self::RightStickX => "right_stick_x",
            Self::RightStickY => "right_stick_y",
            Self::LeftTrigger => "left_trigger",
            Self::RightTrigger => "right_trigger",
        }
    }
}

impl fmt::Display for AxisName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Digital buttons of the virtual pad, dpad excluded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ButtonName {
    A,
    B,
    X,
    Y,
    LeftShoulder,
    RightShoulder,
    Back,
    Start,
    Guide,
    LeftThumb,
    RightThumb,
}

impl ButtonName {
    pub const ALL: [ButtonName; 11] = [
        ButtonName::A,
        ButtonName::B,
        ButtonName::X,
        ButtonName::Y,
        ButtonName::LeftShoulder,
        ButtonName::RightShoulder,
        ButtonName::Back,
        ButtonName::Start,
        ButtonName::Guide,
        ButtonName::LeftThumb,
        ButtonName::RightThumb,
    ];

    pub fn from_alias(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "a" => Some(Self::A),
            "b" => Some(Self::B),
            "x" => Some(Self::X),
            "y" => Some(Self::Y),
            "lb" | "left_shoulder" | "left_bumper" => Some(Self::LeftShoulder),
            "rb" | "right_shoulder" | "right_bumper" => Some(Self::RightShoulder),
            "back" | "select" => Some(Self::Back),
            "start" => Some(Self::Start),
            "guide" | "home" => Some(Self::Guide),
            "ls" | "left_thumb" | "left_stick" => Some(Self::LeftThumb),
            "rs" | "right_thumb" | "right_stick" => Some(Self::RightThumb),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "a",
            Self::B => "b",
            Self::X => "x",
            Self::Y => "y",
            Self::LeftShoulder => "lb",
            Self::RightShoulder => "rb",
            Self::Back => "back",
            Self::Start => "start",
            Self::Guide => "guide",
            Self::LeftThumb => "ls",
            Self::RightThumb => "rs",
        }
    }
}

impl fmt::Display for ButtonName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DpadDirection {
    Up,
    Down,
    Left,
    Right,
}

impl DpadDirection {
    /// Accepts both `up` (inside a `dpad` object) and `dpad_up` (inside `buttons`)
    pub fn from_alias(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        match name.strip_prefix("dpad_").unwrap_or(&name) {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AxisRule {
    /// `None` reads as zero
    pub byte_offset: Option<usize>,
    pub signed: bool,
    pub invert: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonRule {
    pub byte_offset: Option<usize>,
    pub mask: u8,
    /// When set, the raw byte must equal this value exactly and `mask` is ignored
    pub expected_value: Option<u8>,
}

impl ButtonRule {
    pub fn masked(byte_offset: usize, mask: u8) -> Self {
        Self {
            byte_offset: Some(byte_offset),
            mask,
            expected_value: None,
        }
    }

    pub fn exact(byte_offset: usize, value: u8) -> Self {
        Self {
            byte_offset: Some(byte_offset),
            mask: FULL_MASK,
            expected_value: Some(value),
        }
    }
}

impl Default for ButtonRule {
    fn default() -> Self {
        Self {
            byte_offset: None,
            mask: FULL_MASK,
            expected_value: None,
        }
    }
}

/// Four independent button rules, one per direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscreteDpad {
    pub up: ButtonRule,
    pub down: ButtonRule,
    pub left: ButtonRule,
    pub right: ButtonRule,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DpadRule {
    /// A single 8-way hat value, 8 (or anything above 7) means released
    Hat { byte_offset: Option<usize>, mask: u8 },
    Discrete(DiscreteDpad),
}

/// Canonical, validated profile for one controller family
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MappingProfile {
    pub family: String,
    pub axes: HashMap<AxisName, AxisRule>,
    pub buttons: HashMap<ButtonName, ButtonRule>,
    pub dpad: Option<DpadRule>,
}

impl MappingProfile {
    pub fn axis(&self, name: AxisName) -> Option<&AxisRule> {
        self.axes.get(&name)
    }

    pub fn button(&self, name: ButtonName) -> Option<&ButtonRule> {
        self.buttons.get(&name)
    }
}
