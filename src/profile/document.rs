//! JSON profile documents
//!
//! The on-disk shape is loose: offsets may be given as `byte` or `index`, masks
//! and values as integers or strings, names in several spellings. Everything is
//! normalized here into the canonical [`MappingProfile`] so that the decode path
//! never has to look at the document again.
//!
//! ```json
//! {
//!   "axes":    { "left_stick_x": { "byte": 1 }, "ly": { "index": 2, "invert": true } },
//!   "buttons": { "a": { "byte": 5, "mask": "0x20" }, "dpad_up": { "byte": 9, "value": 0 } },
//!   "dpad_hat": { "byte": 9, "mask": "0x0F" }
//! }
//! ```

use super::{
    AxisName, AxisRule, ButtonName, ButtonRule, DiscreteDpad, DpadDirection, DpadRule,
    MappingProfile, ProfileError, FULL_MASK, HAT_MASK,
};
use crate::mapping::decode::MIN_REPORT_LEN;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct ProfileDocument {
    #[serde(default)]
    axes: BTreeMap<String, RawRule>,
    #[serde(default)]
    buttons: BTreeMap<String, RawRule>,
    #[serde(default)]
    dpad_hat: Option<RawRule>,
    #[serde(default)]
    dpad: Option<BTreeMap<String, RawRule>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawRule {
    byte: Option<i64>,
    index: Option<i64>,
    mask: Option<NumberLiteral>,
    value: Option<NumberLiteral>,
    #[serde(default)]
    signed: bool,
    #[serde(default)]
    invert: bool,
}

/// `32`, `"32"` or `"0x20"`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumberLiteral {
    Int(i64),
    Text(String),
}

impl MappingProfile {
    /// Parses and validates a JSON profile document
    pub fn from_json(family: &str, json: &str) -> Result<Self, ProfileError> {
        let document: ProfileDocument = serde_json::from_str(json)
            .map_err(|e| ProfileError::invalid(family, e.to_string()))?;
        Normalizer { family }.normalize(document)
    }
}

struct Normalizer<'a> {
    family: &'a str,
}

impl Normalizer<'_> {
    fn normalize(&self, document: ProfileDocument) -> Result<MappingProfile, ProfileError> {
        let mut axes = HashMap::new();
        for (key, raw) in &document.axes {
            let Some(name) = AxisName::from_alias(key) else {
                warn!("Profile '{}': ignoring unknown axis '{}'", self.family, key);
                continue;
            };
            let rule = AxisRule {
                byte_offset: self.offset(key, raw)?,
                signed: raw.signed,
                invert: raw.invert,
            };
            if axes.insert(name, rule).is_some() {
                return Err(self.invalid(format!("axis '{}' is declared twice", name)));
            }
        }

        let mut buttons = HashMap::new();
        let mut discrete: HashMap<DpadDirection, ButtonRule> = HashMap::new();
        for (key, raw) in &document.buttons {
            if let Some(name) = ButtonName::from_alias(key) {
                let rule = self.button_rule(key, raw)?;
                if buttons.insert(name, rule).is_some() {
                    return Err(self.invalid(format!("button '{}' is declared twice", name)));
                }
            } else if let Some(direction) = key
                .to_ascii_lowercase()
                .starts_with("dpad_")
                .then(|| DpadDirection::from_alias(key))
                .flatten()
            {
                self.insert_direction(&mut discrete, direction, key, raw)?;
            } else {
                warn!("Profile '{}': ignoring unknown button '{}'", self.family, key);
            }
        }

        if let Some(entries) = &document.dpad {
            for (key, raw) in entries {
                match DpadDirection::from_alias(key) {
                    Some(direction) => self.insert_direction(&mut discrete, direction, key, raw)?,
                    None => warn!(
                        "Profile '{}': ignoring unknown dpad direction '{}'",
                        self.family, key
                    ),
                }
            }
        }

        let dpad = self.dpad_rule(document.dpad_hat.as_ref(), discrete)?;

        debug!(
            "Profile '{}' normalized: {} axes, {} buttons, dpad {:?}",
            self.family,
            axes.len(),
            buttons.len(),
            dpad
        );

        Ok(MappingProfile {
            family: self.family.to_string(),
            axes,
            buttons,
            dpad,
        })
    }

    fn dpad_rule(
        &self,
        hat: Option<&RawRule>,
        mut discrete: HashMap<DpadDirection, ButtonRule>,
    ) -> Result<Option<DpadRule>, ProfileError> {
        match (hat, discrete.len()) {
            (None, 0) => Ok(None),
            (Some(_), n) if n > 0 => Err(self.invalid(
                "dpad_hat cannot be combined with discrete dpad rules",
            )),
            (Some(raw), _) => Ok(Some(DpadRule::Hat {
                byte_offset: self.offset("dpad_hat", raw)?,
                mask: self.mask("dpad_hat", raw, HAT_MASK)?,
            })),
            (None, 4) => {
                let mut take = |direction: DpadDirection| discrete.remove(&direction).unwrap_or_default();
                Ok(Some(DpadRule::Discrete(DiscreteDpad {
                    up: take(DpadDirection::Up),
                    down: take(DpadDirection::Down),
                    left: take(DpadDirection::Left),
                    right: take(DpadDirection::Right),
                })))
            }
            (None, n) => Err(self.invalid(format!(
                "discrete dpad needs all four directions, found {}",
                n
            ))),
        }
    }

    fn insert_direction(
        &self,
        discrete: &mut HashMap<DpadDirection, ButtonRule>,
        direction: DpadDirection,
        key: &str,
        raw: &RawRule,
    ) -> Result<(), ProfileError> {
        let rule = self.button_rule(key, raw)?;
        if discrete.insert(direction, rule).is_some() {
            return Err(self.invalid(format!("dpad direction '{}' is declared twice", key)));
        }
        Ok(())
    }

    fn button_rule(&self, key: &str, raw: &RawRule) -> Result<ButtonRule, ProfileError> {
        let expected_value = raw
            .value
            .as_ref()
            .map(|literal| self.byte_literal(key, "value", literal))
            .transpose()?;

        Ok(ButtonRule {
            byte_offset: self.offset(key, raw)?,
            mask: self.mask(key, raw, FULL_MASK)?,
            expected_value,
        })
    }

    fn mask(&self, key: &str, raw: &RawRule, default: u8) -> Result<u8, ProfileError> {
        match &raw.mask {
            None => Ok(default),
            Some(literal) => match self.byte_literal(key, "mask", literal)? {
                0 => Err(self.invalid(format!("'{}': mask must not be zero", key))),
                mask => Ok(mask),
            },
        }
    }

    fn offset(&self, key: &str, raw: &RawRule) -> Result<Option<usize>, ProfileError> {
        let offset = match (raw.byte, raw.index) {
            (Some(byte), Some(index)) if byte != index => {
                return Err(self.invalid(format!(
                    "'{}': byte {} and index {} disagree",
                    key, byte, index
                )))
            }
            (Some(offset), _) | (None, Some(offset)) => offset,
            (None, None) => return Ok(None),
        };

        if offset < 0 {
            warn!(
                "Profile '{}': '{}' has negative offset {}, it will read as zero",
                self.family, key, offset
            );
            return Ok(None);
        }

        let offset = offset as usize;
        if offset >= MIN_REPORT_LEN {
            warn!(
                "Profile '{}': '{}' reads byte {} beyond the {}-byte minimum report",
                self.family, key, offset, MIN_REPORT_LEN
            );
        }
        Ok(Some(offset))
    }

    fn byte_literal(
        &self,
        key: &str,
        field: &str,
        literal: &NumberLiteral,
    ) -> Result<u8, ProfileError> {
        let number = match literal {
            NumberLiteral::Int(n) => *n,
            NumberLiteral::Text(text) => {
                let text = text.trim();
                let parsed = match text
                    .strip_prefix("0x")
                    .or_else(|| text.strip_prefix("0X"))
                {
                    Some(hex) => i64::from_str_radix(hex, 16),
                    None => text.parse::<i64>(),
                };
                parsed.map_err(|_| {
                    self.invalid(format!("'{}': {} '{}' is not a number", key, field, text))
                })?
            }
        };

        u8::try_from(number).map_err(|_| {
            self.invalid(format!(
                "'{}': {} {} does not fit in a byte",
                key, field, number
            ))
        })
    }

    fn invalid(&self, reason: impl Into<String>) -> ProfileError {
        ProfileError::invalid(self.family, reason)
    }
}
