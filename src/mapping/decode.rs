//! Bit and byte level report decoding
//!
//! Every read is bounds checked. A field whose rule is missing or points past
//! the end of the report degrades to zero or released, it never aborts decoding.

use super::transform::{scale_stick, scale_trigger, signed_to_unsigned};
use super::{DpadState, NormalizedInputState, StickState};
use crate::profile::{AxisName, AxisRule, ButtonName, ButtonRule, DpadRule, MappingProfile};
use crate::settings::SettingsSnapshot;
use tracing::trace;

/// Shorter reports are housekeeping and carry no input state
pub const MIN_REPORT_LEN: usize = 10;

/// Hat values above this mean released
const HAT_MAX_DIRECTION: u8 = 7;

/// Byte at `offset`, or 0 when there is none
pub fn read_byte_safe(report: &[u8], offset: Option<usize>) -> u8 {
    offset
        .and_then(|offset| report.get(offset))
        .copied()
        .unwrap_or(0)
}

/// Exact match against `expected_value` if set, otherwise `byte & mask != 0`
pub fn get_button(report: &[u8], rule: &ButtonRule) -> bool {
    let byte = read_byte_safe(report, rule.byte_offset);
    match rule.expected_value {
        Some(expected) => byte == expected,
        None => byte & rule.mask != 0,
    }
}

/// Masks a hat byte and maps the resulting 0..=7 value onto directions
///
/// The masked value is shifted down so a hat in the high nibble decodes like
/// one in the low nibble.
pub fn decode_hat(byte: u8, mask: u8) -> DpadState {
    if mask == 0 {
        return DpadState::default();
    }
    hat_directions((byte & mask) >> mask.trailing_zeros())
}

/// 0 = N, 1 = NE, 2 = E ... 7 = NW, anything else released
pub fn hat_directions(value: u8) -> DpadState {
    if value > HAT_MAX_DIRECTION {
        return DpadState::default();
    }
    DpadState {
        up: matches!(value, 0 | 1 | 7),
        down: matches!(value, 3..=5),
        left: matches!(value, 5..=7),
        right: matches!(value, 1..=3),
    }
}

/// Hat or discrete dpad; released when the profile has none
pub fn decode_dpad(report: &[u8], rule: Option<&DpadRule>) -> DpadState {
    match rule {
        None => DpadState::default(),
        // A hat value of 0 means up, so a missing byte must not read as 0
        Some(DpadRule::Hat { byte_offset, mask }) => byte_offset
            .and_then(|offset| report.get(offset))
            .map(|byte| decode_hat(*byte, *mask))
            .unwrap_or_default(),
        Some(DpadRule::Discrete(rules)) => DpadState {
            up: get_button(report, &rules.up),
            down: get_button(report, &rules.down),
            left: get_button(report, &rules.left),
            right: get_button(report, &rules.right),
        },
    }
}

/// Unsigned-equivalent axis sample, `None` when the axis has no readable byte
pub fn read_axis(report: &[u8], rule: Option<&AxisRule>) -> Option<u8> {
    let rule = rule?;
    let raw = *report.get(rule.byte_offset?)?;
    Some(if rule.signed {
        signed_to_unsigned(raw)
    } else {
        raw
    })
}

/// Decodes one report, `None` for reports shorter than [`MIN_REPORT_LEN`]
pub fn decode_report(
    report: &[u8],
    profile: &MappingProfile,
    settings: &SettingsSnapshot,
) -> Option<NormalizedInputState> {
    if report.len() < MIN_REPORT_LEN {
        trace!("Dropping {}-byte report", report.len());
        return None;
    }

    let stick = |name: AxisName, deadzone: f64, settings_invert: bool| -> i16 {
        let rule = profile.axis(name);
        match read_axis(report, rule) {
            Some(raw) => {
                let invert = rule.map(|r| r.invert).unwrap_or(false) ^ settings_invert;
                scale_stick(raw, deadzone, invert)
            }
            None => 0,
        }
    };

    let trigger = |name: AxisName| -> u8 {
        let rule = profile.axis(name);
        read_axis(report, rule)
            .map(|raw| scale_trigger(raw, rule.map(|r| r.invert).unwrap_or(false)))
            .unwrap_or(0)
    };

    let buttons = ButtonName::ALL
        .into_iter()
        .filter(|name| {
            profile
                .button(*name)
                .map(|rule| get_button(report, rule))
                .unwrap_or(false)
        })
        .collect();

    Some(NormalizedInputState {
        left_stick: StickState {
            x: stick(
                AxisName::LeftStickX,
                settings.left_deadzone,
                settings.left_invert.x,
            ),
            y: stick(
                AxisName::LeftStickY,
                settings.left_deadzone,
                settings.left_invert.y,
            ),
        },
        right_stick: StickState {
            x: stick(
                AxisName::RightStickX,
                settings.right_deadzone,
                settings.right_invert.x,
            ),
            y: stick(
                AxisName::RightStickY,
                settings.right_deadzone,
                settings.right_invert.y,
            ),
        },
        left_trigger: trigger(AxisName::LeftTrigger),
        right_trigger: trigger(AxisName::RightTrigger),
        buttons,
        dpad: decode_dpad(report, profile.dpad.as_ref()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{builtin_generic, MappingProfile, HAT_MASK};
    use crate::settings::StickInversion;
    use proptest::prelude::*;

    fn scenario_profile() -> MappingProfile {
        MappingProfile::from_json(
            "scenario",
            r#"{"axes":{"left_stick_x":{"byte":1},"left_stick_y":{"byte":2,"invert":true}},
                "buttons":{"a":{"byte":5,"mask":"0x20"}}}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_read_byte_safe_bounds() {
        let report = [1, 2, 3];
        assert_eq!(read_byte_safe(&report, Some(2)), 3);
        assert_eq!(read_byte_safe(&report, Some(3)), 0);
        assert_eq!(read_byte_safe(&report, None), 0);
    }

    #[test]
    fn test_get_button_mask_and_exact_value() {
        let report = [0, 0, 0, 0, 0, 0x24, 0x0A, 0, 0, 0];
        assert!(get_button(&report, &ButtonRule::masked(5, 0x20)));
        assert!(!get_button(&report, &ButtonRule::masked(5, 0x40)));
        assert!(get_button(&report, &ButtonRule::exact(6, 0x0A)));
        assert!(!get_button(&report, &ButtonRule::exact(6, 0x0B)));
        // A full-byte mask on an exact rule must not leak through
        assert!(!get_button(&report, &ButtonRule::exact(5, 0x20)));
        assert!(!get_button(&report, &ButtonRule::masked(42, 0xFF)));
    }

    #[test]
    fn test_hat_table() {
        let expected = [
            (0, (true, false, false, false)),
            (1, (true, false, false, true)),
            (2, (false, false, false, true)),
            (3, (false, true, false, true)),
            (4, (false, true, false, false)),
            (5, (false, true, true, false)),
            (6, (false, false, true, false)),
            (7, (true, false, true, false)),
        ];
        for (value, (up, down, left, right)) in expected {
            assert_eq!(
                decode_hat(value, HAT_MASK),
                DpadState {
                    up,
                    down,
                    left,
                    right
                },
                "hat value {}",
                value
            );
        }
        assert!(decode_hat(8, HAT_MASK).is_released());
        assert!(decode_hat(0x0F, HAT_MASK).is_released());
    }

    #[test]
    fn test_hat_in_high_nibble() {
        assert_eq!(decode_hat(0x2C, 0xF0), hat_directions(2));
        assert!(decode_hat(0x8C, 0xF0).is_released());
    }

    #[test]
    fn test_short_report_dropped() {
        let profile = builtin_generic();
        let settings = SettingsSnapshot::default();
        for len in 0..MIN_REPORT_LEN {
            assert!(decode_report(&vec![0xFF; len], &profile, &settings).is_none());
        }
        assert!(decode_report(&[0x80; MIN_REPORT_LEN], &profile, &settings).is_some());
    }

    #[test]
    fn test_scenario_report() {
        let settings = SettingsSnapshot {
            left_deadzone: 0.1,
            right_deadzone: 0.1,
            ..SettingsSnapshot::default()
        };
        let report = [0, 178, 78, 0, 0, 0x20, 0, 0, 0, 8];

        let state = decode_report(&report, &scenario_profile(), &settings).unwrap();
        assert_eq!(state.left_stick.x, 12900);
        assert_eq!(state.left_stick.y, 12900);
        assert!(state.is_pressed(ButtonName::A));
        assert_eq!(state.buttons.len(), 1);
        assert!(state.dpad.is_released());
        // Unmapped axes stay neutral even though their bytes are zero
        assert_eq!(state.right_stick, StickState::default());
        assert_eq!(state.left_trigger, 0);
    }

    #[test]
    fn test_settings_inversion_combines_with_profile() {
        let settings = SettingsSnapshot {
            left_deadzone: 0.1,
            left_invert: StickInversion { x: true, y: true },
            ..SettingsSnapshot::default()
        };
        let report = [0, 178, 78, 0, 0, 0, 0, 0, 0, 0];

        let state = decode_report(&report, &scenario_profile(), &settings).unwrap();
        assert_eq!(state.left_stick.x, -12900);
        assert_eq!(state.left_stick.y, -12900);
    }

    #[test]
    fn test_generic_layout() {
        let report = [0x01, 0x80, 0x80, 0xFF, 0x00, 0x90, 0x02, 0x40, 0xFF, 0x05];
        let state =
            decode_report(&report, &builtin_generic(), &SettingsSnapshot::default()).unwrap();

        assert_eq!(state.left_stick, StickState::default());
        assert_eq!(state.right_stick.x, 32767);
        assert_eq!(state.right_stick.y, -32768);
        assert!(state.is_pressed(ButtonName::X));
        assert!(state.is_pressed(ButtonName::Y));
        assert!(state.is_pressed(ButtonName::RightShoulder));
        assert!(!state.is_pressed(ButtonName::A));
        assert_eq!(state.left_trigger, 0x40);
        assert_eq!(state.right_trigger, 0xFF);
        assert_eq!(
            state.dpad,
            DpadState {
                up: true,
                down: false,
                left: true,
                right: false
            }
        );
    }

    #[test]
    fn test_signed_axis_and_inverted_trigger() {
        let profile = MappingProfile::from_json(
            "signed",
            r#"{"axes":{"rx":{"byte":3,"signed":true},"lt":{"byte":7,"invert":true}},
                "dpad_hat":{"byte":9}}"#,
        )
        .unwrap();
        let settings = SettingsSnapshot {
            right_deadzone: 0.0,
            ..SettingsSnapshot::default()
        };

        let report = [0, 0, 0, 0x00, 0, 0, 0, 0x10, 0, 0x06];
        let state = decode_report(&report, &profile, &settings).unwrap();
        assert_eq!(state.right_stick.x, 0);
        assert_eq!(state.left_trigger, 0xEF);
        assert_eq!(state.dpad, hat_directions(6));

        let report = [0, 0, 0, 0x81, 0, 0, 0, 0, 0, 0x08];
        let state = decode_report(&report, &profile, &settings).unwrap();
        assert_eq!(state.right_stick.x, -32767);
        assert!(state.dpad.is_released());
    }

    #[test]
    fn test_offsets_past_report_end_degrade() {
        let profile = MappingProfile::from_json(
            "wide",
            r#"{"axes":{"lx":{"byte":40}},"buttons":{"a":{"byte":40,"mask":1}},
                "dpad_hat":{"byte":40}}"#,
        )
        .unwrap();
        let state = decode_report(&[0xFF; 12], &profile, &SettingsSnapshot::default()).unwrap();
        assert_eq!(state, NormalizedInputState::default());
    }

    proptest! {
        #[test]
        fn prop_hat_nibble_matches_table(value in 0u8..=15, upper in 0u8..=15) {
            let byte = (upper << 4) | value;
            prop_assert_eq!(decode_hat(byte, HAT_MASK), hat_directions(value));
            if value > 7 {
                prop_assert!(decode_hat(byte, HAT_MASK).is_released());
            }
        }

        #[test]
        fn prop_short_reports_never_decode(report in proptest::collection::vec(any::<u8>(), 0..MIN_REPORT_LEN)) {
            prop_assert!(decode_report(&report, &builtin_generic(), &SettingsSnapshot::default()).is_none());
        }
    }
}
