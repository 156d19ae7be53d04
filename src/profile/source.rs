use super::{
    AxisName, AxisRule, ButtonName, ButtonRule, DiscreteDpad, DpadRule, MappingProfile,
    ProfileError,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Family name of the built-in profile
pub const GENERIC_FAMILY: &str = "generic";

const PROFILE_EXTENSION: &str = "json";

/// Resolves a controller family name to its profile
pub trait ProfileSource: Send + Sync {
    fn resolve(&self, family: &str) -> Result<MappingProfile, ProfileError>;
}

/// Profiles stored as `<root>/<family>.json`
#[derive(Debug, Clone)]
pub struct ProfileDirectory {
    root: PathBuf,
}

impl ProfileDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Families with a profile file, sorted; the built-in family is always listed
    pub fn families(&self) -> Result<Vec<String>, ProfileError> {
        let mut families = vec![GENERIC_FAMILY.to_string()];

        if self.root.is_dir() {
            let entries = std::fs::read_dir(&self.root).map_err(|e| self.io_error(&self.root, e))?;
            for entry in entries {
                let path = entry.map_err(|e| self.io_error(&self.root, e))?.path();
                if path.extension().and_then(|e| e.to_str()) != Some(PROFILE_EXTENSION) {
                    continue;
                }
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    if stem != GENERIC_FAMILY {
                        families.push(stem.to_string());
                    }
                }
            }
        }

        families.sort();
        Ok(families)
    }

    fn io_error(&self, path: &Path, source: std::io::Error) -> ProfileError {
        ProfileError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

impl ProfileSource for ProfileDirectory {
    fn resolve(&self, family: &str) -> Result<MappingProfile, ProfileError> {
        let family = family.trim();
        // Family names map straight onto file names
        if family.is_empty() || family.contains(['/', '\\']) || family.starts_with('.') {
            return Err(ProfileError::NotFound {
                family: family.to_string(),
            });
        }

        let path = self.root.join(format!("{}.{}", family, PROFILE_EXTENSION));
        if !path.is_file() {
            if family == GENERIC_FAMILY {
                debug!("No generic profile in {}, using built-in", self.root.display());
                return Ok(builtin_generic());
            }
            return Err(ProfileError::NotFound {
                family: family.to_string(),
            });
        }

        let json = std::fs::read_to_string(&path).map_err(|e| self.io_error(&path, e))?;
        let profile = MappingProfile::from_json(family, &json)?;
        info!("Loaded profile '{}' from {}", family, path.display());
        Ok(profile)
    }
}

/// Profile for the default wire layout
///
/// Sticks on bytes 1-4, face and shoulder bits on 5-6, triggers on 7-8 and
/// discrete dpad bits on byte 9.
pub fn builtin_generic() -> MappingProfile {
    let axes = [
        (AxisName::LeftStickX, 1),
        (AxisName::LeftStickY, 2),
        (AxisName::RightStickX, 3),
        (AxisName::RightStickY, 4),
        (AxisName::LeftTrigger, 7),
        (AxisName::RightTrigger, 8),
    ]
    .into_iter()
    .map(|(name, byte)| {
        (
            name,
            AxisRule {
                byte_offset: Some(byte),
                ..AxisRule::default()
            },
        )
    })
    .collect::<HashMap<_, _>>();

    let buttons = [
        (ButtonName::A, ButtonRule::masked(5, 0x20)),
        (ButtonName::B, ButtonRule::masked(5, 0x40)),
        (ButtonName::X, ButtonRule::masked(5, 0x10)),
        (ButtonName::Y, ButtonRule::masked(5, 0x80)),
        (ButtonName::LeftShoulder, ButtonRule::masked(6, 0x01)),
        (ButtonName::RightShoulder, ButtonRule::masked(6, 0x02)),
    ]
    .into_iter()
    .collect::<HashMap<_, _>>();

    MappingProfile {
        family: GENERIC_FAMILY.to_string(),
        axes,
        buttons,
        dpad: Some(DpadRule::Discrete(DiscreteDpad {
            up: ButtonRule::masked(9, 0x01),
            down: ButtonRule::masked(9, 0x02),
            left: ButtonRule::masked(9, 0x04),
            right: ButtonRule::masked(9, 0x08),
        })),
    }
}
