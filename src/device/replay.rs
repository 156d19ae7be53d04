//! Replay-backed device access
//!
//! Plays back recorded input reports as if they came from a physical device.
//! Capture files hold one report per line as whitespace separated hex bytes;
//! blank lines and lines starting with `#` are skipped.

use super::{DeviceAccess, DeviceConnection, DeviceError, DeviceInfo};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

const CAPTURE_EXTENSION: &str = "hex";

/// What a replayed device does once its recorded reports run out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamEnd {
    /// Keep the device open and time out on every further read
    #[default]
    Idle,
    /// Report the device as closed, like an unplugged controller
    Disconnect,
}

#[derive(Debug, Clone)]
struct ReplayStream {
    info: DeviceInfo,
    reports: Vec<Vec<u8>>,
    end: StreamEnd,
}

#[derive(Debug, Clone, Default)]
pub struct ReplayDeviceAccess {
    streams: HashMap<String, ReplayStream>,
}

impl ReplayDeviceAccess {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a device that replays `reports` in order
    pub fn with_stream(mut self, info: DeviceInfo, reports: Vec<Vec<u8>>, end: StreamEnd) -> Self {
        self.streams.insert(
            info.path.clone(),
            ReplayStream { info, reports, end },
        );
        self
    }

    /// Loads every `*.hex` capture in `dir`; the file path becomes the device path
    pub fn from_capture_dir(dir: &Path, end: StreamEnd) -> Result<Self, DeviceError> {
        let entries = std::fs::read_dir(dir).map_err(|e| {
            DeviceError::Enumerate(format!("Cannot read capture dir {}: {}", dir.display(), e))
        })?;

        let mut access = Self::new();
        for entry in entries {
            let path = entry
                .map_err(|e| DeviceError::Enumerate(e.to_string()))?
                .path();
            if path.extension().and_then(|e| e.to_str()) != Some(CAPTURE_EXTENSION) {
                continue;
            }

            let text = std::fs::read_to_string(&path).map_err(|e| {
                DeviceError::Enumerate(format!("Cannot read {}: {}", path.display(), e))
            })?;
            let reports = parse_capture(&text).map_err(|reason| {
                DeviceError::Enumerate(format!("{}: {}", path.display(), reason))
            })?;

            let name = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned());
            info!(
                "Loaded capture {} with {} reports",
                path.display(),
                reports.len()
            );
            access = access.with_stream(
                DeviceInfo {
                    vendor_id: 0,
                    product_id: 0,
                    path: path.to_string_lossy().into_owned(),
                    product_name: name,
                },
                reports,
                end,
            );
        }

        Ok(access)
    }
}

/// Parses capture text into reports
pub fn parse_capture(text: &str) -> Result<Vec<Vec<u8>>, String> {
    let mut reports = Vec::new();
    for (number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let report = line
            .split_whitespace()
            .map(|token| {
                let digits = token.trim_start_matches("0x").trim_start_matches("0X");
                u8::from_str_radix(digits, 16)
                    .map_err(|e| format!("line {}: bad byte '{}': {}", number + 1, token, e))
            })
            .collect::<Result<Vec<u8>, String>>()?;
        reports.push(report);
    }
    Ok(reports)
}

impl DeviceAccess for ReplayDeviceAccess {
    fn enumerate(&self) -> Result<Vec<DeviceInfo>, DeviceError> {
        let mut devices: Vec<DeviceInfo> =
            self.streams.values().map(|s| s.info.clone()).collect();
        devices.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(devices)
    }

    fn open(&self, path: &str) -> Result<Box<dyn DeviceConnection>, DeviceError> {
        let stream = self
            .streams
            .get(path)
            .ok_or_else(|| DeviceError::OpenFailed {
                path: path.to_string(),
                reason: "no such device".to_string(),
            })?;

        debug!("Opening replay device {}", path);
        Ok(Box::new(ReplayConnection {
            path: path.to_string(),
            pending: stream.reports.iter().cloned().collect(),
            end: stream.end,
            closed: false,
        }))
    }
}

struct ReplayConnection {
    path: String,
    pending: VecDeque<Vec<u8>>,
    end: StreamEnd,
    closed: bool,
}

impl DeviceConnection for ReplayConnection {
    fn read(&mut self, max_bytes: usize, timeout: Duration) -> Result<Vec<u8>, DeviceError> {
        if self.closed {
            return Err(DeviceError::Closed {
                path: self.path.clone(),
            });
        }

        match self.pending.pop_front() {
            Some(mut report) => {
                report.truncate(max_bytes);
                Ok(report)
            }
            None => match self.end {
                StreamEnd::Idle => {
                    std::thread::sleep(timeout);
                    Ok(Vec::new())
                }
                StreamEnd::Disconnect => Err(DeviceError::Closed {
                    path: self.path.clone(),
                }),
            },
        }
    }

    fn close(&mut self) {
        if self.closed {
            warn!("Replay device {} closed twice", self.path);
        }
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(path: &str) -> DeviceInfo {
        DeviceInfo {
            vendor_id: 0x0079,
            product_id: 0x0006,
            path: path.to_string(),
            product_name: None,
        }
    }

    #[test]
    fn test_parse_capture_skips_comments() {
        let text = "# recorded 2024\n00 80 7f 80 80 20 00 00 00 08\n\n0x01 0xff\n";
        let reports = parse_capture(text).unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0][1], 0x80);
        assert_eq!(reports[1], vec![0x01, 0xff]);
    }

    #[test]
    fn test_parse_capture_rejects_garbage() {
        let err = parse_capture("00 zz").unwrap_err();
        assert!(err.contains("line 1"));
    }

    #[test]
    fn test_replay_then_disconnect() {
        let access = ReplayDeviceAccess::new().with_stream(
            info("dev-a"),
            vec![vec![1, 2, 3]],
            StreamEnd::Disconnect,
        );
        let mut conn = access.open("dev-a").unwrap();
        assert_eq!(conn.read(2, Duration::ZERO).unwrap(), vec![1, 2]);
        assert!(matches!(
            conn.read(64, Duration::ZERO),
            Err(DeviceError::Closed { .. })
        ));
        conn.close();
    }

    #[test]
    fn test_open_unknown_path_fails() {
        let access = ReplayDeviceAccess::new();
        assert!(matches!(
            access.open("missing"),
            Err(DeviceError::OpenFailed { .. })
        ));
    }
}
