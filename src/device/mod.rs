//! Physical device identity and access
//!
//! The HID transport itself lives outside this crate. Everything here talks to it
//! through two traits:
//!
//! ```text
//! DeviceAccess ──open(path)──► DeviceConnection ──read()──► raw report bytes
//!      │
//!      └──enumerate()──► DeviceInfo ──► DeviceHandle (vendor:product:path)
//! ```
//!
//! [`replay`] provides a `DeviceAccess` that plays back recorded report streams.

pub mod replay;

use std::fmt;
use std::time::Duration;

/// Errors reported by a device access backend
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("Failed to enumerate devices: {0}")]
    Enumerate(String),

    #[error("Failed to open device {path}: {reason}")]
    OpenFailed { path: String, reason: String },

    #[error("Failed to read from device {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Device {path} was closed")]
    Closed { path: String },
}

/// One entry of a device enumeration, as reported by the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub vendor_id: u16,
    pub product_id: u16,
    pub path: String,
    pub product_name: Option<String>,
}

/// Identifies one physical device selected for mapping
///
/// Immutable once created. Two handles refer to the same device iff their
/// [`key`](DeviceHandle::key) matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceHandle {
    vendor_id: u16,
    product_id: u16,
    path: String,
    display_name: String,
}

impl DeviceHandle {
    pub fn new(
        vendor_id: u16,
        product_id: u16,
        path: impl Into<String>,
        display_name: Option<String>,
    ) -> Self {
        let display_name = display_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| format!("Controller-{:04X}:{:04X}", vendor_id, product_id));

        Self {
            vendor_id,
            product_id,
            path: path.into(),
            display_name,
        }
    }

    pub fn vendor_id(&self) -> u16 {
        self.vendor_id
    }

    pub fn product_id(&self) -> u16 {
        self.product_id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Stable unique key `vendor:product:path`
    pub fn key(&self) -> String {
        format!("{:04x}:{:04x}:{}", self.vendor_id, self.product_id, self.path)
    }
}

impl From<DeviceInfo> for DeviceHandle {
    fn from(info: DeviceInfo) -> Self {
        Self::new(info.vendor_id, info.product_id, info.path, info.product_name)
    }
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({:04X}:{:04X})",
            self.display_name, self.vendor_id, self.product_id
        )
    }
}

/// Backend able to list and open physical devices
pub trait DeviceAccess: Send + Sync + 'static {
    fn enumerate(&self) -> Result<Vec<DeviceInfo>, DeviceError>;

    fn open(&self, path: &str) -> Result<Box<dyn DeviceConnection>, DeviceError>;
}

/// An open device handle owned by exactly one worker
pub trait DeviceConnection: Send {
    /// Blocks for at most `timeout` waiting for one input report.
    ///
    /// An empty buffer means no report arrived in time.
    fn read(&mut self, max_bytes: usize, timeout: Duration) -> Result<Vec<u8>, DeviceError>;

    /// Releases the OS handle. Called exactly once per successful `open`.
    fn close(&mut self);
}
