//! Per-device polling
//!
//! One blocking read loop per physical device, each on its own OS thread. The
//! [`PollingSupervisor`] is the only place that creates or removes workers and
//! reports their lifecycle on an event channel.
//!
//! ```text
//!                    start_polling(handle, handler)
//! PollingSupervisor ─────────────────────────────────► hid-poll-<id> thread
//!   registry: path → WorkerRecord                        │
//!        ▲                                               │ DeviceWorker
//!        │ WorkerLink drop (own id only)                 │ Idle ─► Running ─► Stopping ─► Stopped
//!        └───────────────────────────────────────────────┤           │
//!                                                        │      read ─► ReportHandler::handle_report
//!                WorkerEvent::{Started, Error, Finished} ◄┘
//! ```

pub mod supervisor;
pub mod worker;

use crate::device::{DeviceError, DeviceHandle};
use crate::settings::{SettingsProvider, SettingsSnapshot};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub use supervisor::{PollingSupervisor, StartOutcome, StopOutcome};
pub use worker::DeviceWorker;

/// Largest report a worker asks the device for
pub const MAX_REPORT_SIZE: usize = 64;

/// Upper bound on a single blocking read, so stop requests are seen promptly
pub const READ_TIMEOUT: Duration = Duration::from_millis(50);

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Could not open {path}: {source}")]
    DeviceOpenFailed {
        path: String,
        #[source]
        source: DeviceError,
    },

    #[error("Read from {path} failed: {source}")]
    ReadError {
        path: String,
        #[source]
        source: DeviceError,
    },
}

#[derive(Error, Debug)]
pub enum PollingError {
    #[error("Failed to spawn polling thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Lifecycle notifications from running workers
#[derive(Debug)]
pub enum WorkerEvent {
    Started {
        worker_id: u64,
        device: DeviceHandle,
    },
    Error {
        worker_id: u64,
        device: DeviceHandle,
        error: WorkerError,
    },
    /// Sent after the device is closed and the registry slot is free
    Finished {
        worker_id: u64,
        device: DeviceHandle,
        reports: u64,
    },
}

impl WorkerEvent {
    pub fn device(&self) -> &DeviceHandle {
        match self {
            Self::Started { device, .. }
            | Self::Error { device, .. }
            | Self::Finished { device, .. } => device,
        }
    }

    pub fn worker_id(&self) -> u64 {
        match self {
            Self::Started { worker_id, .. }
            | Self::Error { worker_id, .. }
            | Self::Finished { worker_id, .. } => *worker_id,
        }
    }
}

/// Consumer of the raw reports of one device
///
/// Runs on the worker thread, one call at a time.
pub trait ReportHandler: Send + 'static {
    fn handle_report(&mut self, report: &[u8]);

    fn on_start(&mut self, _device: &DeviceHandle) {}

    fn on_stop(&mut self, _device: &DeviceHandle) {}
}

impl<F> ReportHandler for F
where
    F: FnMut(&[u8]) + Send + 'static,
{
    fn handle_report(&mut self, report: &[u8]) {
        self(report)
    }
}

#[derive(Clone)]
pub struct PollingOptions {
    /// Source of the polling interval, read after every report
    pub settings: Arc<dyn SettingsProvider>,
    pub read_timeout: Duration,
    pub max_report_size: usize,
    /// How often each worker logs its throughput
    pub stats_interval: chrono::Duration,
}

impl PollingOptions {
    pub fn new(settings: Arc<dyn SettingsProvider>) -> Self {
        Self {
            settings,
            read_timeout: READ_TIMEOUT,
            max_report_size: MAX_REPORT_SIZE,
            stats_interval: chrono::Duration::seconds(10),
        }
    }
}

impl Default for PollingOptions {
    fn default() -> Self {
        Self::new(Arc::new(SettingsSnapshot::default()))
    }
}

impl std::fmt::Debug for PollingOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingOptions")
            .field("settings", &self.settings.snapshot())
            .field("read_timeout", &self.read_timeout)
            .field("max_report_size", &self.max_report_size)
            .field("stats_interval", &self.stats_interval)
            .finish()
    }
}
