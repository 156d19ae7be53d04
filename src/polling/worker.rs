//! Device worker state machine
//!
//! ```text
//! Idle ──open──► Running ──run──► Stopping ──shutdown──► Stopped
//!   │                                                       ▲
//!   └──────────────── open failed ──────────────────────────┘
//! ```
//!
//! `run` exits when the cancellation token fires (checked between reads) or
//! when the device reports an error. The open device lives in an
//! [`OpenDevice`] guard, so it is closed exactly once on every exit path.

use super::supervisor::WorkerLink;
use super::{PollingOptions, ReportHandler, WorkerError};
use crate::device::{DeviceAccess, DeviceConnection, DeviceHandle};
use chrono::{DateTime, Local};
use statum::{machine, state};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[state]
#[derive(Debug, Clone)]
pub enum WorkerState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

/// Closes the wrapped connection when dropped
struct OpenDevice {
    path: String,
    connection: Option<Box<dyn DeviceConnection>>,
}

impl OpenDevice {
    fn connection(&mut self) -> Option<&mut Box<dyn DeviceConnection>> {
        self.connection.as_mut()
    }

    fn close(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.close();
            debug!("Closed {}", self.path);
        }
    }
}

impl Drop for OpenDevice {
    fn drop(&mut self) {
        self.close();
    }
}

/// Throughput over a fixed wall-clock window
struct Throughput {
    window: chrono::Duration,
    started: DateTime<Local>,
    count: u64,
}

impl Throughput {
    fn new(window: chrono::Duration) -> Self {
        Self {
            window,
            started: Local::now(),
            count: 0,
        }
    }

    fn record(&mut self, device: &DeviceHandle) {
        self.count += 1;
        let now = Local::now();
        if now - self.started > self.window {
            let seconds = self.window.num_seconds().max(1);
            info!(
                "{} stats: handled {} reports in last {} seconds (avg {:.2}/sec)",
                device,
                self.count,
                seconds,
                self.count as f64 / seconds as f64
            );
            self.count = 0;
            self.started = now;
        }
    }
}

#[machine]
pub struct DeviceWorker<S: WorkerState> {
    worker_id: u64,
    device: DeviceHandle,
    access: Arc<dyn DeviceAccess>,
    handler: Box<dyn ReportHandler>,
    cancel: CancellationToken,
    options: PollingOptions,
    open_device: Option<OpenDevice>,
    reports: Arc<AtomicU64>,
}

impl<S: WorkerState> DeviceWorker<S> {
    pub fn worker_id(&self) -> u64 {
        self.worker_id
    }

    pub fn device(&self) -> &DeviceHandle {
        &self.device
    }

    /// Reports handed to the handler so far
    pub fn reports(&self) -> u64 {
        self.reports.load(Ordering::Relaxed)
    }
}

impl DeviceWorker<Idle> {
    pub fn create(
        worker_id: u64,
        device: DeviceHandle,
        access: Arc<dyn DeviceAccess>,
        handler: Box<dyn ReportHandler>,
        cancel: CancellationToken,
        options: PollingOptions,
        reports: Arc<AtomicU64>,
    ) -> Self {
        debug!("Creating worker {} for {}", worker_id, device);
        Self::new(
            worker_id,
            device,
            access,
            handler,
            cancel,
            options,
            None, // open_device
            reports,
        )
    }

    /// Opens the device; on failure reports the error and skips straight to `Stopped`
    pub fn open(mut self, link: &WorkerLink) -> Result<DeviceWorker<Running>, DeviceWorker<Stopped>> {
        match self.access.open(self.device.path()) {
            Ok(connection) => {
                info!("Opened {} (worker {})", self.device, self.worker_id);
                self.open_device = Some(OpenDevice {
                    path: self.device.path().to_string(),
                    connection: Some(connection),
                });
                link.started();
                Ok(self.transition())
            }
            Err(source) => {
                link.error(WorkerError::DeviceOpenFailed {
                    path: self.device.path().to_string(),
                    source,
                });
                Err(self.transition())
            }
        }
    }
}

impl DeviceWorker<Running> {
    /// Read loop; returns once stopped or after the first read error
    pub fn run(mut self, link: &WorkerLink) -> DeviceWorker<Stopping> {
        info!("Polling {} on worker {}", self.device, self.worker_id);
        self.handler.on_start(&self.device);

        let mut throughput = Throughput::new(self.options.stats_interval);

        while !self.cancel.is_cancelled() {
            let Some(connection) = self.open_device.as_mut().and_then(OpenDevice::connection)
            else {
                break;
            };

            match connection.read(self.options.max_report_size, self.options.read_timeout) {
                Ok(report) if report.is_empty() => {}
                Ok(report) => {
                    self.handler.handle_report(&report);
                    self.reports.fetch_add(1, Ordering::Relaxed);
                    throughput.record(&self.device);

                    let interval = self.options.settings.snapshot().polling_interval();
                    if !interval.is_zero() {
                        std::thread::sleep(interval);
                    }
                }
                Err(source) => {
                    link.error(WorkerError::ReadError {
                        path: self.device.path().to_string(),
                        source,
                    });
                    break;
                }
            }
        }

        if self.cancel.is_cancelled() {
            debug!("Worker {} observed stop request", self.worker_id);
        }
        self.transition()
    }
}

impl DeviceWorker<Stopping> {
    /// Closes the device and tells the handler
    pub fn shutdown(mut self) -> DeviceWorker<Stopped> {
        if let Some(open_device) = self.open_device.as_mut() {
            open_device.close();
        }
        self.handler.on_stop(&self.device);
        info!(
            "Worker {} for {} stopped after {} reports",
            self.worker_id,
            self.device,
            self.reports()
        );
        self.transition()
    }
}
