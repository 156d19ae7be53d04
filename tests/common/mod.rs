#![allow(dead_code)]

use hidmapper::device::{DeviceAccess, DeviceConnection, DeviceError, DeviceHandle, DeviceInfo};
use hidmapper::polling::{PollingOptions, WorkerEvent};
use hidmapper::settings::SettingsSnapshot;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

/// How a fake device behaves once opened
#[derive(Clone)]
pub enum FakeDevice {
    /// Returns `report` on every read after a short blocking delay
    Endless { report: Vec<u8>, delay: Duration },
    /// Returns the reports in order, then fails with `Closed`
    Finite { reports: Vec<Vec<u8>> },
    /// `open` fails
    Unavailable,
}

#[derive(Default)]
pub struct FakeAccess {
    devices: HashMap<String, FakeDevice>,
    opens: Arc<Mutex<HashMap<String, usize>>>,
    closes: Arc<Mutex<HashMap<String, usize>>>,
}

impl FakeAccess {
    pub fn with(mut self, path: &str, device: FakeDevice) -> Self {
        self.devices.insert(path.to_string(), device);
        self
    }

    pub fn opens(&self, path: &str) -> usize {
        self.opens.lock().get(path).copied().unwrap_or(0)
    }

    pub fn closes(&self, path: &str) -> usize {
        self.closes.lock().get(path).copied().unwrap_or(0)
    }
}

impl DeviceAccess for FakeAccess {
    fn enumerate(&self) -> Result<Vec<DeviceInfo>, DeviceError> {
        Ok(self
            .devices
            .keys()
            .map(|path| DeviceInfo {
                vendor_id: 0x1234,
                product_id: 0x5678,
                path: path.clone(),
                product_name: None,
            })
            .collect())
    }

    fn open(&self, path: &str) -> Result<Box<dyn DeviceConnection>, DeviceError> {
        let device = match self.devices.get(path) {
            Some(FakeDevice::Unavailable) | None => {
                return Err(DeviceError::OpenFailed {
                    path: path.to_string(),
                    reason: "access denied".to_string(),
                })
            }
            Some(device) => device.clone(),
        };

        *self.opens.lock().entry(path.to_string()).or_default() += 1;
        Ok(Box::new(FakeConnection {
            path: path.to_string(),
            device,
            position: 0,
            closes: self.closes.clone(),
        }))
    }
}

struct FakeConnection {
    path: String,
    device: FakeDevice,
    position: usize,
    closes: Arc<Mutex<HashMap<String, usize>>>,
}

impl DeviceConnection for FakeConnection {
    fn read(&mut self, _max_bytes: usize, _timeout: Duration) -> Result<Vec<u8>, DeviceError> {
        match &self.device {
            FakeDevice::Endless { report, delay } => {
                std::thread::sleep(*delay);
                Ok(report.clone())
            }
            FakeDevice::Finite { reports } => {
                let report = reports.get(self.position).cloned();
                self.position += 1;
                report.ok_or_else(|| DeviceError::Closed {
                    path: self.path.clone(),
                })
            }
            FakeDevice::Unavailable => unreachable!("unavailable devices never open"),
        }
    }

    fn close(&mut self) {
        *self.closes.lock().entry(self.path.clone()).or_default() += 1;
    }
}

pub fn handle(path: &str) -> DeviceHandle {
    DeviceHandle::new(0x1234, 0x5678, path, None)
}

/// Fast polling: no interval sleep, short read timeout
pub fn fast_options() -> PollingOptions {
    let mut options = PollingOptions::new(Arc::new(SettingsSnapshot {
        polling_interval_ms: 0.0,
        ..SettingsSnapshot::default()
    }));
    options.read_timeout = Duration::from_millis(10);
    options
}

pub fn endless(delay_ms: u64) -> FakeDevice {
    FakeDevice::Endless {
        report: vec![0, 0x80, 0x80, 0x80, 0x80, 0, 0, 0, 0, 0],
        delay: Duration::from_millis(delay_ms),
    }
}

pub async fn next_event(events: &mut UnboundedReceiver<WorkerEvent>) -> WorkerEvent {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for a worker event")
        .expect("event channel closed")
}

/// Skips events until a `Finished` for `path` arrives
pub async fn wait_finished(events: &mut UnboundedReceiver<WorkerEvent>, path: &str) -> WorkerEvent {
    loop {
        let event = next_event(events).await;
        if matches!(&event, WorkerEvent::Finished { device, .. } if device.path() == path) {
            return event;
        }
    }
}
