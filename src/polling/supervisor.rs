//! Registry of running device workers
//!
//! Start and stop calls against the same path are serialized by the registry
//! lock. A worker owns its slot through a [`WorkerLink`]; when the worker
//! thread ends, the link gives the slot back, but only if the slot still
//! carries that worker's id.

use super::worker::DeviceWorker;
use super::{PollingError, PollingOptions, ReportHandler, WorkerError, WorkerEvent};
use crate::device::{DeviceAccess, DeviceHandle};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Started(DeviceHandle),
    /// A worker already polls this path; nothing was spawned
    AlreadyRunning(DeviceHandle),
}

impl StartOutcome {
    /// Handle of the device being polled, new or existing
    pub fn handle(&self) -> &DeviceHandle {
        match self {
            Self::Started(handle) | Self::AlreadyRunning(handle) => handle,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    /// The worker was asked to stop and will finish on its next loop boundary
    Stopping(DeviceHandle),
    NotFound,
}

struct WorkerRecord {
    handle: DeviceHandle,
    worker_id: u64,
    cancel: CancellationToken,
    join: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct Registry {
    records: HashMap<String, WorkerRecord>,
    /// Threads whose records are gone but which may not be joined yet
    retired: Vec<JoinHandle<()>>,
    /// Last failure per path, kept after the worker is gone
    last_errors: HashMap<String, String>,
    next_worker_id: u64,
}

impl Registry {
    fn retire(&mut self, record: WorkerRecord) {
        if let Some(join) = record.join {
            self.retired.push(join);
        }
    }

    fn prune_retired(&mut self) {
        self.retired.retain(|join| !join.is_finished());
    }
}

/// A worker's connection back to the supervisor
///
/// Dropping it frees the registry slot and then sends `Finished`.
pub struct WorkerLink {
    registry: Arc<Mutex<Registry>>,
    events: mpsc::UnboundedSender<WorkerEvent>,
    device: DeviceHandle,
    worker_id: u64,
    reports: Arc<AtomicU64>,
}

impl WorkerLink {
    pub fn device(&self) -> &DeviceHandle {
        &self.device
    }

    pub fn worker_id(&self) -> u64 {
        self.worker_id
    }

    pub(crate) fn report_counter(&self) -> Arc<AtomicU64> {
        self.reports.clone()
    }

    pub(crate) fn started(&self) {
        self.send(WorkerEvent::Started {
            worker_id: self.worker_id,
            device: self.device.clone(),
        });
    }

    pub(crate) fn error(&self, error: WorkerError) {
        error!("Worker {} on {}: {}", self.worker_id, self.device, error);
        {
            let mut registry = self.registry.lock();
            let owned = registry
                .records
                .get(self.device.path())
                .is_some_and(|record| record.worker_id == self.worker_id);
            if owned {
                registry
                    .last_errors
                    .insert(self.device.path().to_string(), error.to_string());
            }
        }
        self.send(WorkerEvent::Error {
            worker_id: self.worker_id,
            device: self.device.clone(),
            error,
        });
    }

    fn send(&self, event: WorkerEvent) {
        if self.events.send(event).is_err() {
            debug!("No listener for worker {} events", self.worker_id);
        }
    }
}

impl Drop for WorkerLink {
    fn drop(&mut self) {
        {
            let mut registry = self.registry.lock();
            let owned = registry
                .records
                .get(self.device.path())
                .is_some_and(|record| record.worker_id == self.worker_id);
            if owned {
                if let Some(record) = registry.records.remove(self.device.path()) {
                    registry.retire(record);
                }
                debug!("Worker {} released slot {}", self.worker_id, self.device.path());
            }
        }

        self.send(WorkerEvent::Finished {
            worker_id: self.worker_id,
            device: self.device.clone(),
            reports: self.reports.load(Ordering::Relaxed),
        });
    }
}

/// Owns one polling thread per device path
pub struct PollingSupervisor {
    access: Arc<dyn DeviceAccess>,
    options: PollingOptions,
    registry: Arc<Mutex<Registry>>,
    events: mpsc::UnboundedSender<WorkerEvent>,
}

impl PollingSupervisor {
    /// Creates an empty supervisor and the receiver for its worker events
    pub fn new(
        access: Arc<dyn DeviceAccess>,
        options: PollingOptions,
    ) -> (Self, mpsc::UnboundedReceiver<WorkerEvent>) {
        info!("Creating PollingSupervisor with options: {:?}", options);
        let (events, receiver) = mpsc::unbounded_channel();
        (
            Self {
                access,
                options,
                registry: Arc::new(Mutex::new(Registry::default())),
                events,
            },
            receiver,
        )
    }

    /// Spawns a worker for `device`, or returns the handle already being polled
    pub fn start_polling<H: ReportHandler>(
        &self,
        device: DeviceHandle,
        handler: H,
    ) -> Result<StartOutcome, PollingError> {
        let mut registry = self.registry.lock();

        if let Some(record) = registry.records.get(device.path()) {
            debug!("{} is already being polled by worker {}", device, record.worker_id);
            return Ok(StartOutcome::AlreadyRunning(record.handle.clone()));
        }

        registry.prune_retired();
        registry.last_errors.remove(device.path());
        registry.next_worker_id += 1;
        let worker_id = registry.next_worker_id;
        let cancel = CancellationToken::new();

        let link = WorkerLink {
            registry: self.registry.clone(),
            events: self.events.clone(),
            device: device.clone(),
            worker_id,
            reports: Arc::new(AtomicU64::new(0)),
        };
        let worker = DeviceWorker::create(
            worker_id,
            device.clone(),
            self.access.clone(),
            Box::new(handler),
            cancel.clone(),
            self.options.clone(),
            link.report_counter(),
        );

        // The thread cannot release its slot before the record below exists,
        // it has to wait for this lock first.
        let join = std::thread::Builder::new()
            .name(format!("hid-poll-{}", worker_id))
            .spawn(move || run_worker(worker, link))?;

        info!("Started worker {} for {}", worker_id, device);
        registry.records.insert(
            device.path().to_string(),
            WorkerRecord {
                handle: device.clone(),
                worker_id,
                cancel,
                join: Some(join),
            },
        );

        Ok(StartOutcome::Started(device))
    }

    /// Requests the worker for `path` to stop; the slot is free immediately
    pub fn stop_polling(&self, path: &str) -> StopOutcome {
        let mut registry = self.registry.lock();
        match registry.records.remove(path) {
            Some(record) => {
                info!("Stopping worker {} for {}", record.worker_id, record.handle);
                record.cancel.cancel();
                let handle = record.handle.clone();
                registry.retire(record);
                StopOutcome::Stopping(handle)
            }
            None => {
                debug!("stop_polling: {} is not being polled", path);
                StopOutcome::NotFound
            }
        }
    }

    /// Stops every worker and waits for all polling threads to end
    pub fn stop_all(&self) {
        let joins: Vec<JoinHandle<()>> = {
            let mut registry = self.registry.lock();
            let records: Vec<WorkerRecord> =
                registry.records.drain().map(|(_, record)| record).collect();
            for record in records {
                record.cancel.cancel();
                registry.retire(record);
            }
            registry.retired.drain(..).collect()
        };

        if joins.is_empty() {
            return;
        }

        info!("Waiting for {} polling threads", joins.len());
        for join in joins {
            if join.join().is_err() {
                warn!("A polling thread panicked");
            }
        }
        info!("All polling threads stopped");
    }

    /// Whether a worker currently owns `path`
    pub fn is_polling(&self, path: &str) -> bool {
        self.registry.lock().records.contains_key(path)
    }

    /// Handles of all registered workers, sorted by path
    pub fn active_devices(&self) -> Vec<DeviceHandle> {
        let registry = self.registry.lock();
        let mut devices: Vec<DeviceHandle> = registry
            .records
            .values()
            .map(|record| record.handle.clone())
            .collect();
        devices.sort_by(|a, b| a.path().cmp(b.path()));
        devices
    }

    /// Number of registered workers; stopped ones no longer count
    pub fn worker_count(&self) -> usize {
        self.registry.lock().records.len()
    }

    /// Last error of the most recent worker for `path`, also after it ended
    pub fn last_error(&self, path: &str) -> Option<String> {
        self.registry.lock().last_errors.get(path).cloned()
    }
}

impl Drop for PollingSupervisor {
    fn drop(&mut self) {
        self.stop_all();
    }
}

fn run_worker(worker: DeviceWorker<super::worker::Idle>, link: WorkerLink) {
    // `link` outlives the worker, so the device is closed before the slot is
    // released and `Finished` is sent, panics included.
    let stopped = match worker.open(&link) {
        Ok(running) => running.run(&link).shutdown(),
        Err(stopped) => stopped,
    };
    debug!(
        "Worker {} ended after {} reports",
        link.worker_id(),
        stopped.reports()
    );
    drop(stopped);
    drop(link);
}
