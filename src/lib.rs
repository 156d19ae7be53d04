//! Translate raw HID controller reports into virtual Xbox 360 pad or mouse input
//!
//! ```text
//! DeviceAccess ──► PollingSupervisor ──► DeviceWorker (one thread per device)
//!                                              │ raw report
//!                                              ▼
//!                  MappingProfile ──► Mapper (decode + transform) ◄── SettingsProvider
//!                                              │
//!                                              ▼
//!                                    OutputSink::{Gamepad, Mouse}
//! ```

pub mod config;
pub mod device;
pub mod mapping;
pub mod output;
pub mod polling;
pub mod profile;
pub mod settings;
