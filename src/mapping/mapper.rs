//! Per-device mapper
//!
//! Binds one device to its profile, a settings provider and an output sink.
//! The mapper is driven by exactly one worker thread, so its session state is
//! plain owned data.

use super::decode::decode_report;
use super::mouse::{drive_pointer, EdgeDetector, MouseOutcome, PointerSmoother};
use super::NormalizedInputState;
use crate::device::DeviceHandle;
use crate::output::{GamepadSink, MouseSink, OutputSink};
use crate::polling::ReportHandler;
use crate::profile::{MappingProfile, ProfileError, ProfileSource};
use crate::settings::SettingsProvider;
use std::sync::Arc;
use tracing::{debug, info};

/// Mutable per-device state, owned by the worker driving the device
#[derive(Debug, Default, Clone)]
pub struct MapperSession {
    pub connected: bool,
    pub pointer: PointerSmoother,
    pub edges: EdgeDetector,
}

pub struct Mapper {
    device: DeviceHandle,
    profile: Arc<MappingProfile>,
    settings: Arc<dyn SettingsProvider>,
    sink: OutputSink,
    /// `mouse_mode` as last seen in the settings
    mouse_setting: bool,
    session: MapperSession,
    decoded: u64,
    dropped: u64,
}

impl Mapper {
    /// Builds a mapper; the initial output mode comes from the current settings
    pub fn new(
        device: DeviceHandle,
        profile: Arc<MappingProfile>,
        settings: Arc<dyn SettingsProvider>,
        gamepad: Box<dyn GamepadSink>,
        pointer: Box<dyn MouseSink>,
    ) -> Self {
        let mouse_mode = settings.snapshot().mouse_mode;
        let sink = OutputSink::resolve(mouse_mode, gamepad, pointer);
        info!(
            "Mapper for {} uses profile '{}' with {:?}",
            device, profile.family, sink
        );

        Self {
            device,
            profile,
            settings,
            sink,
            mouse_setting: mouse_mode,
            session: MapperSession::default(),
            decoded: 0,
            dropped: 0,
        }
    }

    /// Resolves the family's profile first; fails if it is missing or invalid
    pub fn from_source(
        device: DeviceHandle,
        family: &str,
        source: &dyn ProfileSource,
        settings: Arc<dyn SettingsProvider>,
        gamepad: Box<dyn GamepadSink>,
        pointer: Box<dyn MouseSink>,
    ) -> Result<Self, ProfileError> {
        let profile = source.resolve(family)?;
        Ok(Self::new(
            device,
            Arc::new(profile),
            settings,
            gamepad,
            pointer,
        ))
    }

    /// Decodes one report and dispatches it; short reports are dropped silently
    pub fn process_report(&mut self, report: &[u8]) -> Option<NormalizedInputState> {
        let settings = self.settings.snapshot();
        let Some(state) = decode_report(report, &self.profile, &settings) else {
            self.dropped += 1;
            return None;
        };
        self.decoded += 1;
        self.follow_mouse_setting(settings.mouse_mode);

        let leave_mouse_mode = match &mut self.sink {
            OutputSink::Gamepad { pad, .. } => {
                pad.update(&state);
                false
            }
            OutputSink::Mouse { pointer, .. } => {
                drive_pointer(
                    &state,
                    settings.mouse_sensitivity,
                    &mut self.session.pointer,
                    &mut self.session.edges,
                    pointer.as_mut(),
                ) == MouseOutcome::ExitRequested
            }
        };

        if leave_mouse_mode {
            info!("Back pressed on {}, leaving mouse mode", self.device);
            self.sink.leave_mouse_mode();
        }

        Some(state)
    }

    /// Switches output mode when the `mouse_mode` setting changed since the
    /// last report. A back-button exit stays in place until then.
    fn follow_mouse_setting(&mut self, mouse_mode: bool) {
        if mouse_mode == self.mouse_setting {
            return;
        }
        self.mouse_setting = mouse_mode;

        if mouse_mode {
            info!("Mouse mode enabled for {}", self.device);
            self.session.pointer = PointerSmoother::default();
            self.session.edges.reset();
            self.sink.enter_mouse_mode();
        } else {
            info!("Mouse mode disabled for {}", self.device);
            self.sink.leave_mouse_mode();
        }
    }

    pub fn device(&self) -> &DeviceHandle {
        &self.device
    }

    /// Profile resolved for this device's family
    pub fn profile(&self) -> &MappingProfile {
        &self.profile
    }

    /// Pointer and edge state carried between reports
    pub fn session(&self) -> &MapperSession {
        &self.session
    }

    /// Whether reports currently drive the pointer instead of the gamepad
    pub fn is_mouse_mode(&self) -> bool {
        self.sink.is_mouse()
    }

    /// `(decoded, dropped)` report counts
    pub fn counters(&self) -> (u64, u64) {
        (self.decoded, self.dropped)
    }
}

impl ReportHandler for Mapper {
    fn handle_report(&mut self, report: &[u8]) {
        self.process_report(report);
    }

    fn on_start(&mut self, device: &DeviceHandle) {
        debug!("Mapper connected to {}", device);
        self.session.connected = true;
    }

    fn on_stop(&mut self, device: &DeviceHandle) {
        self.session.connected = false;
        self.session.edges.reset();
        self.sink.reset();
        info!(
            "Mapper for {} disconnected: {} reports decoded, {} dropped",
            device, self.decoded, self.dropped
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{builtin_generic, ButtonName};
    use crate::settings::{LiveSettings, SettingsSnapshot};
    use parking_lot::Mutex;

    #[derive(Clone, Default)]
    struct PadLog(Arc<Mutex<Vec<NormalizedInputState>>>);

    impl GamepadSink for PadLog {
        fn update(&mut self, state: &NormalizedInputState) {
            self.0.lock().push(state.clone());
        }
    }

    #[derive(Clone, Default)]
    struct MouseLog(Arc<Mutex<(Vec<(f64, f64)>, usize, usize)>>);

    impl MouseSink for MouseLog {
        fn move_relative(&mut self, dx: f64, dy: f64) {
            self.0.lock().0.push((dx, dy));
        }

        fn click_left(&mut self) {
            self.0.lock().1 += 1;
        }

        fn click_right(&mut self) {
            self.0.lock().2 += 1;
        }
    }

    fn device() -> DeviceHandle {
        DeviceHandle::new(0x0079, 0x0006, "/dev/hidraw0", None)
    }

    fn mapper(settings: LiveSettings) -> (Mapper, PadLog, MouseLog) {
        let pad = PadLog::default();
        let mouse = MouseLog::default();
        let mapper = Mapper::new(
            device(),
            Arc::new(builtin_generic()),
            Arc::new(settings),
            Box::new(pad.clone()),
            Box::new(mouse.clone()),
        );
        (mapper, pad, mouse)
    }

    /// Generic layout report with left stick and face button bytes set
    fn report(lx: u8, ly: u8, face: u8) -> [u8; 10] {
        [0, lx, ly, 0x80, 0x80, face, 0, 0, 0, 0]
    }

    #[test]
    fn test_gamepad_dispatch_and_short_reports() {
        let (mut mapper, pad, mouse) = mapper(LiveSettings::default());
        assert!(!mapper.is_mouse_mode());

        assert!(mapper.process_report(&[0; 9]).is_none());
        let state = mapper.process_report(&report(255, 128, 0x20)).unwrap();
        assert_eq!(state.left_stick.x, 32767);
        assert!(state.is_pressed(ButtonName::A));

        assert_eq!(pad.0.lock().len(), 1);
        assert!(mouse.0.lock().0.is_empty());
        assert_eq!(mapper.counters(), (1, 1));
    }

    #[test]
    fn test_mouse_mode_clicks_once_per_press() {
        let settings = LiveSettings::new(SettingsSnapshot {
            mouse_mode: true,
            ..SettingsSnapshot::default()
        });
        let (mut mapper, pad, mouse) = mapper(settings);
        assert!(mapper.is_mouse_mode());

        // a held over three reports, then b
        mapper.process_report(&report(255, 128, 0x20));
        mapper.process_report(&report(255, 128, 0x20));
        mapper.process_report(&report(255, 128, 0x20));
        mapper.process_report(&report(128, 128, 0x40));
        {
            let mouse = mouse.0.lock();
            assert_eq!(mouse.0.len(), 4);
            assert_eq!((mouse.1, mouse.2), (1, 1));
            assert!(mouse.0[0].0 > 0.0);
        }
        assert!(pad.0.lock().is_empty());
        let (dx, _) = mapper.session().pointer.velocity();
        assert!(dx > 0.0);

        // No back button in the generic layout
        assert!(mapper.is_mouse_mode());
    }

    #[test]
    fn test_back_edge_leaves_mouse_mode_for_session() {
        let profile = MappingProfile::from_json(
            "pad",
            r#"{"axes":{"lx":{"byte":1},"ly":{"byte":2}},
                "buttons":{"a":{"byte":5,"mask":"0x20"},"back":{"byte":6,"mask":"0x10"}}}"#,
        )
        .unwrap();
        let settings = LiveSettings::new(SettingsSnapshot {
            mouse_mode: true,
            ..SettingsSnapshot::default()
        });
        let pad = PadLog::default();
        let mouse = MouseLog::default();
        let mut mapper = Mapper::new(
            device(),
            Arc::new(profile),
            Arc::new(settings.clone()),
            Box::new(pad.clone()),
            Box::new(mouse.clone()),
        );

        let back = [0, 128, 128, 0, 0, 0, 0x10, 0, 0, 0];
        mapper.process_report(&back);
        assert!(!mapper.is_mouse_mode());
        assert_eq!(mouse.0.lock().0.len(), 1);

        mapper.process_report(&back);
        mapper.process_report(&report(128, 128, 0x20));
        assert_eq!(pad.0.lock().len(), 2);
        assert_eq!(mouse.0.lock().1, 0);

        // Still mouse mode in settings, but the session override holds
        assert!(settings.snapshot().mouse_mode);
        assert!(!mapper.is_mouse_mode());
    }

    #[test]
    fn test_mouse_mode_follows_settings_changes() {
        let profile = MappingProfile::from_json(
            "pad",
            r#"{"axes":{"lx":{"byte":1},"ly":{"byte":2}},
                "buttons":{"a":{"byte":5,"mask":"0x20"},"back":{"byte":6,"mask":"0x10"}}}"#,
        )
        .unwrap();
        let settings = LiveSettings::default();
        let pad = PadLog::default();
        let mouse = MouseLog::default();
        let mut mapper = Mapper::new(
            device(),
            Arc::new(profile),
            Arc::new(settings.clone()),
            Box::new(pad.clone()),
            Box::new(mouse.clone()),
        );
        let idle = report(128, 128, 0);
        let back = [0, 128, 128, 0, 0, 0, 0x10, 0, 0, 0];

        mapper.process_report(&idle);
        assert!(!mapper.is_mouse_mode());

        settings.update(|s| s.mouse_mode = true);
        mapper.process_report(&report(255, 128, 0x20));
        assert!(mapper.is_mouse_mode());
        assert_eq!(mouse.0.lock().1, 1);

        // Back leaves mouse mode and stays out while the setting is unchanged
        mapper.process_report(&back);
        assert!(!mapper.is_mouse_mode());
        mapper.process_report(&idle);
        assert!(!mapper.is_mouse_mode());

        // Toggling the setting off and on re-enables it
        settings.update(|s| s.mouse_mode = false);
        mapper.process_report(&idle);
        assert!(!mapper.is_mouse_mode());
        settings.update(|s| s.mouse_mode = true);
        mapper.process_report(&idle);
        assert!(mapper.is_mouse_mode());

        settings.update(|s| s.mouse_mode = false);
        mapper.process_report(&idle);
        assert!(!mapper.is_mouse_mode());
        assert_eq!(pad.0.lock().len(), 4);
    }

    #[test]
    fn test_settings_changes_apply_per_report() {
        let settings = LiveSettings::default();
        let (mut mapper, _pad, _mouse) = mapper(settings.clone());

        let state = mapper.process_report(&report(140, 128, 0)).unwrap();
        assert_eq!(state.left_stick.x, 0);

        settings.update(|s| {
            s.left_deadzone = 0.0;
            s.left_invert.x = true;
        });
        let state = mapper.process_report(&report(140, 128, 0)).unwrap();
        assert!(state.left_stick.x < 0);
    }

    #[test]
    fn test_handler_lifecycle() {
        let (mut mapper, pad, _mouse) = mapper(LiveSettings::default());
        let handle = device();

        mapper.on_start(&handle);
        assert!(mapper.session().connected);
        mapper.handle_report(&report(0, 0, 0));
        mapper.on_stop(&handle);
        assert!(!mapper.session().connected);

        let updates = pad.0.lock();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[1], NormalizedInputState::default());
    }

    #[test]
    fn test_from_source_missing_family() {
        let dir = tempfile::TempDir::new().unwrap();
        let source = crate::profile::ProfileDirectory::new(dir.path());
        let result = Mapper::from_source(
            device(),
            "unknown",
            &source,
            Arc::new(SettingsSnapshot::default()),
            Box::new(PadLog::default()),
            Box::new(MouseLog::default()),
        );
        assert!(matches!(result, Err(ProfileError::NotFound { .. })));
    }
}
