mod common;

use common::{fast_options, next_event};
use hidmapper::device::replay::{ReplayDeviceAccess, StreamEnd};
use hidmapper::device::{DeviceAccess, DeviceHandle};
use hidmapper::mapping::{Mapper, NormalizedInputState};
use hidmapper::output::{GamepadSink, NullSink};
use hidmapper::polling::{PollingSupervisor, WorkerError, WorkerEvent};
use hidmapper::profile::{ButtonName, ProfileDirectory, GENERIC_FAMILY};
use hidmapper::settings::SettingsSnapshot;
use parking_lot::Mutex;
use std::sync::Arc;
use tempfile::TempDir;

#[derive(Default)]
struct Recorded {
    states: Vec<NormalizedInputState>,
    resets: usize,
}

struct RecordingSink(Arc<Mutex<Recorded>>);

impl GamepadSink for RecordingSink {
    fn update(&mut self, state: &NormalizedInputState) {
        self.0.lock().states.push(state.clone());
    }

    fn reset(&mut self) {
        self.0.lock().resets += 1;
    }
}

#[tokio::test]
async fn test_capture_replays_through_generic_profile() {
    let captures = TempDir::new().unwrap();
    let profiles = TempDir::new().unwrap();
    std::fs::write(
        captures.path().join("pad.hex"),
        "# idle, then A with the left stick pushed right\n\
         00 80 80 80 80 00 00 00 00 00\n\
         00 80 80\n\
         00 FF 80 80 80 20 00 FF 00 01\n",
    )
    .unwrap();

    let access = Arc::new(
        ReplayDeviceAccess::from_capture_dir(captures.path(), StreamEnd::Disconnect).unwrap(),
    );
    let devices = access.enumerate().unwrap();
    assert_eq!(devices.len(), 1);
    let device = DeviceHandle::from(devices[0].clone());
    assert_eq!(device.display_name(), "pad");

    let recorded = Arc::new(Mutex::new(Recorded::default()));
    let mapper = Mapper::from_source(
        device.clone(),
        GENERIC_FAMILY,
        &ProfileDirectory::new(profiles.path()),
        Arc::new(SettingsSnapshot::default()),
        Box::new(RecordingSink(recorded.clone())),
        Box::new(NullSink),
    )
    .unwrap();

    let (supervisor, mut events) = PollingSupervisor::new(access, fast_options());
    supervisor.start_polling(device, mapper).unwrap();

    assert!(matches!(next_event(&mut events).await, WorkerEvent::Started { .. }));
    match next_event(&mut events).await {
        WorkerEvent::Error { error, .. } => {
            assert!(matches!(error, WorkerError::ReadError { .. }))
        }
        other => panic!("expected end of capture, got {:?}", other),
    }
    match next_event(&mut events).await {
        WorkerEvent::Finished { reports, .. } => assert_eq!(reports, 3),
        other => panic!("expected Finished, got {:?}", other),
    }

    let recorded = recorded.lock();
    // The three-byte report never reaches the sink
    assert_eq!(recorded.states.len(), 2);
    assert_eq!(recorded.resets, 1);

    let idle = &recorded.states[0];
    assert_eq!(idle.left_stick.x, 0);
    assert!(idle.buttons.is_empty());
    assert!(idle.dpad.is_released());

    let pressed = &recorded.states[1];
    assert_eq!(pressed.left_stick.x, 32767);
    assert_eq!(pressed.left_trigger, 255);
    assert!(pressed.is_pressed(ButtonName::A));
    assert!(!pressed.is_pressed(ButtonName::B));
    assert!(pressed.dpad.up);
    assert!(!pressed.dpad.down);
}

#[test]
fn test_bad_capture_fails_enumeration() {
    let captures = TempDir::new().unwrap();
    std::fs::write(captures.path().join("broken.hex"), "00 zz 01\n").unwrap();

    let err = ReplayDeviceAccess::from_capture_dir(captures.path(), StreamEnd::Idle)
        .err()
        .expect("capture with a bad byte should not load");
    assert!(err.to_string().contains("broken.hex"), "{}", err);
}
