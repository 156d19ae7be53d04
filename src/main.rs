use color_eyre::Result;
use hidmapper::config::AppConfig;
use hidmapper::device::replay::{ReplayDeviceAccess, StreamEnd};
use hidmapper::device::{DeviceAccess, DeviceHandle};
use hidmapper::mapping::Mapper;
use hidmapper::output::{TracingGamepadSink, TracingMouseSink};
use hidmapper::polling::{PollingOptions, PollingSupervisor, WorkerEvent};
use hidmapper::profile::{ProfileDirectory, GENERIC_FAMILY};
use hidmapper::settings::{LiveSettings, SettingsProvider};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(AppConfig::default_path);
    info!("Loading config from {}", config_path.display());
    let config = AppConfig::load(&config_path).await?;

    let settings = Arc::new(LiveSettings::new(config.settings.snapshot()));
    let profiles = ProfileDirectory::new(&config.profiles_dir);
    info!(
        "Profiles in {}: {:?}",
        profiles.root().display(),
        profiles.families()?
    );

    let access = Arc::new(ReplayDeviceAccess::from_capture_dir(
        &config.capture_dir,
        StreamEnd::Disconnect,
    )?);
    let devices = access.enumerate()?;
    if devices.is_empty() {
        warn!("No captures found in {}", config.capture_dir.display());
        return Ok(());
    }

    let (supervisor, mut events) =
        PollingSupervisor::new(access.clone(), PollingOptions::new(settings.clone()));

    for info in devices {
        let family = config
            .family_for(&info)
            .unwrap_or(GENERIC_FAMILY)
            .to_string();
        let device = DeviceHandle::from(info);

        let mapper = match Mapper::from_source(
            device.clone(),
            &family,
            &profiles,
            settings.clone(),
            Box::new(TracingGamepadSink::new(device.display_name())),
            Box::new(TracingMouseSink::new(device.display_name())),
        ) {
            Ok(mapper) => mapper,
            Err(e) => {
                error!("Cannot map {}: {}", device, e);
                continue;
            }
        };

        supervisor.start_polling(device, mapper)?;
    }

    if supervisor.worker_count() == 0 {
        warn!("No device could be mapped");
        return Ok(());
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                if let Err(e) = result {
                    error!("Failed to listen for Ctrl-C: {}", e);
                }
                info!("Shutdown requested");
                break;
            }

            event = events.recv() => match event {
                Some(WorkerEvent::Started { worker_id, device }) => {
                    info!("Worker {} polling {}", worker_id, device);
                }
                Some(WorkerEvent::Error { worker_id, device, error }) => {
                    warn!("Worker {} on {} failed: {}", worker_id, device, error);
                }
                Some(WorkerEvent::Finished { worker_id, device, reports }) => {
                    info!("Worker {} on {} finished after {} reports", worker_id, device, reports);
                    if supervisor.worker_count() == 0 {
                        info!("All workers finished");
                        break;
                    }
                }
                None => break,
            }
        }
    }

    tokio::task::block_in_place(|| supervisor.stop_all());
    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
