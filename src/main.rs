use color_eyre::{eyre::eyre, Result};
use purelink_bridge::cloud::{select_device, AuthFlow, AuthProgress, DeviceCredential};
use purelink_bridge::config::BridgeConfig;
use purelink_bridge::device::{ControllerEvent, ControllerHandle, DeviceController};
use purelink_bridge::mqtt::RumqttTransport;
use purelink_bridge::persistence::{credentials, TomlFileStore};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let config = setup().await?;

    let state_path = match &config.bridge.state_file {
        Some(path) => path.clone(),
        None => TomlFileStore::default_path()?,
    };
    let store = TomlFileStore::open(state_path).await?;
    info!("Using state file {}", store.path().display());
    credentials::record_version(&store, env!("CARGO_PKG_VERSION")).await?;

    if config.bridge.reset_cloud_data {
        warn!("reset_cloud_data is set, forgetting stored devices. Unset it after this start");
        credentials::reset(&store).await?;
    }

    let flow = AuthFlow::new(
        &store,
        config.cloud_settings(),
        config.account.password.clone(),
    );
    let devices = match flow.run(config.otp_code()).await? {
        AuthProgress::OtpRequested => {
            info!(
                "Set [account] otp_code to the emailed code in {} and start again",
                BridgeConfig::config_path()?.display()
            );
            return Ok(());
        }
        AuthProgress::Completed(devices) => devices,
    };

    let device = select_device(&devices, config.device_name())?;
    run_bridge(&config, device).await
}

async fn run_bridge(config: &BridgeConfig, device: DeviceCredential) -> Result<()> {
    let shutdown = CancellationToken::new();
    let mqtt_config = config.mqtt_config(&device);

    let (transport_tx, transport_rx) = mpsc::channel(mqtt_config.channel_capacity);
    let (transport, transport_task) =
        RumqttTransport::connect(&mqtt_config, transport_tx, shutdown.clone());

    let (event_tx, mut event_rx) = mpsc::channel(100);
    let controller = DeviceController::new(&device, transport, event_tx);
    let handle = ControllerHandle::spawn(
        controller,
        transport_rx,
        Some(config.controller_settings()),
        shutdown.clone(),
    );

    info!("Bridge running for {}", device);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received, shutting down");
                break;
            }
            event = event_rx.recv() => match event {
                Some(event) => report(&device.name, event),
                None => break,
            },
        }
    }

    shutdown.cancel();
    let controller = handle
        .shutdown()
        .await
        .map_err(|e| eyre!("Failed to stop controller: {}", e))?;
    debug!("Final state of {}: {:?}", controller.name(), controller.state());
    transport_task
        .await
        .map_err(|e| eyre!("Transport task failed: {}", e))?;
    Ok(())
}

/// Host side of the bridge: every notification becomes a log line.
fn report(device: &str, event: ControllerEvent) {
    match event {
        ControllerEvent::StateChanged(state) => {
            info!(
                "{}: fan {:?} speed {:?} power {:?} oscillation {:?} filter {:?}",
                device,
                state.fan_mode,
                state.fan_speed,
                state.fan_power,
                state.oscillation,
                state.filter_life
            );
            debug!("{}: full state {:?}", device, state);
        }
        ControllerEvent::SensorsChanged(sensors) => {
            info!(
                "{}: {:?} °C, humidity {:?} %, pm2.5 {:?}, voc {:?}, sleep timer {:?}",
                device,
                sensors.temperature_celsius().map(|c| (c * 10.0).round() / 10.0),
                sensors.humidity,
                sensors.particulate_matter_25.or(sensors.particles),
                sensors.volatile_compounds,
                sensors.sleep_timer
            );
        }
        ControllerEvent::ConnectionReported(report) => info!("{}: connection {}", device, report),
        ControllerEvent::FaultsReported(report) => warn!("{}: faults {}", device, report),
    }
}

async fn setup() -> Result<BridgeConfig> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;

    let path = BridgeConfig::config_path()?;
    let created = BridgeConfig::ensure_default_config(&path).await?;
    let config = BridgeConfig::load(&path).await?;

    setup_logging_env(&config.bridge.log_level)?;
    if created {
        info!("Wrote default configuration to {}", path.display());
    }
    info!("Loaded configuration from {}", path.display());
    config.validate()?;
    Ok(config)
}

fn setup_logging_env(level: &str) -> Result<()> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(directives) => EnvFilter::new(directives),
        Err(_) => EnvFilter::try_new(level)
            .map_err(|e| eyre!("Invalid log_level '{}': {}", level, e))?,
    };
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();
    Ok(())
}
