//! Adaptive Brightness Daemon - ambient-light-driven backlight control.
//!
//! This daemon reads the ambient light sensor, smooths and classifies the
//! readings, and ramps the display backlight along a logarithmic curve.

mod backlight;
mod cli;
mod config;
mod controller;
mod curve;
mod device_lock;
mod discovery;
mod error;
mod ipc_server;
mod logging;
mod metrics;
mod pause;
mod sensor;
mod stability;

use backlight::{Actuator, SysfsBacklight};
use clap::Parser;
use cli::{Cli, Commands, StartArgs};
use config::Config;
use controller::ControlLoop;
use device_lock::DeviceLock;
use discovery::DevicePaths;
use error::{ConfigError, DaemonError};
use ipc_server::{DaemonState, IpcCommand, IpcServer, DEFAULT_SOCKET_PATH};
use pause::PauseGate;
use sensor::SysfsLightSensor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Graceful shutdown timeout in seconds
const SHUTDOWN_TIMEOUT_SECS: u64 = 2;

/// Delay before restarting a failed IPC server
const IPC_RESTART_DELAY_SECS: u64 = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);

    match cli.command {
        Commands::Start(args) => {
            let _log_guard = logging::init_logging(args.silent).map_err(|e| {
                eprintln!("Failed to initialize logging: {}", e);
                e
            })?;

            info!("Adaptive brightness daemon starting...");
            let explicit = cli.config.is_some();
            let result = run_daemon(&config_path, explicit, &args).await;

            match &result {
                Ok(()) => info!("Adaptive brightness daemon shut down gracefully"),
                Err(e) => error!("Adaptive brightness daemon error: {}", e),
            }
            result?;
        }
        Commands::Pause => {
            let config = Config::load_or_default(&config_path)?;
            pause::create_flag(&config.pause_flag_path).map_err(DaemonError::from)?;
            println!(
                "Brightness adjustment paused (flag: {})",
                config.pause_flag_path.display()
            );
        }
        Commands::Resume => {
            let config = Config::load_or_default(&config_path)?;
            if pause::remove_flag(&config.pause_flag_path).map_err(DaemonError::from)? {
                println!("Brightness adjustment resumed");
            } else {
                eprintln!(
                    "Warning: pause flag {} does not exist, nothing to resume",
                    config.pause_flag_path.display()
                );
            }
        }
        Commands::Status => {
            let response =
                ipc_server::send_command(Path::new(DEFAULT_SOCKET_PATH), &IpcCommand::GetStatus)
                    .await
                    .map_err(DaemonError::from)?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Commands::InitConfig(args) => {
            let mut config = Config::load_or_default(&config_path)?;
            args.apply_to(&mut config);
            config.save(&config_path)?;
            println!("Configuration written to {}", config_path.display());
        }
    }

    Ok(())
}

/// Load the configuration file and apply command-line overrides.
///
/// An explicitly requested file must exist; the default path falls back
/// to built-in defaults.
fn load_config(path: &Path, explicit: bool, args: &StartArgs) -> Result<Config, ConfigError> {
    if explicit && !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let mut config = Config::load_or_default(path)?;
    args.apply_to(&mut config);
    config.validate()?;
    Ok(config)
}

/// Main daemon entry point.
async fn run_daemon(
    config_path: &Path,
    explicit: bool,
    args: &StartArgs,
) -> Result<(), DaemonError> {
    let mut config = load_config(config_path, explicit, args)?;
    info!("Configuration loaded from {:?}", config_path);
    if let Some(profile) = config.profile {
        info!("Using profile {:?}", profile);
    }

    let devices = DevicePaths::discover(config.backlight_device.as_deref())?;
    info!("Ambient light sensor: {}", devices.sensor.display());
    info!("Backlight device: {}", devices.backlight_dir.display());

    let backlight = SysfsBacklight::new(&devices.backlight_dir);
    match backlight.max_brightness() {
        Ok(hardware_max) if hardware_max < config.max_backlight_value => {
            warn!(
                "max_backlight_value {} exceeds hardware maximum {}, using {}",
                config.max_backlight_value, hardware_max, hardware_max
            );
            config.max_backlight_value = hardware_max;
            config.validate()?;
        }
        Ok(_) => {}
        Err(e) => warn!("Could not read hardware maximum brightness: {}", e),
    }

    let lock_path: PathBuf = DeviceLock::path_for_device(&devices.backlight_name());
    let device_lock = DeviceLock::open(&lock_path)?;
    info!("Ramp lock: {}", device_lock.path().display());
    if device_lock.is_held_elsewhere()? {
        warn!(
            "Another process holds {}, ramps will wait for it",
            device_lock.path().display()
        );
    }
    let actuator = Actuator::new(backlight, config.step, config.max_backlight_value)
        .with_device_lock(device_lock);

    let gate = PauseGate::new(&config.pause_flag_path);
    let daemon_state = Arc::new(DaemonState::new(config.clone(), gate));

    let sensor = SysfsLightSensor::new(&devices.sensor);
    info!("Reading light sensor from {}", sensor.path().display());
    let control = ControlLoop::new(&config, sensor, actuator, Arc::clone(&daemon_state));
    control.establish_baseline().await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        if let Err(e) = setup_signal_handlers(signal_tx).await {
            error!("Signal handler error: {}", e);
        }
    });

    let ipc_state = Arc::clone(&daemon_state);
    let ipc_shutdown_rx = shutdown_rx.clone();
    let ipc_handle =
        tokio::spawn(async move { run_ipc_server_supervised(ipc_state, ipc_shutdown_rx).await });

    let loop_handle = tokio::spawn(control.run(shutdown_rx.clone()));

    info!("Adaptive brightness daemon initialized and running");

    let mut shutdown_rx_main = shutdown_rx;
    shutdown_rx_main.changed().await.ok();

    info!("Shutdown signal received, stopping tasks...");

    let shutdown_timeout = Duration::from_secs(SHUTDOWN_TIMEOUT_SECS);
    let joined = tokio::time::timeout(shutdown_timeout, async {
        tokio::join!(ipc_handle, loop_handle)
    })
    .await;

    match joined {
        Ok((_, Err(e))) => {
            return Err(DaemonError::Runtime(format!(
                "control loop task failed: {}",
                e
            )))
        }
        Ok(_) => info!("All tasks stopped"),
        Err(_) => warn!("Tasks did not stop within {}s", SHUTDOWN_TIMEOUT_SECS),
    }
    Ok(())
}

/// Set up signal handlers for graceful shutdown on SIGTERM and SIGINT.
async fn setup_signal_handlers(
    shutdown_tx: watch::Sender<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => {
            info!("Received SIGTERM");
        }
        _ = sigint.recv() => {
            info!("Received SIGINT");
        }
    }

    let _ = shutdown_tx.send(true);
    Ok(())
}

/// Run the IPC server, restarting it after failures until shutdown.
async fn run_ipc_server_supervised(
    state: Arc<DaemonState>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    info!("IPC server shutting down");
                    break;
                }
            }
            result = run_ipc_server_inner(Arc::clone(&state)) => {
                match result {
                    Ok(()) => break,
                    Err(e) => {
                        error!(
                            "IPC server error: {}, restarting in {} seconds",
                            e, IPC_RESTART_DELAY_SECS
                        );
                        tokio::time::sleep(Duration::from_secs(IPC_RESTART_DELAY_SECS)).await;
                    }
                }
            }
        }
    }
}

async fn run_ipc_server_inner(state: Arc<DaemonState>) -> Result<(), error::IpcError> {
    let server = IpcServer::new_default().await?;
    info!("IPC server listening on {:?}", server.socket_path());
    server.run(state).await
}
