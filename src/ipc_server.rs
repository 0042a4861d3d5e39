//! IPC Server module for local control.
//!
//! This module provides a Unix Domain Socket server accepting pause,
//! resume and status commands as newline-delimited JSON.

use crate::config::Config;
use crate::error::IpcError;
use crate::metrics::{MetricsCollector, MetricsResponse};
use crate::pause::PauseGate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::RwLock;

/// Default socket path for IPC communication.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/adaptive-brightness.sock";

/// Commands that can be received via IPC.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "command")]
pub enum IpcCommand {
    Pause,
    Resume,
    GetStatus,
}

/// Configuration portion of status response.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ConfigResponse {
    pub sensitivity_factor: f64,
    pub min_brightness_level: u32,
    pub max_backlight_value: u32,
    pub step: u32,
    pub num_readings: usize,
}

impl From<&Config> for ConfigResponse {
    fn from(config: &Config) -> Self {
        Self {
            sensitivity_factor: config.sensitivity_factor,
            min_brightness_level: config.min_brightness_level,
            max_backlight_value: config.max_backlight_value,
            step: config.step,
            num_readings: config.num_readings,
        }
    }
}

/// Latest control loop observations, published once per cycle.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct LoopSnapshot {
    /// Last raw sensor sample
    pub last_sample: Option<u32>,
    /// Moving average after the last sample
    pub moving_average: Option<f64>,
    /// Stability classification of the last cycle
    pub stability: Option<String>,
    /// Current cooldown in seconds
    pub cooldown_secs: u64,
    /// Seconds since the stable value last changed
    pub stable_for_secs: u64,
    /// Samples currently held in the moving average window
    pub readings: usize,
    /// Last curve target sent to the actuator
    pub last_target: Option<u32>,
    /// Last known backlight value
    pub brightness: Option<u32>,
}

/// Status response sent to clients.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StatusResponse {
    pub paused: bool,
    pub pause_flag_present: bool,
    #[serde(flatten)]
    pub snapshot: LoopSnapshot,
    pub config: ConfigResponse,
    pub metrics: MetricsResponse,
}

/// Shared daemon state accessible by the IPC server.
pub struct DaemonState {
    /// Pause gate shared with the control loop
    pub gate: PauseGate,
    /// Latest loop observations
    pub snapshot: RwLock<LoopSnapshot>,
    /// Operational counters
    pub metrics: MetricsCollector,
    /// Effective configuration
    pub config: Config,
}

impl DaemonState {
    pub fn new(config: Config, gate: PauseGate) -> Self {
        Self {
            gate,
            snapshot: RwLock::new(LoopSnapshot::default()),
            metrics: MetricsCollector::new(),
            config,
        }
    }

    /// Get the current status as a StatusResponse.
    pub async fn get_status(&self) -> StatusResponse {
        let snapshot = self.snapshot.read().await.clone();
        StatusResponse {
            paused: self.is_paused(),
            pause_flag_present: self.gate.is_flag_present(),
            snapshot,
            config: ConfigResponse::from(&self.config),
            metrics: self.metrics.get_metrics(),
        }
    }

    pub fn pause(&self) {
        self.gate.pause();
    }

    pub fn resume(&self) {
        self.gate.resume();
    }

    pub fn is_paused(&self) -> bool {
        self.gate.is_paused()
    }
}

/// Unix Domain Socket server for IPC.
pub struct IpcServer {
    /// Path to the Unix socket
    socket_path: PathBuf,
    /// Unix listener for incoming connections
    listener: UnixListener,
}

impl IpcServer {
    /// Create a new IPC server at the specified path.
    ///
    /// Any stale socket file at the path is removed first.
    pub async fn new(path: &str) -> Result<Self, IpcError> {
        let socket_path = PathBuf::from(path);

        Self::cleanup_socket(&socket_path)?;

        let listener = UnixListener::bind(&socket_path).map_err(|e| IpcError::SocketBindFailed {
            path: path.to_string(),
            source: e,
        })?;

        Ok(Self {
            socket_path,
            listener,
        })
    }

    /// Create a new IPC server at the default path.
    pub async fn new_default() -> Result<Self, IpcError> {
        Self::new(DEFAULT_SOCKET_PATH).await
    }

    fn cleanup_socket(path: &Path) -> Result<(), IpcError> {
        if path.exists() {
            std::fs::remove_file(path).map_err(|e| IpcError::SocketBindFailed {
                path: path.display().to_string(),
                source: e,
            })?;
        }
        Ok(())
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Accept and handle incoming connections.
    pub async fn run(&self, state: Arc<DaemonState>) -> Result<(), IpcError> {
        loop {
            match self.listener.accept().await {
                Ok((stream, _addr)) => {
                    let state = Arc::clone(&state);
                    tokio::spawn(async move {
                        if let Err(e) = Self::handle_connection(stream, state).await {
                            tracing::warn!("Error handling IPC connection: {}", e);
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("Error accepting IPC connection: {}", e);
                }
            }
        }
    }

    async fn handle_connection(
        stream: UnixStream,
        state: Arc<DaemonState>,
    ) -> Result<(), IpcError> {
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);
        let mut line = String::new();

        while reader.read_line(&mut line).await? > 0 {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                line.clear();
                continue;
            }

            let response = match serde_json::from_str::<IpcCommand>(trimmed) {
                Ok(command) => Self::handle_command(command, &state).await,
                Err(e) => serde_json::json!({
                    "error": format!("Invalid command: {}", e)
                }),
            };

            let response_str = serde_json::to_string(&response)?;
            writer.write_all(response_str.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;

            line.clear();
        }

        Ok(())
    }

    /// Handle a single IPC command and return the response.
    pub async fn handle_command(
        command: IpcCommand,
        state: &Arc<DaemonState>,
    ) -> serde_json::Value {
        match command {
            IpcCommand::Pause => {
                state.pause();
                tracing::info!("Brightness adjustment paused via IPC");
                serde_json::json!({ "success": true, "message": "Brightness adjustment paused" })
            }

            IpcCommand::Resume => {
                state.resume();
                tracing::info!("Brightness adjustment resumed via IPC");
                let message = if state.gate.is_flag_present() {
                    format!(
                        "Resumed, but pause flag {} is still present",
                        state.gate.flag_path().display()
                    )
                } else {
                    "Brightness adjustment resumed".to_string()
                };
                serde_json::json!({ "success": true, "message": message })
            }

            IpcCommand::GetStatus => {
                let status = state.get_status().await;
                serde_json::to_value(status).unwrap_or_else(|e| {
                    serde_json::json!({
                        "error": format!("Failed to serialize status: {}", e)
                    })
                })
            }
        }
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        if self.socket_path.exists() {
            let _ = std::fs::remove_file(&self.socket_path);
        }
    }
}

/// Send one command to a running daemon and return its response.
pub async fn send_command(
    path: &Path,
    command: &IpcCommand,
) -> Result<serde_json::Value, IpcError> {
    let stream = UnixStream::connect(path)
        .await
        .map_err(|e| IpcError::ConnectFailed {
            path: path.display().to_string(),
            source: e,
        })?;
    let (reader, mut writer) = stream.into_split();

    let request = serde_json::to_string(command)?;
    writer.write_all(request.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;

    let mut reader = BufReader::new(reader);
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Err(IpcError::ConnectionDropped);
    }
    Ok(serde_json::from_str(line.trim())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::tempdir;

    fn test_state(dir: &Path) -> Arc<DaemonState> {
        let gate = PauseGate::new(dir.join("pause.flag"));
        Arc::new(DaemonState::new(Config::default(), gate))
    }

    #[test]
    fn test_ipc_command_serialization() {
        for (cmd, tag) in [
            (IpcCommand::Pause, "Pause"),
            (IpcCommand::Resume, "Resume"),
            (IpcCommand::GetStatus, "GetStatus"),
        ] {
            let json = serde_json::to_string(&cmd).unwrap();
            assert_eq!(json, format!("{{\"command\":\"{}\"}}", tag));
            let parsed: IpcCommand = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed, cmd);
        }
    }

    #[test]
    fn test_unknown_command_rejected() {
        let result = serde_json::from_str::<IpcCommand>(r#"{"command":"SetConfig"}"#);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_pause_resume_commands() {
        let dir = tempdir().unwrap();
        let state = test_state(dir.path());
        assert!(!state.is_paused());

        let response = IpcServer::handle_command(IpcCommand::Pause, &state).await;
        assert!(response["success"].as_bool().unwrap());
        assert!(state.is_paused());

        let response = IpcServer::handle_command(IpcCommand::Resume, &state).await;
        assert!(response["success"].as_bool().unwrap());
        assert!(!state.is_paused());
    }

    #[tokio::test]
    async fn test_resume_reports_lingering_flag() {
        let dir = tempdir().unwrap();
        let state = test_state(dir.path());
        std::fs::write(dir.path().join("pause.flag"), "").unwrap();

        let response = IpcServer::handle_command(IpcCommand::Resume, &state).await;
        assert!(response["message"].as_str().unwrap().contains("still present"));
        assert!(state.is_paused());
    }

    #[tokio::test]
    async fn test_get_status_fields() {
        let dir = tempdir().unwrap();
        let state = test_state(dir.path());
        {
            let mut snapshot = state.snapshot.write().await;
            snapshot.last_sample = Some(120);
            snapshot.moving_average = Some(118.5);
            snapshot.stability = Some("Steady".to_string());
            snapshot.cooldown_secs = 4;
            snapshot.stable_for_secs = 75;
            snapshot.readings = 10;
            snapshot.brightness = Some(1500);
        }
        state.metrics.record_cycle();

        let response = IpcServer::handle_command(IpcCommand::GetStatus, &state).await;
        assert_eq!(response["paused"], false);
        assert_eq!(response["last_sample"], 120);
        assert_eq!(response["moving_average"], 118.5);
        assert_eq!(response["stability"], "Steady");
        assert_eq!(response["cooldown_secs"], 4);
        assert_eq!(response["stable_for_secs"], 75);
        assert_eq!(response["readings"], 10);
        assert_eq!(response["brightness"], 1500);
        assert!(response["last_target"].is_null());
        assert_eq!(response["config"]["min_brightness_level"], 400);
        assert_eq!(response["metrics"]["cycles"], 1);
    }

    #[tokio::test]
    async fn test_ipc_server_creation_and_cleanup() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("test.sock");
        let path_str = socket_path.to_str().unwrap();

        let server = IpcServer::new(path_str).await.unwrap();
        assert!(socket_path.exists());

        drop(server);
        assert!(!socket_path.exists());
    }

    #[tokio::test]
    async fn test_ipc_server_replaces_existing_socket() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("test.sock");
        let path_str = socket_path.to_str().unwrap();

        std::fs::write(&socket_path, "dummy").unwrap();

        let server = IpcServer::new(path_str).await.unwrap();
        assert!(socket_path.exists());
        drop(server);
    }

    #[tokio::test]
    async fn test_client_round_trip_over_socket() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("ctl.sock");
        let state = test_state(dir.path());

        let server = IpcServer::new(socket_path.to_str().unwrap()).await.unwrap();
        let server_state = Arc::clone(&state);
        let handle = tokio::spawn(async move {
            let _ = server.run(server_state).await;
        });

        let response = send_command(&socket_path, &IpcCommand::Pause).await.unwrap();
        assert!(response["success"].as_bool().unwrap());
        assert!(state.is_paused());

        let status = send_command(&socket_path, &IpcCommand::GetStatus).await.unwrap();
        assert_eq!(status["paused"], true);

        handle.abort();
    }

    #[tokio::test]
    async fn test_client_without_daemon() {
        let dir = tempdir().unwrap();
        let result = send_command(&dir.path().join("absent.sock"), &IpcCommand::GetStatus).await;
        assert!(matches!(result, Err(IpcError::ConnectFailed { .. })));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_status_response_round_trip(
            paused in any::<bool>(),
            last_sample in proptest::option::of(0u32..5000),
            moving_average in proptest::option::of(0.0f64..5000.0),
            cooldown_secs in 1u64..=30,
            brightness in proptest::option::of(0u32..4096),
        ) {
            let status = StatusResponse {
                paused,
                pause_flag_present: false,
                snapshot: LoopSnapshot {
                    last_sample,
                    moving_average,
                    stability: Some("Changing".to_string()),
                    cooldown_secs,
                    stable_for_secs: cooldown_secs * 2,
                    readings: 10,
                    last_target: brightness,
                    brightness,
                },
                config: ConfigResponse::from(&Config::default()),
                metrics: MetricsCollector::new().get_metrics(),
            };

            let json = serde_json::to_string(&status).unwrap();
            let parsed: StatusResponse = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(status, parsed);
        }
    }
}
