//! Error types for the adaptive brightness daemon.
//!
//! Each component gets its own error enum. Sensor and backlight faults are
//! transient and only ever skip a cycle; configuration, discovery and the
//! startup baseline read are the only fatal paths.

use thiserror::Error;

/// Errors reading the ambient light sensor.
#[derive(Error, Debug)]
pub enum SensorError {
    #[error("Ambient light sensor unavailable at '{path}': {source}")]
    Unavailable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid sensor reading '{0}'")]
    InvalidReading(String),
}

/// Errors talking to the backlight register.
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Failed to read brightness from '{path}': {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write brightness {value} to '{path}': {source}")]
    WriteFailed {
        path: String,
        value: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid brightness value '{0}'")]
    InvalidValue(String),

    #[error("Failed to lock backlight device via '{path}': {source}")]
    LockFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors locating the sensor and backlight devices.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("ALS device not found under '{0}'")]
    SensorNotFound(String),

    #[error("No backlight devices found under '{0}'")]
    BacklightNotFound(String),

    #[error("Failed to scan '{path}': {source}")]
    ScanFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors related to the pause flag file.
#[derive(Error, Debug)]
pub enum PauseError {
    #[error("Failed to create pause flag '{path}': {source}")]
    CreateFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove pause flag '{path}': {source}")]
    RemoveFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors related to IPC server operations.
#[derive(Error, Debug)]
pub enum IpcError {
    #[error("Failed to bind socket at '{path}': {source}")]
    SocketBindFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to connect to daemon at '{path}': {source}")]
    ConnectFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Daemon closed the connection without a response")]
    ConnectionDropped,

    #[error("Failed to serialize message: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors related to configuration management.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found at '{0}'")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Failed to write configuration: {0}")]
    WriteError(#[from] std::io::Error),
}

/// Top-level daemon errors.
#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("Backlight error: {0}")]
    Device(#[from] DeviceError),

    #[error("Device discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("Pause control error: {0}")]
    Pause(#[from] PauseError),

    #[error("IPC error: {0}")]
    Ipc(#[from] IpcError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Runtime error: {0}")]
    Runtime(String),
}
