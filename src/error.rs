use std::{fmt, io, path::PathBuf};

/// Coarse classification of a [`SensorError`], used for diagnostics only.
/// The cycle reacts to every category the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Connectivity,
    Timeout,
    Protocol,
    Configuration,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::Connectivity => "connectivity",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::Protocol => "protocol",
            ErrorCategory::Configuration => "configuration",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    #[error("Error communicating over the network: {0}")]
    Network(#[from] io::Error),
    #[error("Device at {} not responding: {source}", .path.display())]
    Device {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Timeout waiting for {0}")]
    Timeout(&'static str),
    #[error("Protocol error: {0}")]
    Protocol(String),
    #[error("Invalid measurement: {0}")]
    Measurement(String),
    #[error("Not connected to the broker")]
    Disconnected,
    #[error("Measurement field `{0}` was never set")]
    Incomplete(&'static str),
    #[error("Config parsing error: {0}")]
    Config(#[from] dotenvy::Error),
    #[error("Missing required setting {0}")]
    MissingConfig(&'static str),
    #[error("Invalid value {value:?} for {key}")]
    InvalidConfig { key: &'static str, value: String },
    #[error("Failed to install log subscriber: {0}")]
    Telemetry(String),
}

impl SensorError {
    pub(crate) fn device(path: impl Into<PathBuf>, source: io::Error) -> Self {
        SensorError::Device {
            path: path.into(),
            source,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            SensorError::Network(_) | SensorError::Device { .. } | SensorError::Disconnected => {
                ErrorCategory::Connectivity
            }
            SensorError::Timeout(_) => ErrorCategory::Timeout,
            SensorError::Protocol(_)
            | SensorError::Measurement(_)
            | SensorError::Incomplete(_) => ErrorCategory::Protocol,
            SensorError::Config(_)
            | SensorError::MissingConfig(_)
            | SensorError::InvalidConfig { .. }
            | SensorError::Telemetry(_) => ErrorCategory::Configuration,
        }
    }
}

impl From<mqttrs::Error> for SensorError {
    fn from(e: mqttrs::Error) -> Self {
        SensorError::Protocol(format!("mqtt packet: {e:?}"))
    }
}

impl From<serde_json::Error> for SensorError {
    fn from(e: serde_json::Error) -> Self {
        SensorError::Protocol(format!("json: {e}"))
    }
}
