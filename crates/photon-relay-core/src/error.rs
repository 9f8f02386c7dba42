//! Error types for the Photon relay core.

use thiserror::Error;

/// Core error type for shared operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Forwarder error: {0}")]
    Forward(#[from] ForwardError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Capture source errors.
///
/// Everything except `NoDevices` is scoped to one interface and never stops
/// the rest of the pipeline.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("No capture interfaces available")]
    NoDevices,

    #[error("Failed to list interfaces: {0}")]
    DeviceList(String),

    #[error("Failed to open {device}: {message}")]
    Open { device: String, message: String },

    #[error("Failed to set filter on {device}: {message}")]
    Filter { device: String, message: String },

    #[error("Capture failed on {device}: {message}")]
    Read { device: String, message: String },
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: String, reason: String },

    #[error("Invalid interface pattern: {0}")]
    InvalidPattern(String),

    #[error("Config already exists: {0}")]
    AlreadyExists(String),
}

impl ConfigError {
    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Forwarder setup errors. Per-datagram send failures are only logged.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("No forward target could be resolved")]
    NoTargets,

    #[error("Failed to bind forwarder socket: {0}")]
    Bind(std::io::Error),
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_error_display() {
        let err = CaptureError::Open {
            device: "eth0".to_string(),
            message: "permission denied".to_string(),
        };
        assert_eq!(format!("{}", err), "Failed to open eth0: permission denied");
    }

    #[test]
    fn test_core_error_from_config_error() {
        let err: CoreError = ConfigError::invalid("lock_score", "must be positive").into();
        assert!(format!("{}", err).contains("lock_score"));
        assert!(matches!(err, CoreError::Config(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_no_devices_is_capture_error() {
        let err: CoreError = CaptureError::NoDevices.into();
        assert_eq!(format!("{}", err), "Capture error: No capture interfaces available");
    }
}
