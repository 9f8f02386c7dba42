//! Error types for the Photon relay CLI.
//!
//! CliError wraps CoreError from the shared library and adds CLI-specific variants.

use photon_relay_core::error::CoreError;
use thiserror::Error;

// Re-export core error types so command modules can use them via crate::error
pub use photon_relay_core::error::{CaptureError, ConfigError, ForwardError};

/// Exit codes for the CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const NETWORK_ERROR: i32 = 2;
    pub const CAPTURE_ERROR: i32 = 3;
    pub const INVALID_ARGS: i32 = 4;
    pub const CONFIG_ERROR: i32 = 5;
}

/// Main error type for the CLI
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("No usable capture interfaces (is libpcap/Npcap installed and are you running with capture privileges?)")]
    NoInterfaces,

    #[error("{0}")]
    Other(String),
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Core(e) => match e {
                CoreError::Capture(_) => exit_codes::CAPTURE_ERROR,
                CoreError::Config(_) => exit_codes::CONFIG_ERROR,
                CoreError::Forward(_) => exit_codes::NETWORK_ERROR,
                CoreError::Io(_) => exit_codes::GENERAL_ERROR,
                CoreError::Other(_) => exit_codes::GENERAL_ERROR,
            },
            CliError::Io(_) => exit_codes::GENERAL_ERROR,
            CliError::InvalidArgument(_) => exit_codes::INVALID_ARGS,
            CliError::NoInterfaces => exit_codes::CAPTURE_ERROR,
            CliError::Other(_) => exit_codes::GENERAL_ERROR,
        }
    }
}

// Conversions from core error subtypes to CliError
impl From<CaptureError> for CliError {
    fn from(e: CaptureError) -> Self {
        match e {
            CaptureError::NoDevices => CliError::NoInterfaces,
            other => CliError::Core(CoreError::Capture(other)),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Core(CoreError::Config(e))
    }
}

impl From<ForwardError> for CliError {
    fn from(e: ForwardError) -> Self {
        CliError::Core(CoreError::Forward(e))
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::NoInterfaces.exit_code(), exit_codes::CAPTURE_ERROR);
        assert_eq!(
            CliError::InvalidArgument("x".to_string()).exit_code(),
            exit_codes::INVALID_ARGS
        );
        let config: CliError = ConfigError::Invalid {
            field: "lock_score".to_string(),
            reason: "must be greater than zero".to_string(),
        }
        .into();
        assert_eq!(config.exit_code(), exit_codes::CONFIG_ERROR);
        let forward: CliError = ForwardError::NoTargets.into();
        assert_eq!(forward.exit_code(), exit_codes::NETWORK_ERROR);
    }

    #[test]
    fn test_no_devices_maps_to_no_interfaces() {
        let err: CliError = CaptureError::NoDevices.into();
        assert!(matches!(err, CliError::NoInterfaces));
    }
}
