//! Error types for the telemetry store and subscriptions.

use crate::subscriptions::ErrorCode;
use thiserror::Error;

/// Main error type for telemetry operations.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Device already exists: {0}")]
    DeviceExists(String),

    #[error("Interface already exists: {device}:{interface}")]
    InterfaceExists { device: String, interface: String },

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Interface not found: {device}:{interface}")]
    InterfaceNotFound { device: String, interface: String },

    #[error("Invalid target '{0}'; expected DEVICE:INTERFACE")]
    InvalidTarget(String),

    #[error("Counter overflow on {device}:{interface}")]
    CounterOverflow { device: String, interface: String },

    #[error("Response stream closed")]
    StreamClosed,

    #[error("Subscription cancelled")]
    Cancelled,

    #[error("Subscription worker panicked")]
    WorkerPanicked,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl TelemetryError {
    /// Wire error code for failures that are reported on the response stream.
    ///
    /// Returns `None` for errors that never reach a caller as a response:
    /// transport, lifecycle and configuration failures.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            TelemetryError::InvalidTarget(_) => Some(ErrorCode::InvalidFormat),
            TelemetryError::DeviceNotFound(_) => Some(ErrorCode::DoesNotExist),
            TelemetryError::InterfaceNotFound { .. } => Some(ErrorCode::NotFound),
            TelemetryError::CounterOverflow { .. } => Some(ErrorCode::NotActive),
            TelemetryError::Io(_)
            | TelemetryError::DeviceExists(_)
            | TelemetryError::InterfaceExists { .. }
            | TelemetryError::StreamClosed
            | TelemetryError::Cancelled
            | TelemetryError::WorkerPanicked
            | TelemetryError::InvalidConfig(_)
            | TelemetryError::Serialization(_) => None,
        }
    }

    /// True for the "already exists" family.
    pub fn is_already_exists(&self) -> bool {
        matches!(
            self,
            TelemetryError::DeviceExists(_) | TelemetryError::InterfaceExists { .. }
        )
    }
}

impl From<serde_json::Error> for TelemetryError {
    fn from(e: serde_json::Error) -> Self {
        TelemetryError::Serialization(e.to_string())
    }
}

/// Result type for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;
