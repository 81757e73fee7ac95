//! # Error Types
//!
//! Custom error types for DAQ Stream using `thiserror`.
//!
//! The acquisition pipeline itself has no error channel: its handlers are
//! infallible. These errors cover the host side (configuration, the serial
//! link, frame decoding on the receiver, telemetry files).

use thiserror::Error;

/// Main error type for DAQ Stream
#[derive(Debug, Error)]
pub enum DaqError {
    /// Frame decoding and validation errors
    #[error("Frame error: {0}")]
    Frame(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Serial link errors
    #[error("Serial error: {0}")]
    Serial(String),

    /// No usable serial device at any of the given paths
    #[error("Serial port not found (tried: {0})")]
    SerialPortNotFound(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Telemetry serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for DAQ Stream
pub type Result<T> = std::result::Result<T, DaqError>;
