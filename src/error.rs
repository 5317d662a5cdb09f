//! Error types for spicerack
//!
//! Defines module-specific error types using thiserror for clear error
//! propagation.

use thiserror::Error;

/// Main error type for the spicerack controller
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Sensor device open/read errors
    #[error("Sensor error: {0}")]
    Sensor(String),

    /// Record store I/O errors (open, seek, copy, splice)
    #[error("Record store error: {0}")]
    Store(String),

    /// Malformed record line or reference table row
    #[error("Parse error: {0}")]
    Parse(String),

    /// Conversion requested before both reference readings were established
    #[error("Not calibrated: {0}")]
    NotCalibrated(String),

    /// File I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type using the spicerack Error
pub type Result<T> = std::result::Result<T, Error>;
