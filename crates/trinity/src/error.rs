//! Error types for the Trinity facade

use thiserror::Error;
use trinity_core::{DeviceError, RawDataError};
use trinity_reader::{FieldError, ReaderError};
use trinity_resource::ResourceError;

/// Every error a Trinity context can report
#[derive(Debug, Error)]
pub enum Error {
    /// Device call failed
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// Constant block misuse
    #[error(transparent)]
    RawData(#[from] RawDataError),

    /// Resource lookup or preparation failed
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// Object file could not be read
    #[error(transparent)]
    Reader(#[from] ReaderError),

    /// Object field rejected a value
    #[error(transparent)]
    Field(#[from] FieldError),

    /// Configuration could not be parsed
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Configuration file could not be read
    #[error("Failed to read '{path}': {message}")]
    Io { path: String, message: String },
}

/// Result type for facade operations
pub type Result<T> = std::result::Result<T, Error>;
