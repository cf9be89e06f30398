//! Error types for the resource system

use thiserror::Error;
use trinity_core::DeviceError;

/// Errors produced while fetching raw resource bytes
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Nothing exists at the url
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The underlying storage reported an error
    #[error("I/O error reading '{url}': {message}")]
    Io { url: String, message: String },

    /// The fetch was abandoned before completing
    #[error("Fetch cancelled: {0}")]
    Cancelled(String),
}

/// Resource system errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResourceError {
    /// No factory is registered for the path's extension
    #[error("No loader registered for '{path}' (extension '{extension}')")]
    NoLoader { path: String, extension: String },

    /// Fetching the raw bytes failed
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The raw bytes could not be decoded
    #[error("Failed to parse '{path}': {message}")]
    Parse { path: String, message: String },

    /// The device rejected a handle allocation
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// The resource exists but holds a different kind
    #[error("Resource '{path}' is not a {expected}")]
    WrongKind { path: String, expected: &'static str },
}

impl ResourceError {
    /// Build a parse error for `path`
    pub fn parse(path: &str, message: impl core::fmt::Display) -> Self {
        Self::Parse {
            path: path.to_string(),
            message: message.to_string(),
        }
    }
}

/// Result type for resource operations
pub type Result<T> = std::result::Result<T, ResourceError>;
