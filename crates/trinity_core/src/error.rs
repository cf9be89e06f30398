//! Error types for the core library

use thiserror::Error;

/// Errors reported by a [`Device`](crate::Device) implementation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    /// Texture creation was rejected by the backend
    #[error("Texture creation failed: {0}")]
    TextureCreation(String),

    /// Buffer creation was rejected by the backend
    #[error("Buffer creation failed: {0}")]
    BufferCreation(String),

    /// The device is lost and must be recreated
    #[error("Device lost")]
    Lost,
}

/// Errors reported while declaring a [`RawData`](crate::RawData) layout
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RawDataError {
    /// The same element name was declared twice
    #[error("Raw data element already declared: {0}")]
    AlreadyDeclared(String),

    /// `declare` was called after `create`
    #[error("Raw data layout is sealed, cannot declare '{0}' after create")]
    Sealed(String),
}

/// Result type for device operations
pub type DeviceResult<T> = core::result::Result<T, DeviceError>;
