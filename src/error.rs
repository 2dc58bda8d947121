//! Error types for sketchbooth

use thiserror::Error;

/// Result type alias for sketchbooth operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in sketchbooth
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (bad sensitivity, missing or corrupt label file)
    #[error("configuration error: {0}")]
    Config(String),

    /// A required device (microphone, camera) could not be opened
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Caller passed an argument outside the accepted domain
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Printer transport failure
    #[error("printer error: {0}")]
    Printer(String),

    /// Audio stream error
    #[error("audio error: {0}")]
    Audio(String),

    /// Camera read error after the device was opened
    #[error("camera error: {0}")]
    Camera(String),

    /// Object detector failure
    #[error("detection error: {0}")]
    Detection(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Image encode/decode error
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

impl Error {
    /// Whether this error must halt the control loop
    ///
    /// Everything else is contained to the capture that raised it.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::DeviceUnavailable(_))
    }
}
