//! Error types for vireo-player
//!
//! Defines module-specific error types using thiserror for clear error
//! propagation.

use thiserror::Error;

/// Main error type for the vireo-player crate
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Engine process spawn or IPC channel errors
    #[error("Engine error: {0}")]
    Engine(String),

    /// Backend lifecycle or command errors
    #[error("Backend error: {0}")]
    Backend(String),

    /// Operation not supported by the active backend
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Catalog service errors
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Trickplay download or processing errors
    #[error("Trickplay error: {0}")]
    Trickplay(String),

    /// HTTP transfer errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Image decode errors
    #[error("Image decode error: {0}")]
    Image(#[from] image::ImageError),

    /// Wire message encode/decode errors
    #[error("Protocol error: {0}")]
    Protocol(#[from] serde_json::Error),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using the vireo-player Error
pub type Result<T> = std::result::Result<T, Error>;
