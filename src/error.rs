//! Error types for lastwave
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use thiserror::Error;

/// Main error type for lastwave
#[derive(Error, Debug)]
pub enum Error {
    /// Bad or missing data from the media player
    #[error("Player error: {0}")]
    Player(String),

    /// Invalid configuration or timing data (e.g. non-positive track length)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Remote scrobble service errors
    #[error("Remote service error: {0}")]
    Remote(#[from] crate::lastfm::LastfmError),

    /// Preference store errors
    #[error("Preference store error: {0}")]
    Prefs(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type using the lastwave Error
pub type Result<T> = std::result::Result<T, Error>;
