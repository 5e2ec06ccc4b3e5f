//! Error types for the Bloom companion

use thiserror::Error;

/// Result type alias for companion operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in a companion session
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Speech capture error
    #[error(transparent)]
    Capture(#[from] CaptureError),

    /// Audio framing error
    #[error(transparent)]
    Framing(#[from] FramingError),

    /// Reply generation error
    #[error("generation error: {0}")]
    Generation(String),

    /// Speech recognition error
    #[error("recognition error: {0}")]
    Recognition(String),

    /// Speech synthesis error
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// Message safety classification error
    #[error("safety error: {0}")]
    Safety(String),

    /// Audio playback error
    #[error("playback error: {0}")]
    Playback(String),

    /// Utterance was blank or whitespace-only
    #[error("empty utterance")]
    EmptyUtterance,

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Errors raised when starting speech capture
///
/// All variants are terminal for that capture attempt; the session returns
/// to idle and no retry is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    /// The platform denied microphone access
    #[error("microphone access denied")]
    PermissionDenied,

    /// No capture device is available
    #[error("no capture device available")]
    NoDevice,

    /// Capture is already active
    #[error("capture already active")]
    AlreadyActive,
}

/// Errors raised by the audio framer
///
/// Indicates malformed upstream audio; treated as a synthesis failure for
/// the affected turn.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FramingError {
    /// Sample buffer is empty, misaligned, or uses unsupported parameters
    #[error("invalid sample data: {0}")]
    InvalidSampleData(String),
}
