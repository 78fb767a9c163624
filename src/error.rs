//! Error types for lingua-coach

use thiserror::Error;

/// Result type alias for lingua-coach operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the practice engine
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid user input, rejected before any external call
    #[error("invalid input: {0}")]
    Validation(String),

    /// Course generation error
    #[error("generation error: {0}")]
    Generation(String),

    /// Speech synthesis error
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// Image generation error
    #[error("illustration error: {0}")]
    Illustration(String),

    /// Pronunciation critique error
    #[error("critique error: {0}")]
    Critique(String),

    /// Speech capture error
    #[error("capture error: {0}")]
    Capture(String),

    /// Speech recognition is not available on this platform
    #[error("speech recognition unsupported: {0}")]
    CaptureUnsupported(String),

    /// Microphone permission was denied; capture is disabled for the session
    #[error("microphone permission denied")]
    PermissionDenied,

    /// Audio device error
    #[error("audio error: {0}")]
    Audio(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Whether this error permanently disables a feature for the session,
    /// as opposed to a transient failure with a degraded fallback.
    #[must_use]
    pub const fn is_capability(&self) -> bool {
        matches!(self, Self::CaptureUnsupported(_) | Self::PermissionDenied)
    }
}
