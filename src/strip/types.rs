//! Common types for the strip module

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Why an image source could not be retrieved or decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadCause {
    /// Local file does not exist
    NotFound,
    /// Filesystem or network I/O failure
    Io(String),
    /// HTTP transport failure (DNS, connect, TLS, body read)
    Http(String),
    /// Server answered with a non-success status
    Status(u16),
    /// Malformed `data:` URI or base64 payload
    InvalidDataUri(String),
    /// Bytes were retrieved but are not a decodable image
    Decode(String),
    /// Source exceeds the configured byte limit
    TooLarge { size: u64, limit: u64 },
    /// Load and decode did not finish in time
    Timeout(Duration),
}

impl fmt::Display for LoadCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadCause::NotFound => write!(f, "not found"),
            LoadCause::Io(e) => write!(f, "I/O error: {}", e),
            LoadCause::Http(e) => write!(f, "HTTP error: {}", e),
            LoadCause::Status(code) => write!(f, "HTTP status {}", code),
            LoadCause::InvalidDataUri(e) => write!(f, "invalid data URI: {}", e),
            LoadCause::Decode(e) => write!(f, "decode failed: {}", e),
            LoadCause::TooLarge { size, limit } => {
                write!(f, "source is {} bytes, limit is {}", size, limit)
            }
            LoadCause::Timeout(d) => write!(f, "timed out after {:.1}s", d.as_secs_f64()),
        }
    }
}

/// Strip error types
#[derive(Debug, Error)]
pub enum StripError {
    #[error("Failed to load {source_ref}: {cause}")]
    Load { source_ref: String, cause: LoadCause },

    #[error("Failed to read pixels of {source_ref}: {cause}")]
    Read { source_ref: String, cause: String },

    #[error("Encoding failed: {0}")]
    Encode(String),

    #[error("Processing cancelled")]
    Cancelled,
}

impl StripError {
    pub fn load(source_ref: impl Into<String>, cause: LoadCause) -> Self {
        StripError::Load {
            source_ref: source_ref.into(),
            cause,
        }
    }

    pub fn read(source_ref: impl Into<String>, cause: impl Into<String>) -> Self {
        StripError::Read {
            source_ref: source_ref.into(),
            cause: cause.into(),
        }
    }

    /// Whether the caller should fall back to the original image.
    ///
    /// A cancelled call has no consumer left to show anything to.
    pub fn is_fallback_eligible(&self) -> bool {
        !matches!(self, StripError::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, StripError>;
