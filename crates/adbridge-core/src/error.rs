//! Error types for the ad bridge
//!
//! Two layers of errors live here:
//! - [`Error`]: everything an application-facing call can return
//! - [`DecodeError`]: why a native notification could not be turned into an
//!   [`Event`](crate::codec::Event). Decode errors never reach listeners; the
//!   dispatcher logs and drops the payload.

use thiserror::Error;

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the ad bridge
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors (e.g. an empty app id)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid argument supplied by the caller
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation requires a configured SDK
    #[error("SDK is not configured; call configure() first")]
    NotConfigured,

    /// Operation requires a started SDK
    #[error("SDK is not started; call start() before {0}")]
    NotStarted(&'static str),

    /// A native notification could not be decoded
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The native boundary adapter refused or failed to dispatch a call
    #[error("Native adapter error ({adapter}): {message}")]
    Native {
        /// Adapter name
        adapter: String,
        /// Error message
        message: String,
    },

    /// I/O errors (worker thread spawn, capture files)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a native adapter error
    pub fn native(adapter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Native {
            adapter: adapter.into(),
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

/// Why a native payload failed to decode
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The `callback` tag is not part of the known vocabulary
    #[error("unknown callback tag: {0:?}")]
    UnknownKind(String),

    /// The payload is not a structured object of the expected shape
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// A required key is absent
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// The payload declares a schema version this decoder does not speak
    #[error("unsupported schema version: {0}")]
    UnsupportedVersion(u16),
}
