//! Error types for upyun-core
//!
//! A single error enum is shared by every crate in the workspace so that the
//! retry layer can classify failures without knowing where they came from.

use thiserror::Error;

/// Result type alias using the crate's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the UPYUN client
#[derive(Debug, Error)]
pub enum Error {
    /// Transport-level failure (timeout, connection reset, lookup failure)
    #[error("Network error: {0}")]
    Network(String),

    /// Local or transport I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Non-2xx response from the server
    #[error("{message}")]
    Status { status: u16, message: String },

    /// Missing or malformed multipart session token
    #[error("Upload session error: {0}")]
    Session(String),

    /// Listing response carried no cursor header at all
    #[error("Listing response for '{0}' has no cursor header")]
    AmbiguousCursor(String),

    /// Response body could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Profile not found in configuration
    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    /// Invalid key or path
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Operation stopped by its cancellation token
    #[error("Operation cancelled")]
    Cancelled,

    /// General error
    #[error("{0}")]
    General(String),
}

impl Error {
    /// HTTP status code carried by a protocol error
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the server answered 404
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::Config(err.to_string())
    }
}
