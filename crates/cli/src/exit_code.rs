//! Process exit codes
//!
//! Scripts can rely on these values; they do not change between releases.

use upyun_core::{Error, is_retryable_error};

/// Exit status of the `uy` binary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Operation completed
    Success = 0,
    /// Unclassified failure
    GeneralError = 1,
    /// Bad arguments or configuration
    UsageError = 2,
    /// The service could not be reached
    NetworkError = 3,
    /// The service rejected the credentials
    AuthError = 4,
    /// Profile, file or directory does not exist
    NotFound = 5,
    /// Stopped by Ctrl-C
    Interrupted = 130,
}

impl ExitCode {
    /// Classify a library error
    pub fn from_error(error: &Error) -> Self {
        match error {
            e if is_retryable_error(e) => ExitCode::NetworkError,
            Error::Status { status: 401 | 403, .. } => ExitCode::AuthError,
            Error::Status { status: 404, .. } | Error::ProfileNotFound(_) => ExitCode::NotFound,
            Error::Config(_) | Error::InvalidPath(_) => ExitCode::UsageError,
            Error::Cancelled => ExitCode::Interrupted,
            _ => ExitCode::GeneralError,
        }
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code as u8)
    }
}
