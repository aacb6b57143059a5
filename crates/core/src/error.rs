//! Error types for nimbus
//!
//! Every request method, model operation and backend returns [`Result`].
//! Unexpected HTTP statuses carry both the expected and the actual status
//! together with the raw response body, on real and mocked paths alike.

use thiserror::Error;

/// Result type alias using the nimbus error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by nimbus
#[derive(Debug, Error)]
pub enum Error {
    /// The provider answered with a status the request did not expect
    #[error("Unexpected status {actual} (expected {expected:?}): {body}")]
    Status {
        expected: Vec<u16>,
        actual: u16,
        body: String,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// The operation is not valid for the model's current lifecycle state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    General(String),
}

impl Error {
    /// Build a status error from the expected set and the actual response
    pub fn status(expected: &[u16], actual: u16, body: impl Into<String>) -> Self {
        Error::Status {
            expected: expected.to_vec(),
            actual,
            body: body.into(),
        }
    }

    /// HTTP status carried by this error, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Status { actual, .. } => Some(*actual),
            _ => None,
        }
    }

    /// Raw response body carried by a status error
    pub fn body(&self) -> Option<&str> {
        match self {
            Error::Status { body, .. } => Some(body),
            _ => None,
        }
    }

    /// True for a 404 status or an explicit not-found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_) | Error::Status { actual: 404, .. })
    }

    /// Process exit code matching the CLI's exit code table
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Status { actual, .. } => match actual {
                401 | 403 => 4,
                404 => 5,
                409 => 6,
                500..=599 => 3,
                _ => 1,
            },
            Error::Network(_) => 3,
            Error::Auth(_) => 4,
            Error::NotFound(_) | Error::ProfileNotFound(_) => 5,
            Error::Conflict(_) => 6,
            Error::Config(_) => 2,
            _ => 1,
        }
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

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Parse(err.to_string())
    }
}
