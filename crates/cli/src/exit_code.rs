//! Process exit codes
//!
//! Scripts can rely on these values staying stable across releases.

/// Exit code reported by `nb`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    /// Invalid arguments or configuration
    UsageError = 2,
    /// Connection failure, timeout or provider 5xx
    NetworkError = 3,
    /// Rejected credentials or denied access
    AuthError = 4,
    NotFound = 5,
    /// The resource exists or is not empty
    Conflict = 6,
}

/// Command-line misuse detected before any request is sent
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct UsageError(pub String);

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn from_i32(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Success),
            1 => Some(Self::GeneralError),
            2 => Some(Self::UsageError),
            3 => Some(Self::NetworkError),
            4 => Some(Self::AuthError),
            5 => Some(Self::NotFound),
            6 => Some(Self::Conflict),
            _ => None,
        }
    }

    /// Exit code for a failed command, from the first recognised cause
    pub fn from_error(error: &anyhow::Error) -> Self {
        for cause in error.chain() {
            if cause.downcast_ref::<UsageError>().is_some() {
                return Self::UsageError;
            }
            if let Some(err) = cause.downcast_ref::<nb_core::Error>() {
                return Self::from_i32(err.exit_code()).unwrap_or(Self::GeneralError);
            }
        }
        Self::GeneralError
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code.as_i32() as u8)
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Context;

    use super::*;

    #[test]
    fn test_round_trip_codes() {
        for code in 0..=6 {
            assert_eq!(ExitCode::from_i32(code).unwrap().as_i32(), code);
        }
        assert_eq!(ExitCode::from_i32(42), None);
    }

    #[test]
    fn test_from_provider_errors() {
        let not_found = anyhow::Error::new(nb_core::Error::status(&[200], 404, ""));
        assert_eq!(ExitCode::from_error(&not_found), ExitCode::NotFound);

        let conflict = anyhow::Error::new(nb_core::Error::status(&[204], 409, "BucketNotEmpty"));
        assert_eq!(ExitCode::from_error(&conflict), ExitCode::Conflict);

        let auth = anyhow::Error::new(nb_core::Error::Auth("bad key".to_string()));
        assert_eq!(ExitCode::from_error(&auth), ExitCode::AuthError);
    }

    #[test]
    fn test_context_keeps_cause() {
        let result: Result<(), nb_core::Error> =
            Err(nb_core::Error::Network("connection reset".to_string()));
        let err = result.context("Failed to list buckets").unwrap_err();
        assert_eq!(ExitCode::from_error(&err), ExitCode::NetworkError);
    }

    #[test]
    fn test_usage_and_unknown_errors() {
        let usage = anyhow::Error::new(UsageError("missing key".to_string()));
        assert_eq!(ExitCode::from_error(&usage), ExitCode::UsageError);
        assert_eq!(
            ExitCode::from_error(&anyhow::anyhow!("something odd")),
            ExitCode::GeneralError
        );
    }
}
