//! Dialog service error types.

use thiserror::Error;

/// Errors that can occur while talking to the dialog service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NetError {
    /// Connection refused, DNS failure, reset mid-request.
    #[error("Dialog service unreachable: {0}")]
    Unreachable(String),

    /// No complete response within the request timeout.
    #[error("Dialog service request timed out after {0}ms")]
    Timeout(u64),

    /// The service answered with a non-success status.
    #[error("Dialog service returned HTTP {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// The response body did not match the expected schema.
    #[error("Malformed dialog service response: {0}")]
    Malformed(String),

    /// The HTTP client could not be built.
    #[error("Dialog client configuration error: {0}")]
    Config(String),

    /// No runtime is available to carry the request.
    #[error("Dispatcher is not running: {0}")]
    NotRunning(String),
}

/// Coarse classification used by callers that only care whether the
/// service could be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Transport-level failure, timeout or error status.
    Unreachable,
    /// The service answered but the payload was unusable.
    Malformed,
}

impl NetError {
    /// Coarse classification of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Malformed(_) => ErrorKind::Malformed,
            Self::Unreachable(_)
            | Self::Timeout(_)
            | Self::Status { .. }
            | Self::Config(_)
            | Self::NotRunning(_) => ErrorKind::Unreachable,
        }
    }

    /// Classify a transport error, reporting timeouts with the configured limit.
    #[must_use]
    pub fn from_reqwest(err: &reqwest::Error, timeout_ms: u64) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout_ms)
        } else if err.is_decode() {
            Self::Malformed(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Status {
                status: status.as_u16(),
            }
        } else {
            Self::Unreachable(err.to_string())
        }
    }
}

impl From<reqwest::Error> for NetError {
    fn from(err: reqwest::Error) -> Self {
        Self::from_reqwest(&err, 0)
    }
}

impl From<serde_json::Error> for NetError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_malformed_is_malformed() {
        assert_eq!(NetError::Malformed("x".into()).kind(), ErrorKind::Malformed);
        assert_eq!(NetError::Timeout(10_000).kind(), ErrorKind::Unreachable);
        assert_eq!(NetError::Status { status: 500 }.kind(), ErrorKind::Unreachable);
        assert_eq!(NetError::Unreachable("refused".into()).kind(), ErrorKind::Unreachable);
    }

    #[test]
    fn json_errors_are_malformed() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        assert_eq!(NetError::from(err).kind(), ErrorKind::Malformed);
    }
}
