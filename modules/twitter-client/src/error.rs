use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TwitterError>;

#[derive(Debug, Error)]
pub enum TwitterError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Tweet not found: {0}")]
    NotFound(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Stream closed by server")]
    StreamClosed,
}

impl TwitterError {
    /// Network failures, rate limits, server errors and dropped streams are
    /// worth another attempt. Client errors are not.
    pub fn is_transient(&self) -> bool {
        match self {
            TwitterError::Network(_) | TwitterError::RateLimited { .. } | TwitterError::StreamClosed => {
                true
            }
            TwitterError::Api { status, .. } => *status >= 500,
            TwitterError::NotFound(_) | TwitterError::Parse(_) => false,
        }
    }

    /// Credentials rejected. The stream cannot recover from this by reconnecting.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, TwitterError::Api { status: 401 | 403, .. })
    }

    /// Vendor backoff hint, when the API supplied one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            TwitterError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TwitterError {
    fn from(err: reqwest::Error) -> Self {
        TwitterError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for TwitterError {
    fn from(err: serde_json::Error) -> Self {
        TwitterError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_and_rate_limits_are_transient() {
        assert!(TwitterError::Api { status: 503, message: String::new() }.is_transient());
        assert!(TwitterError::RateLimited { retry_after: None }.is_transient());
        assert!(TwitterError::Network("reset".into()).is_transient());
        assert!(!TwitterError::Api { status: 400, message: String::new() }.is_transient());
        assert!(!TwitterError::NotFound("1".into()).is_transient());
    }

    #[test]
    fn unauthorized_is_auth_failure() {
        assert!(TwitterError::Api { status: 401, message: String::new() }.is_auth_failure());
        assert!(TwitterError::Api { status: 403, message: String::new() }.is_auth_failure());
        assert!(!TwitterError::Api { status: 500, message: String::new() }.is_auth_failure());
    }
}
