//! Error types for provider access
//!
//! The taxonomy callers act on:
//! - `RateLimited`: retry after the indicated delay
//! - `InvalidParameters`: caller error, do not retry
//! - `ProviderUnauthorized`: configuration problem, surface to the user
//! - `ProviderError`: transient, retry with backoff

/// Provider client errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Request budget exhausted for the current window
    #[error("rate limited: retry in {retry_after_secs}s")]
    RateLimited {
        /// Seconds until the window resets
        retry_after_secs: u64,
    },

    /// Request rejected as malformed
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// Credentials missing or rejected
    #[error("provider unauthorized: {0}")]
    ProviderUnauthorized(String),

    /// Provider or network failure
    #[error("provider error{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    ProviderError {
        /// HTTP status, `None` for network failures
        status: Option<u16>,
        /// Failure detail
        message: String,
    },

    /// Provider answered with a body that does not fit the response shape
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),
}

impl ClientError {
    /// Check if retrying later can succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::ProviderError { .. })
    }

    /// Check if the error is a configuration problem
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ProviderUnauthorized(_))
    }

    /// Suggested delay before retrying, if any
    #[inline]
    #[must_use]
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        }
    }

    /// Create provider error
    #[inline]
    pub fn provider(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::ProviderError {
            status,
            message: message.into(),
        }
    }
}

/// Transport-level failures, before any HTTP status exists
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Connection, DNS, TLS or body read failure
    #[error("network error: {0}")]
    Network(String),

    /// Request exceeded the configured timeout
    #[error("request timed out")]
    Timeout,

    /// Request could not be built
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl From<TransportError> for ClientError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::InvalidRequest(msg) => Self::InvalidParameters(msg),
            other => Self::provider(None, other.to_string()),
        }
    }
}

/// Result alias for client operations
pub type ClientResult<T> = Result<T, ClientError>;
