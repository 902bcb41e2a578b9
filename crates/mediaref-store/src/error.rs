//! Error types for the asset store
//!
//! Store writes return [`PersistenceError`] explicitly so callers decide
//! whether a failed write is worth surfacing. A failed write never removes
//! the asset from the in-memory view.

/// Persistence failures
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// Backend quota exceeded
    #[error("persistence full: needed {needed} bytes, quota {quota} bytes")]
    Full {
        /// Bytes the write required
        needed: usize,
        /// Bytes the backend allows
        quota: usize,
    },

    /// I/O failure in the backend
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failure
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Persisted namespace could not be interpreted
    #[error("corrupt namespace {namespace}: {reason}")]
    Corrupt {
        /// Namespace name
        namespace: String,
        /// What was wrong
        reason: String,
    },
}

impl PersistenceError {
    /// Check if an eviction sweep may make a retry succeed
    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        matches!(self, Self::Full { .. })
    }
}

/// Token parse failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// Prefix is neither `img_` nor `vid_`
    #[error("unknown token prefix: {0}")]
    UnknownPrefix(String),

    /// Body is not a ULID
    #[error("malformed token body: {0}")]
    MalformedBody(String),
}

/// Result alias for store operations
pub type PersistenceResult<T> = Result<T, PersistenceError>;
