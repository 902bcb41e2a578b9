//! Error types for the reference codec
//!
//! Document-level operations never surface these; a failing match is left
//! untouched and counted. They surface from direct calls such as
//! [`ReferenceCodec::store_inline`](crate::ReferenceCodec::store_inline).

use mediaref_store::PersistenceError;

/// Codec errors
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Payload is not a `data:<kind>/<subtype>;base64,<body>` URI with a
    /// decodable body
    #[error("malformed inline payload: {0}")]
    MalformedPayload(String),

    /// Nothing to store
    #[error("empty payload")]
    EmptyPayload,

    /// Asset store failure
    #[error("persistence: {0}")]
    Persistence(#[from] PersistenceError),
}

impl CodecError {
    /// Check if the payload itself is at fault
    #[inline]
    #[must_use]
    pub fn is_payload_error(&self) -> bool {
        matches!(self, Self::MalformedPayload(_) | Self::EmptyPayload)
    }
}

/// Result alias for codec operations
pub type CodecResult<T> = Result<T, CodecError>;
