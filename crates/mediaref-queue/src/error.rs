//! Error types for placeholder resolution
//!
//! [`ResolveError`] is recorded on the failing queue item and never escapes
//! a batch. [`QueueError`] guards the item state machine.

use crate::queue::ItemStatus;
use mediaref_client::ClientError;
use mediaref_codec::CodecError;
use mediaref_store::MediaKind;

/// Failure to turn one descriptor into a stored asset
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// Search or download failed
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Provider returned no usable hit
    #[error("no results for \"{query}\"")]
    NoResults {
        /// Query that came back empty
        query: String,
    },

    /// Resolved payload could not be stored
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Image generation failed
    #[error("generation failed: {0}")]
    Generation(#[source] ClientError),

    /// Resolver cannot produce this asset class
    #[error("no resolver for {0} assets")]
    Unsupported(MediaKind),
}

impl ResolveError {
    /// Check if a fresh attempt later could succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Client(err) | Self::Generation(err) => err.is_retryable(),
            Self::NoResults { .. } | Self::Codec(_) | Self::Unsupported(_) => false,
        }
    }
}

/// Queue state machine violations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// Transition not in the allowed table
    #[error("illegal transition {from:?} -> {to:?}")]
    IllegalTransition {
        /// Current status
        from: ItemStatus,
        /// Requested status
        to: ItemStatus,
    },
}
