//! mediaref-queue - Placeholder resolution
//!
//! Turns the placeholder markers in generated markup into stored assets:
//! 1. [`extract_placeholders`] finds `placeholder://image|video/<description>`
//!    markers
//! 2. [`ResolutionQueue`] resolves them one at a time through a
//!    [`MediaResolver`], isolating failures per item
//! 3. [`ResolutionQueue::replace_document_placeholders`] swaps resolved
//!    markers for `asset-ref://` references

#![warn(unreachable_pub)]

pub mod category;
pub mod error;
pub mod extract;
pub mod queue;
pub mod resolver;

pub use category::infer_category;
pub use error::{QueueError, ResolveError};
pub use extract::{
    extract_placeholders, marker_spans, MarkerSpan, PlaceholderDescriptor, CONTEXT_RADIUS,
    MARKER_SCHEME,
};
pub use queue::{
    allowed_transitions, validate_transition, CompleteCallback, ItemStatus, Priority,
    ProgressCallback, QueueConfig, QueueItem, QueueStats, ResolutionQueue,
};
pub use resolver::{GenerativeImageResolver, KindRouter, MediaResolver, StockMediaResolver};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
