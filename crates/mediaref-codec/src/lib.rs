//! mediaref-codec - Reference compression for documents
//!
//! Keeps editable documents small by swapping large inline `data:` payloads
//! for short `asset-ref://<token>` references backed by the asset stores,
//! and reconstitutes them for rendering.
//!
//! Guarantees:
//! - `expand(compress(d)) == d` for documents holding only inline payloads,
//!   as long as nothing was evicted in between
//! - `expand` never fails; unknown tokens become a deterministic fallback
//!   asset that names the token
//! - One token per distinct payload per namespace
//!
//! # Example
//!
//! ```rust,ignore
//! let compressed = codec.compress(&doc).await;
//! save(&compressed);
//! render(&codec.expand(&compressed));
//! ```

#![warn(unreachable_pub)]

pub mod codec;
pub mod error;
pub mod fallback;
pub mod payload;
pub mod tokenizer;

pub use codec::{CodecConfig, CompressReport, ReferenceCodec};
pub use error::{CodecError, CodecResult};
pub use fallback::{fallback_payload, fallback_token, is_fallback_payload};
pub use payload::{
    parse_reference, reference_for, InlinePayload, DEFAULT_MIN_INLINE_LEN, REFERENCE_SCHEME,
};
pub use tokenizer::{splice, tokenize, tokenize_with, Span, SpanKind};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
