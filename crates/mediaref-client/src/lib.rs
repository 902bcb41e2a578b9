//! mediaref-client - Provider access for media resolution
//!
//! Wraps the external media providers behind one rate-limited, cached
//! client per role:
//! - [`ProviderClient`]: stock media search (images and videos) plus
//!   rendition downloads
//! - [`GenerationClient`]: prompt-to-image generation
//!
//! Identical searches within the cache TTL are answered locally without
//! touching the request budget. The budget is tracked per client instance
//! and corrected from provider rate-limit headers.
//!
//! # Example
//!
//! ```rust,ignore
//! use mediaref_client::{ClientConfig, ProviderClient, ReqwestTransport, SearchParams};
//! use mediaref_store::system_clock;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = Arc::new(ReqwestTransport::new(Duration::from_secs(15))?);
//! let client = ProviderClient::new(
//!     ClientConfig::new("https://pixabay.com/api", "KEY"),
//!     transport,
//!     system_clock(),
//! );
//! let page = client.search(&SearchParams::image("red bicycle")).await?;
//! println!("{} hits", page.items.len());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod cache;
pub mod client;
pub mod error;
pub mod generation;
pub mod params;
pub mod rate_limit;
pub mod response;
pub mod transport;

pub use cache::{CacheEntry, ResponseCache};
pub use client::{ClientConfig, ProviderClient};
pub use error::{ClientError, ClientResult, TransportError};
pub use generation::{GeneratedImage, GenerationClient, GenerationConfig};
pub use params::{
    Category, ImageType, Order, Orientation, SearchParams, VideoType, DEFAULT_MAX_QUERY_LEN,
};
pub use rate_limit::{RateLimitHeaders, RateLimitPolicy, RateLimitState, RateLimiter};
pub use response::{mime_from_url, FetchedAsset, MediaHit, SearchResponse, RESPONSE_SHAPE_VERSION};
pub use mediaref_store::MediaKind;
pub use transport::{HttpMethod, ProviderReply, ProviderRequest, ReqwestTransport, Transport};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for common imports
pub mod prelude {
    pub use crate::{
        ClientConfig, ClientError, ClientResult, GenerationClient, MediaHit, ProviderClient,
        SearchParams, SearchResponse, Transport,
    };
}
