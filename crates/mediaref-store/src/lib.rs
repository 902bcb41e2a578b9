//! mediaref-store - Persistent Asset Store
//!
//! Maps opaque [`AssetToken`]s to resolved media payloads:
//! - Two namespaces (images, videos), one [`AssetStore`] each
//! - Age-based expiry, checked lazily on read and enforced by sweeps
//! - Oldest-first eviction when a namespace outgrows its soft cap
//! - Payload digest index for deduplication
//! - Pluggable [`StorageBackend`] (memory, directory of JSON files)
//!
//! # Example
//!
//! ```rust,ignore
//! use mediaref_store::{AssetStore, AssetToken, MediaKind, MemoryBackend, StoreConfig, StoredAsset, system_clock};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let clock = system_clock();
//! let store = AssetStore::open(
//!     Arc::new(MemoryBackend::new()),
//!     MediaKind::Image,
//!     StoreConfig::for_kind(MediaKind::Image),
//!     clock.clone(),
//! )
//! .await?;
//!
//! let token = AssetToken::mint(MediaKind::Image);
//! store.put(StoredAsset::new(token.clone(), "data:image/png;base64,AAAA", clock.now())).await?;
//! assert!(store.contains(&token));
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod asset;
pub mod backend;
pub mod clock;
pub mod error;
pub mod store;

pub use asset::{AssetToken, MediaKind, PayloadDigest, StoredAsset};
pub use backend::{FileBackend, MemoryBackend, StorageBackend};
pub use clock::{system_clock, Clock, ManualClock, SharedClock, SystemClock};
pub use error::{PersistenceError, PersistenceResult, TokenError};
pub use store::{AssetStore, StoreConfig, SweepReport};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
