//! mediaref-core - Media placeholder pipeline
//!
//! Ties the workspace together:
//! - [`PipelineConfig`]: TOML configuration with environment overrides
//! - [`MediaPipeline`]: stores, provider clients, codec and resolvers
//!   built from one config
//! - the `mediaref` binary
//!
//! # Example
//!
//! ```rust,ignore
//! use mediaref_core::{MediaPipeline, PipelineConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PipelineConfig::new().with_provider("https://pixabay.com/api", "KEY");
//! let pipeline = MediaPipeline::from_config(config).await?;
//!
//! let html = r#"<img src="placeholder://image/a%20red%20bicycle">"#;
//! let resolved = pipeline.resolve_document(html, None).await;
//! println!("{}", resolved.document);
//!
//! // Later, at render time
//! let renderable = pipeline.expand(&resolved.document);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod config;
pub mod error;
pub mod pipeline;

pub use config::{
    CodecSection, GenerationSection, PipelineConfig, ProviderSection, QueueSection, StoreSection,
    ENV_API_KEY, ENV_GENERATION_API_KEY,
};
pub use error::{ConfigError, PipelineError, PipelineResult};
pub use pipeline::{MediaPipeline, ResolvedDocument};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for common imports
pub mod prelude {
    pub use crate::{MediaPipeline, PipelineConfig, PipelineError, ResolvedDocument};
    pub use mediaref_codec::CompressReport;
    pub use mediaref_queue::{ItemStatus, QueueItem};
}
