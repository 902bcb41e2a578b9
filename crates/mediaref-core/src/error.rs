//! Error types for the pipeline facade
//!
//! Configuration problems are reported before anything touches the
//! network or the asset stores.

use mediaref_client::TransportError;
use mediaref_store::PersistenceError;
use std::path::PathBuf;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("cannot read config {path}: {source}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config text is not valid TOML for this schema
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config could not be rendered back to TOML
    #[error("cannot render config: {0}")]
    Render(#[from] toml::ser::Error),

    /// A value is out of range
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Dotted key, e.g. `provider.rate_limit.limit`
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Pipeline construction errors
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Bad configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Asset store could not be opened
    #[error("asset store unavailable: {0}")]
    Store(#[from] PersistenceError),

    /// HTTP transport could not be built
    #[error("transport unavailable: {0}")]
    Transport(#[from] TransportError),
}

impl PipelineError {
    /// Check if the user can fix this by editing the config
    #[inline]
    #[must_use]
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;
