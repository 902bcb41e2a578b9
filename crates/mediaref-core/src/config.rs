//! Pipeline configuration
//!
//! Loaded from TOML, every section optional:
//!
//! ```toml
//! [provider]
//! base_url = "https://pixabay.com/api"
//! api_key = "..."            # or MEDIAREF_API_KEY
//!
//! [provider.rate_limit]
//! limit = 100
//! window_secs = 60
//!
//! [generation]               # omit to resolve images from stock search
//! endpoint = "https://api.openai.com/v1/images/generations"
//!
//! [store]
//! dir = ".mediaref"          # omit for an in-memory store
//!
//! [queue]
//! inter_item_delay_ms = 1000
//! ```

use crate::error::ConfigError;
use mediaref_client::{ClientConfig, GenerationConfig, RateLimitPolicy, DEFAULT_MAX_QUERY_LEN};
use mediaref_codec::{CodecConfig, DEFAULT_MIN_INLINE_LEN};
use mediaref_queue::QueueConfig;
use mediaref_store::{MediaKind, StoreConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding `provider.api_key`
pub const ENV_API_KEY: &str = "MEDIAREF_API_KEY";

/// Environment variable overriding `generation.api_key`
pub const ENV_GENERATION_API_KEY: &str = "MEDIAREF_GENERATION_API_KEY";

/// Whole pipeline configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Stock media provider
    pub provider: ProviderSection,
    /// Image generation provider, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation: Option<GenerationSection>,
    /// Asset store limits
    pub store: StoreSection,
    /// Codec thresholds
    pub codec: CodecSection,
    /// Queue pacing
    pub queue: QueueSection,
}

/// `[provider]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSection {
    /// API root
    pub base_url: String,
    /// API key
    pub api_key: String,
    /// HTTP timeout
    pub timeout_secs: u64,
    /// Longest query sent upstream
    pub max_query_len: usize,
    /// Response cache lifetime
    pub cache_ttl_secs: u64,
    /// Response cache entries
    pub cache_capacity: u64,
    /// Request budget
    pub rate_limit: RateLimitPolicy,
}

impl Default for ProviderSection {
    fn default() -> Self {
        Self {
            base_url: "https://pixabay.com/api".to_string(),
            api_key: String::new(),
            timeout_secs: 30,
            max_query_len: DEFAULT_MAX_QUERY_LEN,
            cache_ttl_secs: 24 * 60 * 60,
            cache_capacity: 1_000,
            rate_limit: RateLimitPolicy::default(),
        }
    }
}

/// `[generation]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSection {
    /// Generation endpoint URL
    pub endpoint: String,
    /// Bearer credential
    pub api_key: String,
    /// Model name
    pub model: String,
    /// Image size
    pub size: String,
    /// Request budget
    pub rate_limit: RateLimitPolicy,
}

impl Default for GenerationSection {
    fn default() -> Self {
        let defaults = GenerationConfig::new("https://api.openai.com/v1/images/generations", "");
        Self {
            endpoint: defaults.endpoint,
            api_key: defaults.api_key,
            model: defaults.model,
            size: defaults.size,
            rate_limit: defaults.rate_limit,
        }
    }
}

/// `[store]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    /// Directory for persisted namespaces; memory only when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    /// Image lifetime
    pub image_max_age_secs: u64,
    /// Video lifetime
    pub video_max_age_secs: u64,
    /// Per-namespace soft cap
    pub soft_cap_bytes: usize,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            dir: None,
            image_max_age_secs: 60 * 60,
            video_max_age_secs: 24 * 60 * 60,
            soft_cap_bytes: StoreConfig::DEFAULT_SOFT_CAP,
        }
    }
}

/// `[codec]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecSection {
    /// Shortest base64 body worth compressing
    pub min_inline_len: usize,
}

impl Default for CodecSection {
    fn default() -> Self {
        Self {
            min_inline_len: DEFAULT_MIN_INLINE_LEN,
        }
    }
}

/// `[queue]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSection {
    /// Pause between items in milliseconds
    pub inter_item_delay_ms: u64,
}

impl Default for QueueSection {
    fn default() -> Self {
        Self {
            inter_item_delay_ms: 1_000,
        }
    }
}

fn secs(value: u64) -> chrono::Duration {
    chrono::Duration::seconds(i64::try_from(value).unwrap_or(i64::MAX / 1_000))
}

impl PipelineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With provider endpoint and key
    #[inline]
    #[must_use]
    pub fn with_provider(mut self, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        self.provider.base_url = base_url.into();
        self.provider.api_key = api_key.into();
        self
    }

    /// With provider request budget
    #[inline]
    #[must_use]
    pub fn with_rate_limit(mut self, policy: RateLimitPolicy) -> Self {
        self.provider.rate_limit = policy;
        self
    }

    /// With generation endpoint
    #[inline]
    #[must_use]
    pub fn with_generation(mut self, endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        self.generation = Some(GenerationSection {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            ..GenerationSection::default()
        });
        self
    }

    /// With persisted store directory
    #[inline]
    #[must_use]
    pub fn with_store_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.store.dir = Some(dir.into());
        self
    }

    /// With inter-item delay
    #[inline]
    #[must_use]
    pub fn with_inter_item_delay(mut self, delay: Duration) -> Self {
        self.queue.inter_item_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Parse TOML text, then validate
    ///
    /// # Errors
    /// Returns `ConfigError::Parse` for bad TOML and `ConfigError::Invalid`
    /// for out-of-range values
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file, apply environment overrides, then validate
    ///
    /// # Errors
    /// Returns `ConfigError::Io` if the file cannot be read, otherwise as
    /// [`Self::from_toml_str`]
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = toml::from_str(&text)?;
        config.apply_env();
        config.validate()?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Apply `MEDIAREF_*` overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_from(|name| std::env::var(name).ok());
    }

    /// Apply overrides from `lookup`
    ///
    /// Empty values are ignored.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(key) = get(ENV_API_KEY) {
            self.provider.api_key = key;
        }
        if let (Some(key), Some(generation)) = (get(ENV_GENERATION_API_KEY), self.generation.as_mut()) {
            generation.api_key = key;
        }
    }

    /// Check value ranges
    ///
    /// # Errors
    /// Returns the first offending field
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.base_url.trim().is_empty() {
            return Err(ConfigError::invalid("provider.base_url", "must not be empty"));
        }
        check_policy(&self.provider.rate_limit, "provider.rate_limit.limit", "provider.rate_limit.window_secs")?;
        if self.provider.max_query_len == 0 {
            return Err(ConfigError::invalid("provider.max_query_len", "must be positive"));
        }
        if self.provider.timeout_secs == 0 {
            return Err(ConfigError::invalid("provider.timeout_secs", "must be positive"));
        }
        if let Some(generation) = &self.generation {
            if generation.endpoint.trim().is_empty() {
                return Err(ConfigError::invalid("generation.endpoint", "must not be empty"));
            }
            check_policy(&generation.rate_limit, "generation.rate_limit.limit", "generation.rate_limit.window_secs")?;
        }
        if self.store.image_max_age_secs == 0 || self.store.video_max_age_secs == 0 {
            return Err(ConfigError::invalid("store.max_age_secs", "must be positive"));
        }
        Ok(())
    }

    /// Render as TOML
    ///
    /// # Errors
    /// Returns `ConfigError::Render` if serialization fails
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Copy with credentials masked, for display
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mask = |key: &mut String| {
            if !key.is_empty() {
                *key = "***".to_string();
            }
        };
        let mut copy = self.clone();
        mask(&mut copy.provider.api_key);
        if let Some(generation) = copy.generation.as_mut() {
            mask(&mut generation.api_key);
        }
        copy
    }

    /// Provider client settings
    #[must_use]
    pub fn client_config(&self) -> ClientConfig {
        let p = &self.provider;
        let mut config = ClientConfig::new(p.base_url.clone(), p.api_key.clone())
            .with_rate_limit(p.rate_limit)
            .with_cache_ttl(secs(p.cache_ttl_secs))
            .with_max_query_len(p.max_query_len);
        config.cache_capacity = p.cache_capacity;
        config
    }

    /// Generation client settings, if generation is configured
    #[must_use]
    pub fn generation_config(&self) -> Option<GenerationConfig> {
        self.generation.as_ref().map(|g| {
            GenerationConfig::new(g.endpoint.clone(), g.api_key.clone())
                .with_model(g.model.clone())
                .with_size(g.size.clone())
                .with_rate_limit(g.rate_limit)
        })
    }

    /// Store limits for one asset class
    #[must_use]
    pub fn store_config(&self, kind: MediaKind) -> StoreConfig {
        let max_age = match kind {
            MediaKind::Image => self.store.image_max_age_secs,
            MediaKind::Video => self.store.video_max_age_secs,
        };
        StoreConfig::for_kind(kind)
            .with_max_age(secs(max_age))
            .with_soft_cap(self.store.soft_cap_bytes)
    }

    /// Codec settings
    #[inline]
    #[must_use]
    pub fn codec_config(&self) -> CodecConfig {
        CodecConfig {
            min_inline_len: self.codec.min_inline_len,
        }
    }

    /// Queue settings
    #[inline]
    #[must_use]
    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            inter_item_delay: Duration::from_millis(self.queue.inter_item_delay_ms),
        }
    }

    /// HTTP timeout
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.provider.timeout_secs)
    }
}

fn check_policy(
    policy: &RateLimitPolicy,
    limit_field: &'static str,
    window_field: &'static str,
) -> Result<(), ConfigError> {
    if policy.limit == 0 {
        return Err(ConfigError::invalid(limit_field, "must be positive"));
    }
    if policy.window_secs == 0 {
        return Err(ConfigError::invalid(window_field, "must be positive"));
    }
    Ok(())
}
