//! Resolution capability
//!
//! A [`MediaResolver`] turns one placeholder into a stored asset token.
//! Both provider roles sit behind it:
//! - [`StockMediaResolver`]: search, pick the first usable hit, download
//! - [`GenerativeImageResolver`]: generate an image from the description
//!
//! [`KindRouter`] sends each descriptor to the resolver for its asset class.

use crate::category::infer_category;
use crate::error::ResolveError;
use crate::extract::PlaceholderDescriptor;
use async_trait::async_trait;
use mediaref_client::{GenerationClient, ProviderClient, SearchParams};
use mediaref_codec::{InlinePayload, ReferenceCodec};
use mediaref_store::{AssetToken, MediaKind};
use std::sync::Arc;

/// Turns a descriptor into a stored asset
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaResolver: Send + Sync {
    /// Resolve one descriptor
    async fn resolve(&self, descriptor: &PlaceholderDescriptor) -> Result<AssetToken, ResolveError>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Stock media search resolver
#[derive(Debug, Clone)]
pub struct StockMediaResolver {
    client: Arc<ProviderClient>,
    codec: Arc<ReferenceCodec>,
}

impl StockMediaResolver {
    /// Create resolver
    #[must_use]
    pub fn new(client: Arc<ProviderClient>, codec: Arc<ReferenceCodec>) -> Self {
        Self { client, codec }
    }

    /// Search params for a descriptor
    #[must_use]
    pub fn params_for(descriptor: &PlaceholderDescriptor) -> SearchParams {
        SearchParams::new(descriptor.description.clone(), descriptor.kind)
            .with_category(infer_category(&descriptor.description, &descriptor.context))
            .with_safe_search(true)
    }
}

#[async_trait]
impl MediaResolver for StockMediaResolver {
    async fn resolve(&self, descriptor: &PlaceholderDescriptor) -> Result<AssetToken, ResolveError> {
        let params = Self::params_for(descriptor);
        let mut page = self.client.search(&params).await?;
        if page.is_empty() && params.category.is_some() {
            // A wrong guess at the category should not hide real results
            tracing::debug!(query = %params.query, "no hits in inferred category, retrying unfiltered");
            page = self.client.search(&params.with_category(None)).await?;
        }
        let hit = page.first().ok_or_else(|| ResolveError::NoResults {
            query: descriptor.description.clone(),
        })?;

        let asset = self.client.fetch_asset(&hit.asset_url, hit.kind).await?;
        let payload = InlinePayload::encode(&asset.content_type, &asset.bytes);
        let token = self
            .codec
            .store_inline(
                descriptor.kind,
                &payload,
                &descriptor.description,
                hit.preview_url.clone(),
            )
            .await?;
        tracing::debug!(id = %descriptor.id, hit = hit.id, token = %token, "resolved from stock search");
        Ok(token)
    }

    fn name(&self) -> &'static str {
        "stock"
    }
}

/// Generative image resolver
#[derive(Debug, Clone)]
pub struct GenerativeImageResolver {
    client: Arc<GenerationClient>,
    codec: Arc<ReferenceCodec>,
}

impl GenerativeImageResolver {
    /// Create resolver
    #[must_use]
    pub fn new(client: Arc<GenerationClient>, codec: Arc<ReferenceCodec>) -> Self {
        Self { client, codec }
    }
}

#[async_trait]
impl MediaResolver for GenerativeImageResolver {
    async fn resolve(&self, descriptor: &PlaceholderDescriptor) -> Result<AssetToken, ResolveError> {
        if descriptor.kind != MediaKind::Image {
            return Err(ResolveError::Unsupported(descriptor.kind));
        }
        let image = self
            .client
            .generate(&descriptor.description)
            .await
            .map_err(ResolveError::Generation)?;
        let token = self
            .codec
            .store_inline(MediaKind::Image, &image.to_data_uri(), &descriptor.description, None)
            .await?;
        tracing::debug!(id = %descriptor.id, token = %token, "resolved by generation");
        Ok(token)
    }

    fn name(&self) -> &'static str {
        "generative"
    }
}

/// Dispatches by asset class
#[derive(Clone)]
pub struct KindRouter {
    images: Arc<dyn MediaResolver>,
    videos: Arc<dyn MediaResolver>,
}

impl std::fmt::Debug for KindRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KindRouter")
            .field("images", &self.images.name())
            .field("videos", &self.videos.name())
            .finish()
    }
}

impl KindRouter {
    /// Route images and videos to separate resolvers
    #[must_use]
    pub fn new(images: Arc<dyn MediaResolver>, videos: Arc<dyn MediaResolver>) -> Self {
        Self { images, videos }
    }

    /// Resolver handling `kind`
    #[must_use]
    pub fn resolver_for(&self, kind: MediaKind) -> &Arc<dyn MediaResolver> {
        match kind {
            MediaKind::Image => &self.images,
            MediaKind::Video => &self.videos,
        }
    }
}

#[async_trait]
impl MediaResolver for KindRouter {
    async fn resolve(&self, descriptor: &PlaceholderDescriptor) -> Result<AssetToken, ResolveError> {
        self.resolver_for(descriptor.kind).resolve(descriptor).await
    }

    fn name(&self) -> &'static str {
        "router"
    }
}
