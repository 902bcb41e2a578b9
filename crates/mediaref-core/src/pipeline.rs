//! Pipeline facade
//!
//! Wires one provider client, the asset stores and the codec together
//! and runs a document through the full cycle:
//!
//! ```text
//! extract markers -> enqueue -> resolve one by one -> swap markers for
//! references -> compress leftover inline payloads
//! ```

use crate::config::PipelineConfig;
use crate::error::PipelineResult;
use mediaref_client::{GenerationClient, ProviderClient, ReqwestTransport, Transport};
use mediaref_codec::{CodecResult, CompressReport, ReferenceCodec};
use mediaref_queue::{
    extract_placeholders, GenerativeImageResolver, KindRouter, MediaResolver, Priority,
    ProgressCallback, QueueItem, QueueStats, ResolutionQueue, StockMediaResolver,
};
use mediaref_store::{
    system_clock, AssetStore, FileBackend, MediaKind, MemoryBackend, SharedClock,
    StorageBackend, SweepReport,
};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Outcome of [`MediaPipeline::resolve_document`]
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedDocument {
    /// Rewritten, compressed document
    pub document: String,
    /// Final state of every placeholder
    pub items: Vec<QueueItem>,
    /// Compression counts for the final pass
    pub report: CompressReport,
}

impl ResolvedDocument {
    /// Per-status counts
    #[must_use]
    pub fn stats(&self) -> QueueStats {
        QueueStats::from_items(&self.items)
    }

    /// Check if every placeholder resolved
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.stats().failed == 0
    }
}

/// End-to-end media placeholder pipeline
pub struct MediaPipeline {
    config: PipelineConfig,
    client: Arc<ProviderClient>,
    generator: Option<Arc<GenerationClient>>,
    codec: Arc<ReferenceCodec>,
    resolver: Arc<dyn MediaResolver>,
    clock: SharedClock,
}

impl fmt::Debug for MediaPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaPipeline")
            .field("client", &self.client)
            .field("generation", &self.generator.is_some())
            .field("resolver", &self.resolver.name())
            .finish_non_exhaustive()
    }
}

impl MediaPipeline {
    /// Build the pipeline over real HTTP and the system clock
    ///
    /// # Errors
    /// Returns config validation failures, transport build failures and
    /// store open failures
    pub async fn from_config(config: PipelineConfig) -> PipelineResult<Self> {
        config.validate()?;
        let transport = Arc::new(ReqwestTransport::new(config.timeout())?);
        Self::with_parts(config, transport, system_clock()).await
    }

    /// Build the pipeline over an injected transport and clock
    ///
    /// # Errors
    /// As [`Self::from_config`], minus transport construction
    pub async fn with_parts(
        config: PipelineConfig,
        transport: Arc<dyn Transport>,
        clock: SharedClock,
    ) -> PipelineResult<Self> {
        config.validate()?;

        let backend: Arc<dyn StorageBackend> = match &config.store.dir {
            Some(dir) => Arc::new(FileBackend::new(dir.clone())),
            None => Arc::new(MemoryBackend::new()),
        };
        let images = AssetStore::open(
            backend.clone(),
            MediaKind::Image,
            config.store_config(MediaKind::Image),
            clock.clone(),
        )
        .await?;
        let videos = AssetStore::open(
            backend,
            MediaKind::Video,
            config.store_config(MediaKind::Video),
            clock.clone(),
        )
        .await?;
        let codec = Arc::new(ReferenceCodec::new(
            Arc::new(images),
            Arc::new(videos),
            config.codec_config(),
            clock.clone(),
        ));

        let client = Arc::new(ProviderClient::new(
            config.client_config(),
            transport.clone(),
            clock.clone(),
        ));
        let stock: Arc<dyn MediaResolver> =
            Arc::new(StockMediaResolver::new(client.clone(), codec.clone()));

        let generator = config
            .generation_config()
            .map(|g| Arc::new(GenerationClient::new(g, transport, clock.clone())));
        let images: Arc<dyn MediaResolver> = match &generator {
            Some(generator) => Arc::new(GenerativeImageResolver::new(generator.clone(), codec.clone())),
            None => stock.clone(),
        };
        let resolver: Arc<dyn MediaResolver> = Arc::new(KindRouter::new(images, stock));

        tracing::info!(
            provider = %config.provider.base_url,
            generation = generator.is_some(),
            persisted = config.store.dir.is_some(),
            "pipeline ready"
        );

        Ok(Self {
            config,
            client,
            generator,
            codec,
            resolver,
            clock,
        })
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Stock provider client
    #[inline]
    #[must_use]
    pub fn client(&self) -> &Arc<ProviderClient> {
        &self.client
    }

    /// Generation client, if configured
    #[inline]
    #[must_use]
    pub fn generator(&self) -> Option<&Arc<GenerationClient>> {
        self.generator.as_ref()
    }

    /// Reference codec
    #[inline]
    #[must_use]
    pub fn codec(&self) -> &Arc<ReferenceCodec> {
        &self.codec
    }

    /// Fresh queue over this pipeline's resolver
    #[must_use]
    pub fn queue(&self) -> ResolutionQueue {
        ResolutionQueue::new(
            self.resolver.clone(),
            self.config.queue_config(),
            self.clock.clone(),
        )
    }

    /// Resolve every placeholder in `doc` and compress the result
    ///
    /// Each call runs its own batch. Failed placeholders keep their markers.
    pub async fn resolve_document(
        &self,
        doc: &str,
        progress: Option<ProgressCallback>,
    ) -> ResolvedDocument {
        let mut queue = self.queue();
        if let Some(progress) = progress {
            queue = queue.on_progress(move |index, total, item| progress(index, total, item));
        }

        let descriptors = extract_placeholders(doc);
        tracing::info!(placeholders = descriptors.len(), "resolving document");
        queue.enqueue_all(descriptors, Priority::Medium);
        queue.sort_by_priority();
        let items = queue.process_queue().await;

        let rewritten = queue.replace_document_placeholders(doc);
        let (document, report) = self.codec.compress_with_report(&rewritten).await;
        ResolvedDocument {
            document,
            items,
            report,
        }
    }

    /// Swap references for payloads
    #[must_use]
    pub fn expand(&self, doc: &str) -> String {
        self.codec.expand(doc)
    }

    /// Swap inline payloads for references
    pub async fn compress(&self, doc: &str) -> (String, CompressReport) {
        self.codec.compress_with_report(doc).await
    }

    /// Evict expired and over-cap assets
    ///
    /// # Errors
    /// Returns the first persistence failure
    pub async fn sweep(&self) -> CodecResult<SweepReport> {
        self.codec.sweep().await
    }
}
