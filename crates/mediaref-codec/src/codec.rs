//! Reference codec
//!
//! - `compress`: inline payloads → `asset-ref://<token>`, storing each
//!   payload once per namespace
//! - `expand`: references → stored payloads, or the fallback asset on a miss
//!
//! The compressed form is canonical for storage and editing; expanded
//! documents exist only for rendering.

use crate::error::{CodecError, CodecResult};
use crate::fallback::{fallback_payload, fallback_token};
use crate::payload::{reference_for, InlinePayload, DEFAULT_MIN_INLINE_LEN};
use crate::tokenizer::{splice, tokenize_with, Span, SpanKind};
use mediaref_store::{
    AssetStore, AssetToken, MediaKind, SharedClock, StoredAsset, SweepReport,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Codec configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecConfig {
    /// Shortest base64 body that gets compressed
    pub min_inline_len: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            min_inline_len: DEFAULT_MIN_INLINE_LEN,
        }
    }
}

/// Outcome counts for one `compress` pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressReport {
    /// Payloads stored under a fresh token
    pub stored: usize,
    /// Payloads that reused an existing token
    pub deduplicated: usize,
    /// Fallback assets turned back into their reference
    pub restored: usize,
    /// Malformed payloads left untouched
    pub skipped: usize,
    /// Substituted payloads whose store write failed; readable this session only
    pub unpersisted: usize,
}

impl CompressReport {
    /// Matches replaced by a reference
    #[inline]
    #[must_use]
    pub fn substituted(&self) -> usize {
        self.stored + self.deduplicated + self.restored
    }
}

/// Where a stored payload ended up
#[derive(Debug, Clone, PartialEq, Eq)]
enum Placement {
    Fresh(AssetToken),
    Existing(AssetToken),
    SessionOnly(AssetToken),
}

impl Placement {
    fn token(&self) -> &AssetToken {
        match self {
            Self::Fresh(t) | Self::Existing(t) | Self::SessionOnly(t) => t,
        }
    }
}

/// Compress/expand over the image and video stores
#[derive(Debug)]
pub struct ReferenceCodec {
    images: Arc<AssetStore>,
    videos: Arc<AssetStore>,
    config: CodecConfig,
    clock: SharedClock,
    // find-then-put must not interleave, or one payload could get two tokens
    insert_lock: Mutex<()>,
}

impl ReferenceCodec {
    /// Create codec over one store per asset class
    #[must_use]
    pub fn new(
        images: Arc<AssetStore>,
        videos: Arc<AssetStore>,
        config: CodecConfig,
        clock: SharedClock,
    ) -> Self {
        Self {
            images,
            videos,
            config,
            clock,
            insert_lock: Mutex::new(()),
        }
    }

    /// Store holding `kind`
    #[inline]
    #[must_use]
    pub fn store(&self, kind: MediaKind) -> &Arc<AssetStore> {
        match kind {
            MediaKind::Image => &self.images,
            MediaKind::Video => &self.videos,
        }
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> CodecConfig {
        self.config
    }

    /// Replace inline payloads with references
    pub async fn compress(&self, doc: &str) -> String {
        self.compress_with_report(doc).await.0
    }

    /// Replace inline payloads with references, reporting what happened
    ///
    /// Never fails: a payload that cannot be validated or stored is left in
    /// place and counted as skipped.
    pub async fn compress_with_report(&self, doc: &str) -> (String, CompressReport) {
        let spans: Vec<Span> = tokenize_with(doc, self.config.min_inline_len)
            .into_iter()
            .filter(|span| matches!(span.kind, SpanKind::InlinePayload { .. }))
            .collect();
        let mut report = CompressReport::default();
        if spans.is_empty() {
            return (doc.to_string(), report);
        }

        // Resolve every span before splicing; splice's closure is synchronous
        let mut replacements = Vec::with_capacity(spans.len());
        for span in &spans {
            let text = span.text(doc);
            if let Some(token) = fallback_token(text) {
                report.restored += 1;
                replacements.push(Some(reference_for(&token)));
                continue;
            }
            match self.place(text, "", None).await {
                Ok(placement) => {
                    match &placement {
                        Placement::Fresh(_) => report.stored += 1,
                        Placement::Existing(_) => report.deduplicated += 1,
                        Placement::SessionOnly(_) => {
                            report.stored += 1;
                            report.unpersisted += 1;
                        }
                    }
                    replacements.push(Some(reference_for(placement.token())));
                }
                Err(err) => {
                    tracing::warn!(offset = span.offset, len = span.len, error = %err, "skipping inline payload");
                    report.skipped += 1;
                    replacements.push(None);
                }
            }
        }

        let mut replacements = replacements.into_iter();
        let out = splice(doc, &spans, |_, _| replacements.next().flatten());
        tracing::debug!(
            stored = report.stored,
            deduplicated = report.deduplicated,
            restored = report.restored,
            skipped = report.skipped,
            unpersisted = report.unpersisted,
            before = doc.len(),
            after = out.len(),
            "compressed document"
        );
        (out, report)
    }

    /// Replace references with their payloads
    ///
    /// Never fails: a reference whose token is not in the store becomes the
    /// fallback asset for that token.
    #[must_use]
    pub fn expand(&self, doc: &str) -> String {
        let spans = tokenize_with(doc, self.config.min_inline_len);
        let mut misses = 0usize;
        let out = splice(doc, &spans, |span, _| match &span.kind {
            SpanKind::Reference { token } => Some(self.resolve(token).unwrap_or_else(|| {
                misses += 1;
                fallback_payload(token)
            })),
            SpanKind::InlinePayload { .. } => None,
        });
        if misses > 0 {
            tracing::warn!(misses, "expanded missing assets to fallback");
        }
        out
    }

    /// Stored payload for `token`, if live
    #[must_use]
    pub fn resolve(&self, token: &AssetToken) -> Option<String> {
        self.store(token.kind())
            .get(token)
            .map(|asset| asset.inline_payload)
    }

    /// Payload for `token`, or its fallback asset
    #[must_use]
    pub fn resolve_or_fallback(&self, token: &AssetToken) -> String {
        self.resolve(token)
            .unwrap_or_else(|| fallback_payload(token))
    }

    /// Store a resolved payload and return its token
    ///
    /// Reuses the token of an identical stored payload. A failed store write
    /// is logged; the token is still returned and resolves for the rest of
    /// the session.
    ///
    /// # Errors
    /// Returns `EmptyPayload` or `MalformedPayload` when `payload` is not a
    /// valid data URI of class `kind`
    pub async fn store_inline(
        &self,
        kind: MediaKind,
        payload: &str,
        description: &str,
        thumbnail: Option<String>,
    ) -> CodecResult<AssetToken> {
        let parsed = InlinePayload::parse(payload)?;
        if parsed.kind != kind {
            return Err(CodecError::MalformedPayload(format!(
                "expected {kind} payload, got {}",
                parsed.mime
            )));
        }
        let placement = self.place(payload, description, thumbnail).await?;
        Ok(placement.token().clone())
    }

    /// Sweep both stores concurrently
    ///
    /// # Errors
    /// Returns the first persistence failure
    pub async fn sweep(&self) -> CodecResult<SweepReport> {
        let (images, videos) = futures::try_join!(self.images.sweep(), self.videos.sweep())?;
        Ok(SweepReport {
            expired: images.expired + videos.expired,
            evicted: images.evicted + videos.evicted,
        })
    }

    async fn place(
        &self,
        payload: &str,
        description: &str,
        thumbnail: Option<String>,
    ) -> CodecResult<Placement> {
        let parsed = InlinePayload::parse(payload)?;
        let store = self.store(parsed.kind);

        let _guard = self.insert_lock.lock().await;
        if let Some(token) = store.find_by_payload(payload) {
            return Ok(Placement::Existing(token));
        }

        let token = AssetToken::mint(parsed.kind);
        let asset = StoredAsset::new(token.clone(), payload, self.clock.now())
            .with_description(description)
            .with_thumbnail(thumbnail);
        match store.put(asset).await {
            Ok(()) => Ok(Placement::Fresh(token)),
            Err(err) => {
                tracing::warn!(token = %token, error = %err, full = err.is_full(), "asset not persisted, kept for this session");
                Ok(Placement::SessionOnly(token))
            }
        }
    }
}
