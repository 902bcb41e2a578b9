//! Sequential resolution queue
//!
//! Drives a batch of placeholders to stored tokens one at a time:
//! - FIFO by enqueue order; priority only matters through an explicit
//!   [`ResolutionQueue::sort_by_priority`] before the batch starts
//! - A failing item is recorded and the batch moves on
//! - Progress is reported after every item, in order
//! - A fixed delay between items smooths provider load
//!
//! # Item state machine
//! ```text
//! Pending ──► Processing ──► Completed
//!                  │
//!                  └──────► Failed
//! ```
//! Terminal states never change. Retrying a failed placeholder means
//! enqueueing it again.

use crate::error::QueueError;
use crate::extract::{marker_spans, PlaceholderDescriptor};
use crate::resolver::MediaResolver;
use chrono::{DateTime, Utc};
use mediaref_codec::reference_for;
use mediaref_store::{AssetToken, SharedClock};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Informational priority
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Resolve first when sorted
    High,
    /// Default
    #[default]
    Medium,
    /// Resolve last when sorted
    Low,
}

/// Item lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    /// Waiting for a batch
    Pending,
    /// Being resolved
    Processing,
    /// Resolved to a token
    Completed,
    /// Resolution failed
    Failed,
}

impl ItemStatus {
    /// Check for a final state
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// States reachable from `from`
#[must_use]
pub fn allowed_transitions(from: ItemStatus) -> Vec<ItemStatus> {
    use ItemStatus::*;
    match from {
        Pending => vec![Processing],
        Processing => vec![Completed, Failed],
        Completed | Failed => vec![],
    }
}

/// Check a transition against the table
///
/// # Errors
/// Returns `QueueError::IllegalTransition` if `to` is not reachable
pub fn validate_transition(from: ItemStatus, to: ItemStatus) -> Result<(), QueueError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(QueueError::IllegalTransition { from, to })
    }
}

/// One placeholder's progress through the queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    /// Item id
    pub id: String,
    /// What to resolve
    pub descriptor: PlaceholderDescriptor,
    /// Informational priority
    pub priority: Priority,
    /// Lifecycle state
    pub status: ItemStatus,
    /// Enqueue time
    pub created_at: DateTime<Utc>,
    /// Set on completion
    pub completed_at: Option<DateTime<Utc>>,
    /// Set on completion
    pub resolved_token: Option<AssetToken>,
    /// Set on failure
    pub error: Option<String>,
}

impl QueueItem {
    fn transition(&mut self, to: ItemStatus) -> Result<(), QueueError> {
        validate_transition(self.status, to)?;
        self.status = to;
        Ok(())
    }
}

/// Counts by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// All items
    pub total: usize,
    /// Waiting
    pub pending: usize,
    /// In flight
    pub processing: usize,
    /// Resolved
    pub completed: usize,
    /// Failed
    pub failed: usize,
}

impl QueueStats {
    /// Count `items` by status
    #[must_use]
    pub fn from_items(items: &[QueueItem]) -> Self {
        let mut stats = Self {
            total: items.len(),
            ..Self::default()
        };
        for item in items {
            match item.status {
                ItemStatus::Pending => stats.pending += 1,
                ItemStatus::Processing => stats.processing += 1,
                ItemStatus::Completed => stats.completed += 1,
                ItemStatus::Failed => stats.failed += 1,
            }
        }
        stats
    }
}

/// Queue settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    /// Pause between consecutive items
    pub inter_item_delay: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            inter_item_delay: Duration::from_secs(1),
        }
    }
}

/// Progress callback: 1-based position in the batch, batch size, item
pub type ProgressCallback = Arc<dyn Fn(usize, usize, &QueueItem) + Send + Sync>;

/// Completion callback: every item in the queue
pub type CompleteCallback = Arc<dyn Fn(&[QueueItem]) + Send + Sync>;

/// Resets the processing flag even if the batch future is dropped
struct ProcessingGuard<'a>(&'a AtomicBool);

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Batch resolver for placeholders
pub struct ResolutionQueue {
    resolver: Arc<dyn MediaResolver>,
    config: QueueConfig,
    clock: SharedClock,
    items: Mutex<Vec<QueueItem>>,
    processing: AtomicBool,
    on_progress: Option<ProgressCallback>,
    on_complete: Option<CompleteCallback>,
}

impl fmt::Debug for ResolutionQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolutionQueue")
            .field("resolver", &self.resolver.name())
            .field("config", &self.config)
            .field("stats", &self.stats())
            .field("processing", &self.is_processing())
            .finish_non_exhaustive()
    }
}

impl ResolutionQueue {
    /// Create empty queue
    #[must_use]
    pub fn new(resolver: Arc<dyn MediaResolver>, config: QueueConfig, clock: SharedClock) -> Self {
        Self {
            resolver,
            config,
            clock,
            items: Mutex::new(Vec::new()),
            processing: AtomicBool::new(false),
            on_progress: None,
            on_complete: None,
        }
    }

    /// With progress callback
    #[must_use]
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(usize, usize, &QueueItem) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    /// With completion callback
    #[must_use]
    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: Fn(&[QueueItem]) + Send + Sync + 'static,
    {
        self.on_complete = Some(Arc::new(callback));
        self
    }

    /// Add a pending item, returns its id
    pub fn enqueue(&self, descriptor: PlaceholderDescriptor, priority: Priority) -> String {
        let id = format!("item_{}", ulid::Ulid::new().to_string().to_ascii_lowercase());
        let item = QueueItem {
            id: id.clone(),
            descriptor,
            priority,
            status: ItemStatus::Pending,
            created_at: self.clock.now(),
            completed_at: None,
            resolved_token: None,
            error: None,
        };
        self.items.lock().push(item);
        id
    }

    /// Add several pending items with one priority
    pub fn enqueue_all<I>(&self, descriptors: I, priority: Priority) -> Vec<String>
    where
        I: IntoIterator<Item = PlaceholderDescriptor>,
    {
        descriptors
            .into_iter()
            .map(|d| self.enqueue(d, priority))
            .collect()
    }

    /// Stable-sort items by priority
    ///
    /// Refused while a batch runs; returns whether the sort happened.
    pub fn sort_by_priority(&self) -> bool {
        if self.is_processing() {
            return false;
        }
        self.items.lock().sort_by_key(|item| item.priority);
        true
    }

    /// Resolve every pending item, in order
    ///
    /// If a batch is already running, returns the current snapshot without
    /// starting another. Items enqueued while a batch runs wait for the next
    /// call. Resolution failures are recorded on the item, never returned.
    pub async fn process_queue(&self) -> Vec<QueueItem> {
        if self.processing.swap(true, Ordering::AcqRel) {
            tracing::debug!("batch already running, returning snapshot");
            return self.items();
        }
        let _guard = ProcessingGuard(&self.processing);

        let batch: Vec<String> = self
            .items
            .lock()
            .iter()
            .filter(|item| item.status == ItemStatus::Pending)
            .map(|item| item.id.clone())
            .collect();
        let total = batch.len();
        tracing::info!(total, resolver = self.resolver.name(), "resolution batch started");

        for (index, id) in batch.iter().enumerate() {
            if index > 0 && !self.config.inter_item_delay.is_zero() {
                tokio::time::sleep(self.config.inter_item_delay).await;
            }

            let Some(descriptor) = self.begin(id) else {
                continue;
            };
            let outcome = self.resolver.resolve(&descriptor).await;
            let Some(item) = self.finish(id, outcome) else {
                continue;
            };

            if let Some(callback) = &self.on_progress {
                callback(index + 1, total, &item);
            }
        }

        let items = self.items();
        let stats = self.stats();
        tracing::info!(
            total,
            completed = stats.completed,
            failed = stats.failed,
            "resolution batch finished"
        );
        if let Some(callback) = &self.on_complete {
            callback(&items);
        }
        items
    }

    /// Move a pending item to processing, returning its descriptor
    fn begin(&self, id: &str) -> Option<PlaceholderDescriptor> {
        let mut items = self.items.lock();
        let item = items.iter_mut().find(|item| item.id == id)?;
        if let Err(err) = item.transition(ItemStatus::Processing) {
            tracing::warn!(id, error = %err, "skipping item");
            return None;
        }
        Some(item.descriptor.clone())
    }

    /// Record an outcome, returning the updated item
    fn finish(
        &self,
        id: &str,
        outcome: Result<AssetToken, crate::error::ResolveError>,
    ) -> Option<QueueItem> {
        let now = self.clock.now();
        let mut items = self.items.lock();
        let item = items.iter_mut().find(|item| item.id == id)?;
        match outcome {
            Ok(token) => {
                item.transition(ItemStatus::Completed).ok()?;
                tracing::debug!(id, token = %token, "item completed");
                item.resolved_token = Some(token);
                item.completed_at = Some(now);
            }
            Err(err) => {
                item.transition(ItemStatus::Failed).ok()?;
                tracing::warn!(
                    id,
                    description = %item.descriptor.description,
                    retryable = err.is_retryable(),
                    error = %err,
                    "item failed"
                );
                item.error = Some(err.to_string());
            }
        }
        Some(item.clone())
    }

    /// Replace each completed item's marker with its token reference
    ///
    /// Every occurrence of a completed marker is replaced. Markers of
    /// pending or failed items stay as they are.
    #[must_use]
    pub fn replace_document_placeholders(&self, doc: &str) -> String {
        let references: HashMap<String, String> = self
            .items
            .lock()
            .iter()
            .filter_map(|item| {
                let token = item.resolved_token.as_ref()?;
                (item.status == ItemStatus::Completed)
                    .then(|| (item.descriptor.marker.clone(), reference_for(token)))
            })
            .collect();
        if references.is_empty() {
            return doc.to_string();
        }

        let mut out = String::with_capacity(doc.len());
        let mut cursor = 0;
        for span in marker_spans(doc) {
            if let Some(reference) = references.get(span.marker) {
                out.push_str(&doc[cursor..span.offset]);
                out.push_str(reference);
                cursor = span.end();
            }
        }
        out.push_str(&doc[cursor..]);
        out
    }

    /// Snapshot of every item
    #[must_use]
    pub fn items(&self) -> Vec<QueueItem> {
        self.items.lock().clone()
    }

    /// Counts by status
    #[must_use]
    pub fn stats(&self) -> QueueStats {
        QueueStats::from_items(&self.items.lock())
    }

    /// Check if a batch is running
    #[inline]
    #[must_use]
    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResolveError;
    use crate::resolver::MockMediaResolver;
    use mediaref_client::ClientError;
    use mediaref_store::{ManualClock, MediaKind};
    use pretty_assertions::assert_eq;

    fn queue_with(resolver: MockMediaResolver) -> ResolutionQueue {
        ResolutionQueue::new(
            Arc::new(resolver),
            QueueConfig::default(),
            Arc::new(ManualClock::starting_now()),
        )
    }

    fn failing_on(bad: &'static str) -> MockMediaResolver {
        let mut resolver = MockMediaResolver::new();
        resolver.expect_name().return_const("mock");
        resolver.expect_resolve().returning(move |d| {
            if d.description == bad {
                Err(ResolveError::Client(ClientError::InvalidParameters(
                    "bad query".into(),
                )))
            } else {
                Ok(AssetToken::mint(d.kind))
            }
        });
        resolver
    }

    #[test]
    fn transition_table() {
        use ItemStatus::*;
        assert!(validate_transition(Pending, Processing).is_ok());
        assert!(validate_transition(Processing, Completed).is_ok());
        assert!(validate_transition(Processing, Failed).is_ok());
        for to in [Pending, Processing, Completed, Failed] {
            assert!(validate_transition(Completed, to).is_err());
            assert!(validate_transition(Failed, to).is_err());
        }
        assert_eq!(
            validate_transition(Pending, Completed),
            Err(QueueError::IllegalTransition {
                from: Pending,
                to: Completed
            })
        );
        assert!(validate_transition(Failed, Pending).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn failure_does_not_abort_batch() {
        let queue = queue_with(failing_on("two"));
        for d in ["one", "two", "three"] {
            queue.enqueue(PlaceholderDescriptor::new(MediaKind::Image, d), Priority::Medium);
        }

        let items = queue.process_queue().await;
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].status, ItemStatus::Completed);
        assert_eq!(items[1].status, ItemStatus::Failed);
        assert!(items[1].error.as_deref().is_some_and(|e| !e.is_empty()));
        assert!(items[1].resolved_token.is_none());
        assert_eq!(items[2].status, ItemStatus::Completed);
        assert!(items[2].completed_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn progress_is_ordered_and_complete_fires_once() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let completed = Arc::new(Mutex::new(0usize));
        let (seen_cb, completed_cb) = (seen.clone(), completed.clone());

        let queue = queue_with(failing_on("nothing fails"))
            .on_progress(move |index, total, item| {
                seen_cb.lock().push((index, total, item.descriptor.description.clone()));
            })
            .on_complete(move |items| {
                *completed_cb.lock() += items.len();
            });
        for d in ["a", "b", "c"] {
            queue.enqueue(PlaceholderDescriptor::new(MediaKind::Video, d), Priority::Low);
        }
        queue.process_queue().await;

        assert_eq!(
            *seen.lock(),
            vec![(1, 3, "a".to_string()), (2, 3, "b".to_string()), (3, 3, "c".to_string())]
        );
        assert_eq!(*completed.lock(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn delay_between_items() {
        let queue = queue_with(failing_on("none"));
        for d in ["a", "b", "c"] {
            queue.enqueue(PlaceholderDescriptor::new(MediaKind::Image, d), Priority::Medium);
        }
        let start = tokio::time::Instant::now();
        queue.process_queue().await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(2), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(3), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_items_are_not_reprocessed() {
        let mut resolver = MockMediaResolver::new();
        resolver.expect_name().return_const("mock");
        resolver
            .expect_resolve()
            .times(2)
            .returning(|d| Ok(AssetToken::mint(d.kind)));
        let queue = queue_with(resolver);

        queue.enqueue(PlaceholderDescriptor::new(MediaKind::Image, "a"), Priority::Medium);
        queue.process_queue().await;
        queue.enqueue(PlaceholderDescriptor::new(MediaKind::Image, "b"), Priority::Medium);
        let items = queue.process_queue().await;

        assert_eq!(queue.stats().completed, 2);
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn sort_by_priority_is_stable() {
        let queue = queue_with(failing_on("none"));
        queue.enqueue(PlaceholderDescriptor::new(MediaKind::Image, "low"), Priority::Low);
        queue.enqueue(PlaceholderDescriptor::new(MediaKind::Image, "m1"), Priority::Medium);
        queue.enqueue(PlaceholderDescriptor::new(MediaKind::Image, "high"), Priority::High);
        queue.enqueue(PlaceholderDescriptor::new(MediaKind::Image, "m2"), Priority::Medium);

        assert!(queue.sort_by_priority());
        let order: Vec<String> = queue
            .items()
            .into_iter()
            .map(|i| i.descriptor.description)
            .collect();
        assert_eq!(order, vec!["high", "m1", "m2", "low"]);
    }

    #[tokio::test(start_paused = true)]
    async fn replaces_only_completed_markers() {
        let queue = queue_with(failing_on("###bad###"));
        let good = PlaceholderDescriptor::new(MediaKind::Image, "a red bicycle");
        let bad = PlaceholderDescriptor::new(MediaKind::Image, "###bad###");
        let doc = format!(
            "<img src=\"{}\"><img src=\"{}\"><p>{}</p>",
            good.marker, bad.marker, good.marker
        );
        queue.enqueue_all([good.clone(), bad.clone()], Priority::Medium);
        let items = queue.process_queue().await;

        let token = items[0].resolved_token.clone().unwrap();
        let out = queue.replace_document_placeholders(&doc);
        let reference = reference_for(&token);
        assert_eq!(
            out,
            format!("<img src=\"{reference}\"><img src=\"{}\"><p>{reference}</p>", bad.marker)
        );
    }

    #[test]
    fn stats_count_statuses() {
        let queue = queue_with(failing_on("none"));
        queue.enqueue(PlaceholderDescriptor::new(MediaKind::Image, "a"), Priority::Medium);
        assert_eq!(
            queue.stats(),
            QueueStats {
                total: 1,
                pending: 1,
                ..QueueStats::default()
            }
        );
        assert!(!queue.is_processing());
    }
}
