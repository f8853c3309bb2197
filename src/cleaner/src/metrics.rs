//! Cleanup run metrics
//!
//! Thread-safe counters shared between the page loop and the deletion workers.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Thread-safe metrics for one or more cleanup runs
#[derive(Debug, Clone)]
pub struct CleanupMetrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug, Default)]
struct MetricsInner {
    pages_loaded: AtomicUsize,
    load_exhaustions: AtomicUsize,
    folders_deleted: AtomicUsize,
    images_deleted: AtomicUsize,
    nodes_retained: AtomicUsize,
    deletions_failed: AtomicUsize,
    retries_attempted: AtomicUsize,
    version_lookups: AtomicUsize,
    version_lookup_failures: AtomicUsize,
    index_batches: AtomicUsize,
    index_terms: AtomicUsize,
}

impl Default for CleanupMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl CleanupMetrics {
    /// Create a new metrics tracker
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner::default()),
        }
    }

    pub fn record_page_loaded(&self) {
        self.inner.pages_loaded.fetch_add(1, Ordering::Relaxed);
    }

    /// A page load that still failed after every retry
    pub fn record_load_exhausted(&self) {
        self.inner.load_exhaustions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_folder_deleted(&self) {
        self.inner.folders_deleted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_image_deleted(&self) {
        self.inner.images_deleted.fetch_add(1, Ordering::Relaxed);
    }

    /// A candidate kept because it is current, locked or not a version folder
    pub fn record_retained(&self) {
        self.inner.nodes_retained.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_deletion_failure(&self) {
        self.inner.deletions_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.inner.retries_attempted.fetch_add(1, Ordering::Relaxed);
    }

    /// A version lookup that reached the repository (cache miss)
    pub fn record_version_lookup(&self) {
        self.inner.version_lookups.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_version_lookup_failure(&self) {
        self.inner
            .version_lookup_failures
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_index_batch(&self, terms: usize) {
        self.inner.index_batches.fetch_add(1, Ordering::Relaxed);
        self.inner.index_terms.fetch_add(terms, Ordering::Relaxed);
    }

    pub fn pages_loaded(&self) -> usize {
        self.inner.pages_loaded.load(Ordering::Relaxed)
    }

    pub fn load_exhaustions(&self) -> usize {
        self.inner.load_exhaustions.load(Ordering::Relaxed)
    }

    pub fn folders_deleted(&self) -> usize {
        self.inner.folders_deleted.load(Ordering::Relaxed)
    }

    pub fn images_deleted(&self) -> usize {
        self.inner.images_deleted.load(Ordering::Relaxed)
    }

    pub fn nodes_retained(&self) -> usize {
        self.inner.nodes_retained.load(Ordering::Relaxed)
    }

    pub fn deletions_failed(&self) -> usize {
        self.inner.deletions_failed.load(Ordering::Relaxed)
    }

    pub fn retries_attempted(&self) -> usize {
        self.inner.retries_attempted.load(Ordering::Relaxed)
    }

    pub fn version_lookups(&self) -> usize {
        self.inner.version_lookups.load(Ordering::Relaxed)
    }

    pub fn version_lookup_failures(&self) -> usize {
        self.inner.version_lookup_failures.load(Ordering::Relaxed)
    }

    pub fn index_batches(&self) -> usize {
        self.inner.index_batches.load(Ordering::Relaxed)
    }

    pub fn index_terms(&self) -> usize {
        self.inner.index_terms.load(Ordering::Relaxed)
    }

    /// Point-in-time copy of every counter
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            pages_loaded: self.pages_loaded(),
            load_exhaustions: self.load_exhaustions(),
            folders_deleted: self.folders_deleted(),
            images_deleted: self.images_deleted(),
            nodes_retained: self.nodes_retained(),
            deletions_failed: self.deletions_failed(),
            retries_attempted: self.retries_attempted(),
            version_lookups: self.version_lookups(),
            version_lookup_failures: self.version_lookup_failures(),
            index_batches: self.index_batches(),
            index_terms: self.index_terms(),
        }
    }
}

/// Snapshot of [`CleanupMetrics`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSummary {
    pub pages_loaded: usize,
    pub load_exhaustions: usize,
    pub folders_deleted: usize,
    pub images_deleted: usize,
    pub nodes_retained: usize,
    pub deletions_failed: usize,
    pub retries_attempted: usize,
    pub version_lookups: usize,
    pub version_lookup_failures: usize,
    pub index_batches: usize,
    pub index_terms: usize,
}

impl MetricsSummary {
    pub fn nodes_deleted(&self) -> usize {
        self.folders_deleted + self.images_deleted
    }
}
