//! Removes deleted preview paths from the search index, one batch per page.

use std::sync::Arc;

use tracing::debug;

use crate::error::IndexError;
use crate::metrics::CleanupMetrics;
use crate::store::{IndexTerm, IndexWriter};

pub struct IndexSynchronizer {
    index: Arc<dyn IndexWriter>,
    metrics: CleanupMetrics,
}

impl IndexSynchronizer {
    pub fn new(index: Arc<dyn IndexWriter>, metrics: CleanupMetrics) -> Self {
        Self { index, metrics }
    }

    /// Removal terms for a set of deleted paths: the exact path and the
    /// subtree below it, so documents that lived under a deleted folder go
    /// too.
    pub fn terms_for(paths: &[String]) -> Vec<IndexTerm> {
        paths
            .iter()
            .flat_map(|p| [IndexTerm::in_tree(p.as_str()), IndexTerm::path(p.as_str())])
            .collect()
    }

    /// Write one removal batch for `paths`. Nothing is written for an empty
    /// set. Failures are returned as is; they are not retried here.
    pub async fn sync_deletions(&self, paths: &[String]) -> Result<(), IndexError> {
        if paths.is_empty() {
            return Ok(());
        }

        let terms = Self::terms_for(paths);
        let count = terms.len();

        debug!(paths = paths.len(), terms = count, "Removing deleted previews from the index");
        self.index.remove_entries(terms).await?;
        self.metrics.record_index_batch(count);

        Ok(())
    }
}
