//! Paginated candidate discovery.
//!
//! Pages are requested with an id cursor: every query asks for nodes with an
//! id greater than the largest id of the previous page, so a fixed candidate
//! set is visited exactly once whatever the page size.

use std::sync::Arc;

use tracing::{debug, error};

use crate::metrics::CleanupMetrics;
use crate::model::{CandidateNode, CandidateQuery, NodeId};
use crate::retry::{RetryPolicy, with_retry};
use crate::store::ContentStore;

/// One page of candidates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadedPage {
    pub nodes: Vec<CandidateNode>,
    /// The page is empty because loading kept failing, not because the
    /// candidates ran out.
    pub inconclusive: bool,
}

impl LoadedPage {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Cursor for the next page.
    pub fn max_id(&self) -> Option<NodeId> {
        self.nodes.iter().map(|n| n.id).max()
    }
}

/// Loads candidate pages from the content repository with a bounded retry.
pub struct PageLoader {
    store: Arc<dyn ContentStore>,
    retry: RetryPolicy,
    metrics: CleanupMetrics,
}

impl PageLoader {
    pub fn new(store: Arc<dyn ContentStore>, retry: RetryPolicy, metrics: CleanupMetrics) -> Self {
        Self {
            store,
            retry,
            metrics,
        }
    }

    /// Load one page. A query that still fails after every retry yields an
    /// empty page flagged `inconclusive`; callers that only look at the nodes
    /// see it as the end of the candidates.
    pub async fn load_page(&self, query: &CandidateQuery) -> LoadedPage {
        let result = with_retry(&self.retry, &self.metrics, "load_candidates", || {
            self.store.load_candidates(query)
        })
        .await;

        match result {
            Ok(mut nodes) => {
                // the cursor relies on ascending ids
                nodes.sort_unstable_by_key(|n| n.id);
                nodes.truncate(query.page_size);

                if !nodes.is_empty() {
                    self.metrics.record_page_loaded();
                }

                debug!(
                    kind = %query.kind,
                    min_id = query.min_id,
                    count = nodes.len(),
                    "Loaded candidate page"
                );

                LoadedPage {
                    nodes,
                    inconclusive: false,
                }
            }
            Err(e) => {
                error!(
                    kind = %query.kind,
                    min_id = query.min_id,
                    attempts = self.retry.max_attempts,
                    error = %e,
                    "Candidate page could not be loaded, treating it as empty"
                );
                self.metrics.record_load_exhausted();

                LoadedPage {
                    nodes: Vec::new(),
                    inconclusive: true,
                }
            }
        }
    }
}
