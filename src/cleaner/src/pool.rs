//! Bounded-concurrency deletion of one candidate page.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::events::{DeletionEvent, DeletionKind, DeletionListener};
use crate::metrics::CleanupMetrics;
use crate::model::CandidateNode;
use crate::retry::{RetryPolicy, with_retry};
use crate::store::ContentStore;

/// What happened to a single candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Deleted,
    /// Kept on purpose (current or locked version, not a version folder).
    Retained,
    /// Deletion failed after every retry.
    Failed,
    /// Would have been deleted.
    DryRun,
}

/// Aggregated outcome of one page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageResult {
    /// Paths of the nodes actually deleted, in completion order.
    pub deleted_paths: Vec<String>,
    pub deleted: usize,
    pub retained: usize,
    pub failed: usize,
    pub dry_run: usize,
}

/// Runs a per-item action over a page with at most `max_parallelism` items in
/// flight, and returns only once every item has finished.
#[derive(Debug, Clone)]
pub struct DeletionWorkerPool {
    max_parallelism: usize,
}

impl DeletionWorkerPool {
    pub fn new(max_parallelism: usize) -> Self {
        Self {
            max_parallelism: max_parallelism.max(1),
        }
    }

    pub fn max_parallelism(&self) -> usize {
        self.max_parallelism
    }

    /// Process every item of the page with `delete_fn`. `listener` receives a
    /// `kind` event for each item whose outcome is [`ItemOutcome::Deleted`].
    pub async fn process_page<F, Fut>(
        &self,
        items: Vec<CandidateNode>,
        kind: DeletionKind,
        delete_fn: F,
        listener: Arc<dyn DeletionListener>,
    ) -> PageResult
    where
        F: Fn(CandidateNode) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ItemOutcome> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.max_parallelism));
        let delete_fn = Arc::new(delete_fn);
        let mut workers = JoinSet::new();

        for item in items {
            let semaphore = semaphore.clone();
            let delete_fn = delete_fn.clone();
            let listener = listener.clone();

            workers.spawn(async move {
                // the semaphore is never closed
                let _permit = semaphore.acquire_owned().await.ok();

                let node_id = item.id;
                let path = item.path.clone();
                let outcome = delete_fn(item).await;

                if outcome == ItemOutcome::Deleted {
                    listener.on_deleted(DeletionEvent { kind, node_id });
                }

                (path, outcome)
            });
        }

        let mut result = PageResult::default();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((path, ItemOutcome::Deleted)) => {
                    result.deleted += 1;
                    if let Some(path) = path.filter(|p| !p.is_empty()) {
                        result.deleted_paths.push(path);
                    }
                }
                Ok((_, ItemOutcome::Retained)) => result.retained += 1,
                Ok((_, ItemOutcome::Failed)) => result.failed += 1,
                Ok((_, ItemOutcome::DryRun)) => result.dry_run += 1,
                Err(e) => {
                    error!(error = %e, "Deletion worker did not complete");
                    result.failed += 1;
                }
            }
        }

        result
    }
}

/// Physical deletion of a single node with a bounded retry.
pub struct NodeDeleter {
    store: Arc<dyn ContentStore>,
    retry: RetryPolicy,
    metrics: CleanupMetrics,
    dry_run: bool,
}

impl NodeDeleter {
    pub fn new(
        store: Arc<dyn ContentStore>,
        retry: RetryPolicy,
        metrics: CleanupMetrics,
        dry_run: bool,
    ) -> Self {
        Self {
            store,
            retry,
            metrics,
            dry_run,
        }
    }

    /// Delete `node`. Exhausted retries are reported here and returned as
    /// [`ItemOutcome::Failed`]; they never abort the page.
    pub async fn delete(&self, node: &CandidateNode) -> ItemOutcome {
        let path = node.path.as_deref().unwrap_or_default();

        if self.dry_run {
            info!(node_id = node.id, path, "[DRY-RUN] Would delete preview node");
            return ItemOutcome::DryRun;
        }

        let result = with_retry(&self.retry, &self.metrics, "delete_physical", || {
            self.store.delete_physical(node.id)
        })
        .await;

        match result {
            Ok(()) => {
                debug!(node_id = node.id, path, "Preview node deleted");
                ItemOutcome::Deleted
            }
            Err(e) => {
                error!(
                    node_id = node.id,
                    path,
                    attempts = self.retry.max_attempts,
                    error = %e,
                    "Preview node could not be deleted"
                );
                self.metrics.record_deletion_failure();
                ItemOutcome::Failed
            }
        }
    }
}
