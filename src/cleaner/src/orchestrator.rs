//! Cleanup run orchestration
//!
//! A run walks through up to three phases, each a page loop over one
//! candidate query:
//!
//! 1. `DeleteFolders`: preview folders (all of them, or only outdated versions)
//! 2. `DeleteImages`: preview images above the configured index
//! 3. `DeleteEmptyFolders`: preview folders left empty by the phases before
//!
//! Within a phase a page is loaded, deleted by the worker pool, removed from
//! the index, and only then is the next page loaded. Pages never overlap.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use crate::config::{CleanupConfig, CleanupMode};
use crate::error::CleanupError;
use crate::events::{DeletionKind, DeletionListener, NoopListener};
use crate::index_sync::IndexSynchronizer;
use crate::loader::PageLoader;
use crate::metrics::{CleanupMetrics, MetricsSummary};
use crate::model::{CandidateKind, CandidateNode, CandidateQuery, NodeId, NodeTypeIds};
use crate::pool::{DeletionWorkerPool, ItemOutcome, NodeDeleter, PageResult};
use crate::store::{ContentStore, IndexWriter};
use crate::versions::{DeletabilityResolver, VersionCache};

type ItemFuture = Pin<Box<dyn Future<Output = ItemOutcome> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    DeleteFolders,
    DeleteImages,
    DeleteEmptyFolders,
}

impl Phase {
    pub fn deletion_kind(self) -> DeletionKind {
        match self {
            Phase::DeleteImages => DeletionKind::Image,
            Phase::DeleteFolders | Phase::DeleteEmptyFolders => DeletionKind::Folder,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::DeleteFolders => "delete_folders",
            Phase::DeleteImages => "delete_images",
            Phase::DeleteEmptyFolders => "delete_empty_folders",
        };
        write!(f, "{s}")
    }
}

/// Phases a run goes through, in order.
///
/// Folder deletion runs unless only overflow images are being trimmed while
/// all versions are kept. Image deletion runs only with a positive
/// `max_index`. The empty-folder sweep always runs last.
pub fn planned_phases(mode: CleanupMode, max_index: i32) -> Vec<Phase> {
    let mut phases = Vec::with_capacity(3);

    if mode != CleanupMode::EmptyFoldersOnly {
        if max_index <= 0 || mode == CleanupMode::KeepLastVersions {
            phases.push(Phase::DeleteFolders);
        }
        if max_index > 0 {
            phases.push(Phase::DeleteImages);
        }
    }

    phases.push(Phase::DeleteEmptyFolders);
    phases
}

/// Outcome of one phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseReport {
    pub phase: Phase,
    pub pages: usize,
    pub deleted: usize,
    pub retained: usize,
    pub failed: usize,
    pub dry_run: usize,
    /// The phase ended on a page that could not be loaded.
    pub inconclusive: bool,
}

impl PhaseReport {
    fn new(phase: Phase) -> Self {
        Self {
            phase,
            pages: 0,
            deleted: 0,
            retained: 0,
            failed: 0,
            dry_run: 0,
            inconclusive: false,
        }
    }

    fn absorb(&mut self, page: &PageResult) {
        self.pages += 1;
        self.deleted += page.deleted;
        self.retained += page.retained;
        self.failed += page.failed;
        self.dry_run += page.dry_run;
    }
}

/// Outcome of a whole run
#[derive(Debug, Clone)]
pub struct CleanupReport {
    pub phases: Vec<PhaseReport>,
    pub metrics: MetricsSummary,
    pub duration_ms: u64,
}

impl CleanupReport {
    pub fn deleted(&self) -> usize {
        self.phases.iter().map(|p| p.deleted).sum()
    }

    pub fn failed(&self) -> usize {
        self.phases.iter().map(|p| p.failed).sum()
    }

    /// No phase ended early because of a page load failure.
    pub fn is_conclusive(&self) -> bool {
        self.phases.iter().all(|p| !p.inconclusive)
    }

    pub fn phase(&self, phase: Phase) -> Option<&PhaseReport> {
        self.phases.iter().find(|p| p.phase == phase)
    }
}

/// Bulk removal of preview renditions with index synchronization.
pub struct PreviewCleaner {
    config: CleanupConfig,
    store: Arc<dyn ContentStore>,
    index: Arc<dyn IndexWriter>,
    type_ids: NodeTypeIds,
    listener: Arc<dyn DeletionListener>,
    metrics: CleanupMetrics,
}

impl PreviewCleaner {
    /// Create a cleaner with already resolved node type identifiers.
    pub fn new(
        config: CleanupConfig,
        store: Arc<dyn ContentStore>,
        index: Arc<dyn IndexWriter>,
        type_ids: NodeTypeIds,
    ) -> Self {
        Self {
            config: config.normalized(),
            store,
            index,
            type_ids,
            listener: Arc::new(NoopListener),
            metrics: CleanupMetrics::new(),
        }
    }

    /// Resolve the node type identifiers from `store` and create a cleaner.
    pub async fn resolve(
        config: CleanupConfig,
        store: Arc<dyn ContentStore>,
        index: Arc<dyn IndexWriter>,
    ) -> Result<Self, CleanupError> {
        let type_ids = NodeTypeIds::resolve(store.as_ref()).await?;
        Ok(Self::new(config, store, index, type_ids))
    }

    /// Receive folder/image deletion events.
    pub fn with_listener(mut self, listener: Arc<dyn DeletionListener>) -> Self {
        self.listener = listener;
        self
    }

    pub fn with_metrics(mut self, metrics: CleanupMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &CleanupConfig {
        &self.config
    }

    pub fn metrics(&self) -> &CleanupMetrics {
        &self.metrics
    }

    /// Run every applicable phase to completion.
    ///
    /// # Errors
    ///
    /// Fails on an invalid configuration, on the first index write failure,
    /// and on a page load failure when `fail_on_inconclusive_load` is set.
    /// Nodes that could not be deleted are counted in the report instead.
    pub async fn execute(&self) -> Result<CleanupReport, CleanupError> {
        self.config
            .validate()
            .map_err(|e| CleanupError::Configuration(e.to_string()))?;

        let started = Instant::now();
        let phases = planned_phases(self.config.mode, self.config.max_index);

        info!(
            path = self.config.path.as_deref().unwrap_or("/"),
            mode = %self.config.mode,
            max_index = self.config.max_index,
            max_degree_of_parallelism = self.config.max_degree_of_parallelism,
            block_size = self.config.block_size,
            dry_run = self.config.dry_run,
            phases = ?phases,
            "Starting preview cleanup"
        );

        // lives exactly as long as this run
        let cache = Arc::new(VersionCache::new());

        let mut reports = Vec::with_capacity(phases.len());
        for phase in phases {
            reports.push(self.run_phase(phase, &cache).await?);
        }

        let report = CleanupReport {
            phases: reports,
            metrics: self.metrics.summary(),
            duration_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            deleted = report.deleted(),
            failed = report.failed(),
            conclusive = report.is_conclusive(),
            cached_contents = cache.len(),
            duration_ms = report.duration_ms,
            "Preview cleanup finished"
        );

        Ok(report)
    }

    async fn run_phase(
        &self,
        phase: Phase,
        cache: &Arc<VersionCache>,
    ) -> Result<PhaseReport, CleanupError> {
        let loader = PageLoader::new(
            self.store.clone(),
            self.config.load_retry.clone(),
            self.metrics.clone(),
        );
        let pool = DeletionWorkerPool::new(self.config.max_degree_of_parallelism);
        let index_sync = IndexSynchronizer::new(self.index.clone(), self.metrics.clone());

        let mut report = PhaseReport::new(phase);
        let mut min_id: NodeId = 0;

        info!(%phase, "Starting cleanup phase");

        loop {
            let page = loader.load_page(&self.query_for(phase, min_id)).await;

            if page.is_empty() {
                if page.inconclusive {
                    report.inconclusive = true;
                    if self.config.fail_on_inconclusive_load {
                        return Err(CleanupError::InconclusiveLoad {
                            phase: phase.to_string(),
                            after_id: min_id,
                        });
                    }
                }
                break;
            }

            let next_min_id = page.max_id().unwrap_or(min_id);

            let result = pool
                .process_page(
                    page.nodes,
                    phase.deletion_kind(),
                    self.item_action(phase, cache),
                    self.listener.clone(),
                )
                .await;

            index_sync.sync_deletions(&result.deleted_paths).await?;

            report.absorb(&result);
            info!(
                %phase,
                block = report.pages,
                deleted = result.deleted,
                retained = result.retained,
                failed = result.failed,
                last_id = next_min_id,
                "Preview delete block finished"
            );

            min_id = next_min_id;
        }

        info!(
            %phase,
            pages = report.pages,
            deleted = report.deleted,
            retained = report.retained,
            failed = report.failed,
            inconclusive = report.inconclusive,
            "Cleanup phase finished"
        );

        Ok(report)
    }

    fn query_for(&self, phase: Phase, min_id: NodeId) -> CandidateQuery {
        let (kind, node_type_id, index_threshold) = match phase {
            Phase::DeleteFolders if self.config.mode == CleanupMode::KeepLastVersions => {
                (CandidateKind::VersionFolders, self.type_ids.folder, None)
            }
            Phase::DeleteFolders => (CandidateKind::PreviewRoots, self.type_ids.folder, None),
            Phase::DeleteImages => (
                CandidateKind::PreviewImages,
                self.type_ids.image,
                Some(self.config.max_index),
            ),
            Phase::DeleteEmptyFolders => (CandidateKind::EmptyFolders, self.type_ids.folder, None),
        };

        CandidateQuery {
            kind,
            node_type_id,
            path_prefix: self.config.path.clone(),
            index_threshold,
            min_id,
            page_size: self.config.block_size,
        }
    }

    /// Per-item worker action of a phase: the deletability check when only
    /// outdated versions may go, then the physical deletion.
    fn item_action(
        &self,
        phase: Phase,
        cache: &Arc<VersionCache>,
    ) -> impl Fn(CandidateNode) -> ItemFuture + Send + Sync + 'static + use<> {
        let deleter = Arc::new(NodeDeleter::new(
            self.store.clone(),
            self.config.delete_retry.clone(),
            self.metrics.clone(),
            self.config.dry_run,
        ));

        let resolver = (phase == Phase::DeleteFolders
            && self.config.mode == CleanupMode::KeepLastVersions)
            .then(|| {
                Arc::new(DeletabilityResolver::new(
                    self.store.clone(),
                    cache.clone(),
                    self.config.load_retry.clone(),
                    self.metrics.clone(),
                ))
            });

        let kind = phase.deletion_kind();
        let metrics = self.metrics.clone();

        move |node: CandidateNode| -> ItemFuture {
            let deleter = deleter.clone();
            let resolver = resolver.clone();
            let metrics = metrics.clone();

            Box::pin(async move {
                if let Some(resolver) = resolver {
                    let path = node.path.as_deref().unwrap_or_default();
                    if !resolver.is_deletable(path).await {
                        metrics.record_retained();
                        return ItemOutcome::Retained;
                    }
                }

                let outcome = deleter.delete(&node).await;
                if outcome == ItemOutcome::Deleted {
                    match kind {
                        DeletionKind::Folder => metrics.record_folder_deleted(),
                        DeletionKind::Image => metrics.record_image_deleted(),
                    }
                }
                outcome
            })
        }
    }
}
