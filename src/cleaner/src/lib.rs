//! Batch removal of preview renditions from a content repository.
//!
//! [`PreviewCleaner`] pages through candidate preview folders and images,
//! deletes them with bounded parallelism and keeps the search index in step
//! with every page it deletes.

pub mod config;
pub mod error;
pub mod events;
pub mod index_sync;
pub mod loader;
pub mod metrics;
pub mod model;
pub mod orchestrator;
pub mod pool;
pub mod retry;
pub mod sql;
pub mod store;
pub mod versions;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::{CleanupConfig, CleanupMode};
pub use error::{CleanupError, IndexError, StoreError};
pub use events::{DeletionEvent, DeletionKind, DeletionListener};
pub use metrics::{CleanupMetrics, MetricsSummary};
pub use orchestrator::{CleanupReport, Phase, PhaseReport, PreviewCleaner};
pub use store::{ContentStore, IndexWriter};
