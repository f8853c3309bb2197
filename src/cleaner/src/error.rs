//! Error types for the cleanup engine and its collaborators.

use thiserror::Error;

use crate::model::NodeId;

/// Failure reported by the content repository.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("unknown content type: {0}")]
    UnknownType(String),

    #[error("unknown version status code {code} on {path}")]
    UnknownVersionStatus { path: String, code: i32 },

    /// Transient failure raised by non-SQL stores.
    #[error("{0}")]
    Unavailable(String),
}

/// Failure reported by the search index.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("index write rejected: {0}")]
    Rejected(String),
}

/// Run-level failure. Anything not listed here (a node that could not be
/// deleted, a version lookup that kept failing) is logged and counted but does
/// not fail the run.
#[derive(Debug, Error)]
pub enum CleanupError {
    /// Raised before any phase starts.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("failed to remove deleted paths from the index: {0}")]
    Index(#[from] IndexError),

    /// Only raised when `fail_on_inconclusive_load` is enabled.
    #[error("{phase} phase stopped after {after_id}: candidate page could not be loaded")]
    InconclusiveLoad { phase: String, after_id: NodeId },
}
