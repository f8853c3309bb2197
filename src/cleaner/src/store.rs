//! Interfaces of the two external collaborators: the content repository the
//! preview nodes live in and the search index that must follow its
//! deletions.

use async_trait::async_trait;

use crate::error::{CleanupError, IndexError, StoreError};
use crate::model::{
    CandidateNode, CandidateQuery, FOLDER_TYPE_NAME, IMAGE_TYPE_NAME, LastVersions, NodeId,
    NodeTypeIds,
};

/// Content repository operations used by the cleanup engine.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// One page of candidates matching `query`, ascending by id, at most
    /// `query.page_size` long.
    async fn load_candidates(&self, query: &CandidateQuery)
    -> Result<Vec<CandidateNode>, StoreError>;

    /// Physically remove a node together with its subtree. Removing a node
    /// that no longer exists succeeds.
    async fn delete_physical(&self, node_id: NodeId) -> Result<(), StoreError>;

    /// Current major and minor versions of the content at `content_path`.
    async fn last_versions(&self, content_path: &str) -> Result<LastVersions, StoreError>;

    /// Identifier of a node type by name.
    async fn resolve_type_id(&self, type_name: &str) -> Result<i64, StoreError>;
}

/// Index field a removal term matches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexField {
    /// Exact document path.
    Path,
    /// Document path or any path below it.
    InTree,
}

/// A single index removal instruction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexTerm {
    pub field: IndexField,
    pub value: String,
}

impl IndexTerm {
    pub fn path(value: impl Into<String>) -> Self {
        Self {
            field: IndexField::Path,
            value: value.into(),
        }
    }

    pub fn in_tree(value: impl Into<String>) -> Self {
        Self {
            field: IndexField::InTree,
            value: value.into(),
        }
    }
}

/// Search index write side.
#[async_trait]
pub trait IndexWriter: Send + Sync {
    /// Remove every document matching any of `terms` in a single write.
    async fn remove_entries(&self, terms: Vec<IndexTerm>) -> Result<(), IndexError>;
}

impl NodeTypeIds {
    /// Look up the folder and image type identifiers. Failure here is fatal:
    /// no phase may start without them.
    pub async fn resolve(store: &dyn ContentStore) -> Result<Self, CleanupError> {
        let folder = store
            .resolve_type_id(FOLDER_TYPE_NAME)
            .await
            .map_err(|e| CleanupError::Configuration(e.to_string()))?;
        let image = store
            .resolve_type_id(IMAGE_TYPE_NAME)
            .await
            .map_err(|e| CleanupError::Configuration(e.to_string()))?;

        tracing::debug!(folder, image, "Resolved preview node type identifiers");

        Ok(Self { folder, image })
    }
}
