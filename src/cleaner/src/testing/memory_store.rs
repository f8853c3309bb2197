use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use super::{FILE_TYPE_ID, FOLDER_TYPE_ID, IMAGE_TYPE_ID};
use crate::error::StoreError;
use crate::model::{
    CandidateKind, CandidateNode, CandidateQuery, FOLDER_TYPE_NAME, IMAGE_TYPE_NAME, LastVersions,
    NodeId, NodeTypeIds, PREVIEWS_FOLDER_NAME, parent_path, path_name,
};
use crate::store::ContentStore;

#[derive(Debug, Clone)]
struct StoredNode {
    path: String,
    type_id: i64,
    index: i32,
}

#[derive(Debug, Default)]
struct State {
    types: HashMap<String, i64>,
    nodes: BTreeMap<NodeId, StoredNode>,
    last_versions: HashMap<String, LastVersions>,
    loads: Vec<CandidateQuery>,
    failing_loads: u32,
    failing_lookups: u32,
    failing_deletes: HashMap<NodeId, u32>,
    lookup_delay: Duration,
    version_lookups: usize,
    deleted: Vec<NodeId>,
}

/// Content repository kept in memory, with the same candidate predicates as
/// the SQL store and knobs for injecting failures.
#[derive(Debug)]
pub struct InMemoryContentStore {
    state: Mutex<State>,
}

impl Default for InMemoryContentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryContentStore {
    /// Empty store with the preview folder and image types registered.
    pub fn new() -> Self {
        let store = Self::without_types();
        {
            let mut state = store.state();
            state
                .types
                .insert(FOLDER_TYPE_NAME.to_string(), FOLDER_TYPE_ID);
            state.types.insert(IMAGE_TYPE_NAME.to_string(), IMAGE_TYPE_ID);
        }
        store
    }

    /// Empty store in which no node type can be resolved.
    pub fn without_types() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    /// Identifiers `new()` registers.
    pub fn type_ids() -> NodeTypeIds {
        NodeTypeIds {
            folder: FOLDER_TYPE_ID,
            image: IMAGE_TYPE_ID,
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_node(&self, id: NodeId, path: &str, type_id: i64, index: i32) {
        self.state().nodes.insert(
            id,
            StoredNode {
                path: path.to_string(),
                type_id,
                index,
            },
        );
    }

    /// Add an ordinary content node.
    pub fn add_content(&self, id: NodeId, path: &str) {
        self.add_node(id, path, FILE_TYPE_ID, 0);
    }

    /// Add a preview folder (a `Previews` root or a version folder).
    pub fn add_folder(&self, id: NodeId, path: &str) {
        self.add_node(id, path, FOLDER_TYPE_ID, 0);
    }

    /// Add a preview image with its ordinal index.
    pub fn add_image(&self, id: NodeId, path: &str, index: i32) {
        self.add_node(id, path, IMAGE_TYPE_ID, index);
    }

    pub fn set_last_versions(&self, content_path: &str, last: LastVersions) {
        self.state()
            .last_versions
            .insert(content_path.to_string(), last);
    }

    /// Fail the next `count` candidate loads.
    pub fn fail_next_loads(&self, count: u32) {
        self.state().failing_loads = count;
    }

    /// Fail the next `count` last-version lookups.
    pub fn fail_next_lookups(&self, count: u32) {
        self.state().failing_lookups = count;
    }

    /// Fail the next `count` deletions of `node_id`.
    pub fn fail_deletes(&self, node_id: NodeId, count: u32) {
        self.state().failing_deletes.insert(node_id, count);
    }

    /// Delay every last-version lookup.
    pub fn set_lookup_delay(&self, delay: Duration) {
        self.state().lookup_delay = delay;
    }

    /// Every candidate query received, failed ones included.
    pub fn loads(&self) -> Vec<CandidateQuery> {
        self.state().loads.clone()
    }

    /// Number of last-version lookups received, failed ones included.
    pub fn version_lookups(&self) -> usize {
        self.state().version_lookups
    }

    /// Identifiers passed to successful deletions, ascending.
    pub fn deleted_ids(&self) -> Vec<NodeId> {
        let mut ids = self.state().deleted.clone();
        ids.sort_unstable();
        ids
    }

    pub fn contains(&self, node_id: NodeId) -> bool {
        self.state().nodes.contains_key(&node_id)
    }

    /// Identifiers of every node still present, ascending.
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.state().nodes.keys().copied().collect()
    }
}

fn is_preview_folder(path: &str) -> bool {
    path_name(path) == PREVIEWS_FOLDER_NAME || path.contains("/Previews/V")
}

fn matches(state: &State, id: NodeId, node: &StoredNode, query: &CandidateQuery) -> bool {
    if id <= query.min_id || node.type_id != query.node_type_id {
        return false;
    }

    if let Some(prefix) = &query.path_prefix {
        if !node.path.starts_with(&format!("{prefix}/")) {
            return false;
        }
    }

    match query.kind {
        CandidateKind::VersionFolders => is_preview_folder(&node.path),
        CandidateKind::PreviewRoots => path_name(&node.path) == PREVIEWS_FOLDER_NAME,
        CandidateKind::EmptyFolders => {
            is_preview_folder(&node.path)
                && !state
                    .nodes
                    .values()
                    .any(|child| parent_path(&child.path) == Some(node.path.as_str()))
        }
        CandidateKind::PreviewImages => node.index > query.index_threshold.unwrap_or(0),
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn load_candidates(
        &self,
        query: &CandidateQuery,
    ) -> Result<Vec<CandidateNode>, StoreError> {
        let mut state = self.state();
        state.loads.push(query.clone());

        if state.failing_loads > 0 {
            state.failing_loads -= 1;
            return Err(StoreError::Unavailable("candidate query timed out".into()));
        }

        Ok(state
            .nodes
            .iter()
            .filter(|(id, node)| matches(&state, **id, node, query))
            .take(query.page_size)
            .map(|(id, node)| CandidateNode::new(*id, node.path.clone()))
            .collect())
    }

    async fn delete_physical(&self, node_id: NodeId) -> Result<(), StoreError> {
        let mut state = self.state();

        if let Some(remaining) = state.failing_deletes.get_mut(&node_id) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(StoreError::Unavailable(format!(
                    "node {node_id} is locked by another transaction"
                )));
            }
        }

        if let Some(node) = state.nodes.remove(&node_id) {
            let subtree = format!("{}/", node.path);
            state.nodes.retain(|_, n| !n.path.starts_with(&subtree));
        }
        state.deleted.push(node_id);

        Ok(())
    }

    async fn last_versions(&self, content_path: &str) -> Result<LastVersions, StoreError> {
        let delay = {
            let mut state = self.state();
            state.version_lookups += 1;
            state.lookup_delay
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        if state.failing_lookups > 0 {
            state.failing_lookups -= 1;
            return Err(StoreError::Unavailable("version lookup timed out".into()));
        }

        Ok(state
            .last_versions
            .get(content_path)
            .copied()
            .unwrap_or_default())
    }

    async fn resolve_type_id(&self, type_name: &str) -> Result<i64, StoreError> {
        self.state()
            .types
            .get(type_name)
            .copied()
            .ok_or_else(|| StoreError::UnknownType(type_name.to_string()))
    }
}
