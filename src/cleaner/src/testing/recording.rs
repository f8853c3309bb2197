use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::IndexError;
use crate::events::{DeletionEvent, DeletionKind, DeletionListener};
use crate::model::NodeId;
use crate::store::{IndexField, IndexTerm, IndexWriter};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Index writer that records every removal batch.
#[derive(Debug, Default)]
pub struct RecordingIndex {
    batches: Mutex<Vec<Vec<IndexTerm>>>,
    failing: AtomicBool,
    attempts: AtomicUsize,
}

impl RecordingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every following write.
    pub fn fail_writes(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    /// Successfully written batches, in write order.
    pub fn batches(&self) -> Vec<Vec<IndexTerm>> {
        lock(&self.batches).clone()
    }

    /// Number of writes received, rejected ones included.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Values of every exact-path term written.
    pub fn removed_paths(&self) -> Vec<String> {
        lock(&self.batches)
            .iter()
            .flatten()
            .filter(|t| t.field == IndexField::Path)
            .map(|t| t.value.clone())
            .collect()
    }
}

#[async_trait]
impl IndexWriter for RecordingIndex {
    async fn remove_entries(&self, terms: Vec<IndexTerm>) -> Result<(), IndexError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        if self.failing.load(Ordering::SeqCst) {
            return Err(IndexError::Rejected("index writer is read-only".into()));
        }

        lock(&self.batches).push(terms);
        Ok(())
    }
}

/// Listener that keeps every event it receives.
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<DeletionEvent>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DeletionEvent> {
        lock(&self.events).clone()
    }

    /// Node identifiers announced for `kind`, in arrival order.
    pub fn ids(&self, kind: DeletionKind) -> Vec<NodeId> {
        lock(&self.events)
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| e.node_id)
            .collect()
    }
}

impl DeletionListener for RecordingListener {
    fn on_deleted(&self, event: DeletionEvent) {
        lock(&self.events).push(event);
    }
}
