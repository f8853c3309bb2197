use std::sync::Arc;

use cleaner::retry::RetryPolicy;
use cleaner::testing::{InMemoryContentStore, RecordingIndex, RecordingListener};
use cleaner::{CleanupConfig, CleanupMode, PreviewCleaner};

pub struct Harness {
    pub store: Arc<InMemoryContentStore>,
    pub index: Arc<RecordingIndex>,
    pub listener: Arc<RecordingListener>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            store: Arc::new(InMemoryContentStore::new()),
            index: Arc::new(RecordingIndex::new()),
            listener: Arc::new(RecordingListener::new()),
        }
    }

    pub fn cleaner(&self, config: CleanupConfig) -> PreviewCleaner {
        PreviewCleaner::new(
            config,
            self.store.clone(),
            self.index.clone(),
            InMemoryContentStore::type_ids(),
        )
        .with_listener(self.listener.clone())
    }
}

/// Configuration without retry delays.
pub fn config(mode: CleanupMode, max_index: i32) -> CleanupConfig {
    CleanupConfig {
        mode,
        max_index,
        load_retry: RetryPolicy::immediate(3),
        delete_retry: RetryPolicy::immediate(3),
        ..Default::default()
    }
}

/// Content node at `path` with a `Previews` root and one version folder
/// holding a single image. Identifiers are `base`, `base + 1`, `base + 2`
/// and `base + 3`.
pub fn add_content_with_previews(store: &InMemoryContentStore, base: i64, path: &str, tag: &str) {
    store.add_content(base, path);
    store.add_folder(base + 1, &format!("{path}/Previews"));
    store.add_folder(base + 2, &format!("{path}/Previews/{tag}"));
    store.add_image(base + 3, &format!("{path}/Previews/{tag}/preview1.png"), 1);
}
