//! In-memory collaborators for exercising the cleanup engine without a
//! database.

mod memory_store;
mod recording;

pub use memory_store::InMemoryContentStore;
pub use recording::{RecordingIndex, RecordingListener};

/// Type identifier the in-memory store assigns to preview folders.
pub const FOLDER_TYPE_ID: i64 = 3;
/// Type identifier the in-memory store assigns to preview images.
pub const IMAGE_TYPE_ID: i64 = 7;
/// Type identifier for ordinary content nodes.
pub const FILE_TYPE_ID: i64 = 10;
