//! The [`CheckpointSaver`] trait: the storage abstraction checkpointed graphs
//! run against. Swappable for a persistent backend without touching graph
//! execution code.

use crate::checkpoint::CheckpointEntry;
use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait CheckpointSaver: Send + Sync {
    /// Persist a new checkpoint for `thread_id`, appending to its history.
    async fn put(&self, thread_id: &str, entry: CheckpointEntry) -> Result<()>;

    /// The most recently written checkpoint for `thread_id`, if any.
    async fn get_latest(&self, thread_id: &str) -> Result<Option<CheckpointEntry>>;

    /// Full ordered history for `thread_id` (oldest first).
    async fn list(&self, thread_id: &str) -> Result<Vec<CheckpointEntry>>;

    /// Drop all checkpoints for `thread_id`.
    async fn delete_thread(&self, thread_id: &str) -> Result<()>;
}
