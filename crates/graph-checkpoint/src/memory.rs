//! In-memory [`CheckpointSaver`] — the only backend this workspace ships.
//!
//! Suitable for a single-process session: a client that reconnects mid-session
//! can resume observation by session id, but nothing survives a process
//! restart. A production deployment would swap this for a database-backed
//! saver without touching graph execution code.

use crate::checkpoint::CheckpointEntry;
use crate::error::Result;
use crate::traits::CheckpointSaver;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Default)]
pub struct InMemoryCheckpointSaver {
    storage: Arc<RwLock<HashMap<String, Vec<CheckpointEntry>>>>,
}

impl InMemoryCheckpointSaver {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn thread_count(&self) -> usize {
        self.storage.read().await.len()
    }
}

#[async_trait]
impl CheckpointSaver for InMemoryCheckpointSaver {
    async fn put(&self, thread_id: &str, entry: CheckpointEntry) -> Result<()> {
        let mut storage = self.storage.write().await;
        storage.entry(thread_id.to_string()).or_default().push(entry);
        Ok(())
    }

    async fn get_latest(&self, thread_id: &str) -> Result<Option<CheckpointEntry>> {
        let storage = self.storage.read().await;
        Ok(storage.get(thread_id).and_then(|v| v.last().cloned()))
    }

    async fn list(&self, thread_id: &str) -> Result<Vec<CheckpointEntry>> {
        let storage = self.storage.read().await;
        Ok(storage.get(thread_id).cloned().unwrap_or_default())
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        self.storage.write().await.remove(thread_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn put_then_get_latest_round_trips() {
        let saver = InMemoryCheckpointSaver::new();
        saver
            .put("session-1", CheckpointEntry::new(0, "orchestrator", json!({"phase": "init"})))
            .await
            .unwrap();
        saver
            .put("session-1", CheckpointEntry::new(1, "gather", json!({"phase": "gather"})))
            .await
            .unwrap();

        let latest = saver.get_latest("session-1").await.unwrap().unwrap();
        assert_eq!(latest.node_id, "gather");
        assert_eq!(saver.list("session-1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn delete_thread_clears_history() {
        let saver = InMemoryCheckpointSaver::new();
        saver
            .put("s", CheckpointEntry::new(0, "orchestrator", json!({})))
            .await
            .unwrap();
        saver.delete_thread("s").await.unwrap();
        assert!(saver.get_latest("s").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn threads_are_isolated() {
        let saver = InMemoryCheckpointSaver::new();
        saver.put("a", CheckpointEntry::new(0, "n", json!({}))).await.unwrap();
        saver.put("b", CheckpointEntry::new(0, "n", json!({}))).await.unwrap();
        assert_eq!(saver.thread_count().await, 2);
    }
}
