//! In-memory draft store for tests and throwaway sessions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::DatabaseError;

use super::traits::DraftStore;

#[derive(Default)]
pub struct MemoryDraftStore {
    drafts: RwLock<HashMap<String, Value>>,
    writes: AtomicUsize,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `save` calls so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DraftStore for MemoryDraftStore {
    async fn save(&self, key: &str, value: &Value) -> Result<(), DatabaseError> {
        self.drafts
            .write()
            .await
            .insert(key.to_string(), value.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<Value>, DatabaseError> {
        Ok(self.drafts.read().await.get(key).cloned())
    }

    async fn clear(&self, key: &str) -> Result<bool, DatabaseError> {
        Ok(self.drafts.write().await.remove(key).is_some())
    }
}
