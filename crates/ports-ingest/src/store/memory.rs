//! In-memory store adapter

use std::collections::HashMap;

use async_trait::async_trait;
use ports_common::Result;
use tokio::sync::RwLock;
use tracing::trace;

use super::Store;

/// Process-lifetime map from key to value, safe for concurrent writers.
pub struct MemoryStore<T> {
    entries: RwLock<HashMap<String, T>>,
}

impl<T> MemoryStore<T> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl<T: Clone> MemoryStore<T> {
    /// Look up a stored value. Diagnostic helper, not part of [`Store`].
    pub async fn get(&self, key: &str) -> Option<T> {
        self.entries.read().await.get(key).cloned()
    }
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T> Store<T> for MemoryStore<T>
where
    T: Send + Sync + 'static,
{
    async fn set(&self, key: &str, value: T) -> Result<()> {
        let replaced = self.entries.write().await.insert(key.to_string(), value).is_some();
        trace!(key, replaced, "Stored entry");
        Ok(())
    }
}
