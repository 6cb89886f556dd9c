use anyhow::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

use super::DocumentStore;

/// Holds documents in memory, grouped by collection.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, HashMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct documents stored in `collection`.
    pub fn count(&self, collection: &str) -> usize {
        self.collections
            .lock()
            .map(|c| c.get(collection).map_or(0, HashMap::len))
            .unwrap_or(0)
    }

    pub fn get(&self, collection: &str, id: &str) -> Option<Value> {
        self.collections
            .lock()
            .ok()?
            .get(collection)?
            .get(id)
            .cloned()
    }

    /// Ids in `collection`, sorted.
    pub fn ids(&self, collection: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .collections
            .lock()
            .map(|c| {
                c.get(collection)
                    .map(|docs| docs.keys().cloned().collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default();
        ids.sort();
        ids
    }
}

#[async_trait::async_trait]
impl DocumentStore for MemoryStore {
    async fn upsert(&self, collection: &str, id: &str, document: &Value) -> Result<()> {
        let mut collections = self
            .collections
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), document.clone());
        Ok(())
    }
}
