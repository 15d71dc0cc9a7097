/// 内存文档库 (测试与单进程演示)
use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value;

use super::{check_collection, new_document_id, RecordStore, StoredDocument};
use crate::error::StoreError;

#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<StoredDocument>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("内存库锁已损坏".to_string())
}

impl RecordStore for MemoryStore {
    fn append(&self, collection: &str, id: Option<String>, doc: Value) -> Result<String, StoreError> {
        check_collection(collection)?;
        let mut collections = self.collections.write().map_err(|_| poisoned())?;
        let docs = collections.entry(collection.to_string()).or_default();

        let id = id.unwrap_or_else(|| new_document_id(collection));
        if docs.iter().any(|d| d.id == id) {
            return Err(StoreError::Duplicate {
                collection: collection.to_string(),
                id,
            });
        }
        docs.push(StoredDocument {
            id: id.clone(),
            data: doc,
        });
        Ok(id)
    }

    fn query_all(&self, collection: &str) -> Result<Vec<StoredDocument>, StoreError> {
        check_collection(collection)?;
        let collections = self.collections.read().map_err(|_| poisoned())?;
        Ok(collections.get(collection).cloned().unwrap_or_default())
    }
}
