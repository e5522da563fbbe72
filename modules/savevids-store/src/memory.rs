//! In-memory document store. No database required.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::document::{Document, DocumentStore};
use crate::error::{Result, StoreError};

/// Thread-safe in-memory store. Every operation holds the lock for its whole
/// duration, which gives the same per-document atomicity as the real store.
#[derive(Default)]
pub struct MemoryDocumentStore {
    docs: Mutex<HashMap<(String, String), Document>>,
    unavailable: Mutex<HashSet<String>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document directly, replacing any existing one.
    pub fn insert(&self, collection: &str, key: &str, doc: Document) {
        self.docs
            .lock()
            .unwrap()
            .insert((collection.to_string(), key.to_string()), doc);
    }

    /// Make every operation on `collection` fail with a transient error.
    pub fn fail_collection(&self, collection: &str) {
        self.unavailable.lock().unwrap().insert(collection.to_string());
    }

    /// Read a document without going through the async API (for test assertions).
    pub fn peek(&self, collection: &str, key: &str) -> Option<Document> {
        self.docs
            .lock()
            .unwrap()
            .get(&(collection.to_string(), key.to_string()))
            .cloned()
    }

    /// Number of documents in a collection.
    pub fn count(&self, collection: &str) -> usize {
        self.docs
            .lock()
            .unwrap()
            .keys()
            .filter(|(c, _)| c == collection)
            .count()
    }

    fn check_available(&self, collection: &str) -> Result<()> {
        if self.unavailable.lock().unwrap().contains(collection) {
            return Err(StoreError::Unavailable(format!("collection {collection} is offline")));
        }
        Ok(())
    }
}

fn doc_key(collection: &str, key: &str) -> (String, String) {
    (collection.to_string(), key.to_string())
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Document>> {
        self.check_available(collection)?;
        Ok(self.docs.lock().unwrap().get(&doc_key(collection, key)).cloned())
    }

    async fn create_if_absent(&self, collection: &str, key: &str, fields: Document) -> Result<bool> {
        self.check_available(collection)?;
        let mut docs = self.docs.lock().unwrap();
        let slot = doc_key(collection, key);
        if docs.contains_key(&slot) {
            return Ok(false);
        }
        docs.insert(slot, fields);
        Ok(true)
    }

    async fn update_fields(&self, collection: &str, key: &str, fields: Document) -> Result<()> {
        self.check_available(collection)?;
        let mut docs = self.docs.lock().unwrap();
        let doc = docs
            .get_mut(&doc_key(collection, key))
            .ok_or_else(|| StoreError::not_found(collection, key))?;
        for (k, v) in fields {
            doc.insert(k, v);
        }
        Ok(())
    }

    async fn atomic_increment(&self, collection: &str, key: &str, field: &str) -> Result<i64> {
        self.check_available(collection)?;
        let mut docs = self.docs.lock().unwrap();
        let doc = docs
            .get_mut(&doc_key(collection, key))
            .ok_or_else(|| StoreError::not_found(collection, key))?;

        let current = match doc.get(field) {
            None | Some(Value::Null) => 0,
            Some(v) => v.as_i64().ok_or_else(|| StoreError::NotAnInteger {
                collection: collection.to_string(),
                key: key.to_string(),
                field: field.to_string(),
            })?,
        };
        let next = current + 1;
        doc.insert(field.to_string(), Value::from(next));
        Ok(next)
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<bool> {
        self.check_available(collection)?;
        Ok(self.docs.lock().unwrap().remove(&doc_key(collection, key)).is_some())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn create_if_absent_keeps_first_writer() {
        let store = MemoryDocumentStore::new();
        assert!(store.create_if_absent("videos", "2", doc(json!({"n": 1}))).await.unwrap());
        assert!(!store.create_if_absent("videos", "2", doc(json!({"n": 9}))).await.unwrap());
        assert_eq!(store.peek("videos", "2").unwrap()["n"], 1);
    }

    #[tokio::test]
    async fn increment_treats_missing_field_as_zero() {
        let store = MemoryDocumentStore::new();
        store.insert("videos", "2", doc(json!({})));
        assert_eq!(store.atomic_increment("videos", "2", "requested_count").await.unwrap(), 1);
        assert_eq!(store.atomic_increment("videos", "2", "requested_count").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn increment_on_missing_document_is_not_found() {
        let store = MemoryDocumentStore::new();
        let err = store.atomic_increment("videos", "2", "requested_count").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn update_fields_merges_top_level_keys() {
        let store = MemoryDocumentStore::new();
        store.insert("users", "didier", doc(json!({"handle": "didier", "user_id": "7"})));
        store
            .update_fields("users", "didier", doc(json!({"user_id": "8", "extra": true})))
            .await
            .unwrap();
        let stored = store.peek("users", "didier").unwrap();
        assert_eq!(stored["handle"], "didier");
        assert_eq!(stored["user_id"], "8");
        assert_eq!(stored["extra"], true);
    }

    #[tokio::test]
    async fn offline_collection_fails_transiently() {
        let store = MemoryDocumentStore::new();
        store.fail_collection("banned");
        let err = store.get("banned", "7").await.unwrap_err();
        assert!(err.is_transient());
        assert!(store.get("videos", "2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_reports_removal() {
        let store = MemoryDocumentStore::new();
        store.insert("videos", "2", doc(json!({})));
        assert!(store.delete("videos", "2").await.unwrap());
        assert!(!store.delete("videos", "2").await.unwrap());
    }
}
