//! The storage capability.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, StoreError};

/// A stored document: a JSON object.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Keyed JSON documents grouped in collections.
///
/// Every method acts on a single document atomically. Callers compose
/// read-modify-write sequences themselves and rely on `create_if_absent`
/// and `atomic_increment` where concurrent writers can collide.
///
/// Implemented by `PgDocumentStore` (postgres) and `MemoryDocumentStore`
/// (tests, local runs). Also implemented for `Arc<S>` so a store can be
/// shared with test assertions.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Document>>;

    /// Insert `fields` as a new document. Returns `false` and leaves the
    /// existing document untouched if the key is taken.
    async fn create_if_absent(&self, collection: &str, key: &str, fields: Document) -> Result<bool>;

    /// Merge `fields` into an existing document (top-level keys replaced).
    /// Fails with `NotFound` when the document does not exist.
    async fn update_fields(&self, collection: &str, key: &str, fields: Document) -> Result<()>;

    /// Add one to an integer field and return the new value. A missing field
    /// counts as zero; a missing document is `NotFound`.
    async fn atomic_increment(&self, collection: &str, key: &str, field: &str) -> Result<i64>;

    /// Returns whether a document was removed.
    async fn delete(&self, collection: &str, key: &str) -> Result<bool>;
}

#[async_trait]
impl<S: DocumentStore + ?Sized> DocumentStore for Arc<S> {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Document>> {
        (**self).get(collection, key).await
    }

    async fn create_if_absent(&self, collection: &str, key: &str, fields: Document) -> Result<bool> {
        (**self).create_if_absent(collection, key, fields).await
    }

    async fn update_fields(&self, collection: &str, key: &str, fields: Document) -> Result<()> {
        (**self).update_fields(collection, key, fields).await
    }

    async fn atomic_increment(&self, collection: &str, key: &str, field: &str) -> Result<i64> {
        (**self).atomic_increment(collection, key, field).await
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<bool> {
        (**self).delete(collection, key).await
    }
}

/// Serialize a struct into a document. Non-object values are rejected.
pub fn to_document<T: Serialize>(value: &T) -> Result<Document> {
    match serde_json::to_value(value)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(StoreError::Serialization(serde::ser::Error::custom(format!(
            "expected a JSON object, got {other}"
        )))),
    }
}

pub fn from_document<T: DeserializeOwned>(doc: Document) -> Result<T> {
    Ok(serde_json::from_value(serde_json::Value::Object(doc))?)
}
