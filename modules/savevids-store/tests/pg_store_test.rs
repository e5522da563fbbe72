//! Integration tests for PgDocumentStore.
//! Requires a Postgres instance. Set DATABASE_TEST_URL or these tests are skipped.

use savevids_store::{Document, DocumentStore, PgDocumentStore, StoreError};
use serde_json::json;

/// Connect and migrate, or skip if no test DB is available.
async fn test_store(collection: &str) -> Option<PgDocumentStore> {
    let url = std::env::var("DATABASE_TEST_URL").ok()?;
    let store = PgDocumentStore::connect(&url).await.ok()?;
    store.migrate().await.ok()?;

    // Clean slate for the collection this test uses
    sqlx::query("DELETE FROM documents WHERE collection = $1")
        .bind(collection)
        .execute(store.pool())
        .await
        .ok()?;

    Some(store)
}

fn doc(value: serde_json::Value) -> Document {
    value.as_object().cloned().unwrap()
}

#[tokio::test]
async fn create_if_absent_only_inserts_once() {
    let Some(store) = test_store("pg-create").await else {
        return;
    };

    assert!(store.create_if_absent("pg-create", "2", doc(json!({"n": 1}))).await.unwrap());
    assert!(!store.create_if_absent("pg-create", "2", doc(json!({"n": 9}))).await.unwrap());

    let stored = store.get("pg-create", "2").await.unwrap().unwrap();
    assert_eq!(stored["n"], 1);
}

#[tokio::test]
async fn update_fields_merges_and_requires_existing_document() {
    let Some(store) = test_store("pg-update").await else {
        return;
    };

    store
        .create_if_absent("pg-update", "didier", doc(json!({"handle": "didier", "user_id": "7"})))
        .await
        .unwrap();
    store
        .update_fields("pg-update", "didier", doc(json!({"user_id": "8"})))
        .await
        .unwrap();

    let stored = store.get("pg-update", "didier").await.unwrap().unwrap();
    assert_eq!(stored["handle"], "didier");
    assert_eq!(stored["user_id"], "8");

    let err = store
        .update_fields("pg-update", "nobody", doc(json!({"x": 1})))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
}

#[tokio::test]
async fn concurrent_increments_are_not_lost() {
    let Some(store) = test_store("pg-incr").await else {
        return;
    };
    let store = std::sync::Arc::new(store);

    store
        .create_if_absent("pg-incr", "2", doc(json!({"requested_count": 1})))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.atomic_increment("pg-incr", "2", "requested_count").await.unwrap()
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    let stored = store.get("pg-incr", "2").await.unwrap().unwrap();
    assert_eq!(stored["requested_count"], 11);
}

#[tokio::test]
async fn delete_removes_document() {
    let Some(store) = test_store("pg-delete").await else {
        return;
    };

    store.create_if_absent("pg-delete", "2", Document::new()).await.unwrap();
    assert!(store.delete("pg-delete", "2").await.unwrap());
    assert!(store.get("pg-delete", "2").await.unwrap().is_none());
    assert!(!store.delete("pg-delete", "2").await.unwrap());
}
