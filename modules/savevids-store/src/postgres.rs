// Postgres-backed document store. One JSONB row per document.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::document::{Document, DocumentStore};
use crate::error::{Result, StoreError};

pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        info!("Connected to Postgres");
        Ok(Self::new(pool))
    }

    /// Run the embedded SQL migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.into()))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Document>> {
        let body = sqlx::query_scalar::<_, Value>(
            "SELECT body FROM documents WHERE collection = $1 AND doc_key = $2",
        )
        .bind(collection)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(body.and_then(|v| match v {
            Value::Object(map) => Some(map),
            _ => None,
        }))
    }

    async fn create_if_absent(&self, collection: &str, key: &str, fields: Document) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO documents (collection, doc_key, body)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, doc_key) DO NOTHING
            "#,
        )
        .bind(collection)
        .bind(key)
        .bind(Value::Object(fields))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_fields(&self, collection: &str, key: &str, fields: Document) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE documents
            SET body = body || $3, updated_at = now()
            WHERE collection = $1 AND doc_key = $2
            "#,
        )
        .bind(collection)
        .bind(key)
        .bind(Value::Object(fields))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(collection, key));
        }
        Ok(())
    }

    async fn atomic_increment(&self, collection: &str, key: &str, field: &str) -> Result<i64> {
        let next = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE documents
            SET body = jsonb_set(
                    body,
                    ARRAY[$3::text],
                    to_jsonb(COALESCE((body ->> $3)::bigint, 0) + 1)
                ),
                updated_at = now()
            WHERE collection = $1 AND doc_key = $2
            RETURNING (body ->> $3)::bigint
            "#,
        )
        .bind(collection)
        .bind(key)
        .bind(field)
        .fetch_optional(&self.pool)
        .await?;

        next.ok_or_else(|| StoreError::not_found(collection, key))
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND doc_key = $2")
            .bind(collection)
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
