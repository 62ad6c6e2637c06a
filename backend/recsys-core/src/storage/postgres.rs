use async_trait::async_trait;
use sqlx::PgPool;

use super::VectorStore;
use crate::error::{RecsysError, Result};
use crate::models::validate_vector;

/// Postgres-backed embedding store.
///
/// Expected schema:
///
/// ```sql
/// CREATE TABLE recsys.item_embeddings (
///     model_id  INTEGER NOT NULL,
///     item_id   TEXT    NOT NULL,
///     embedding REAL[]  NOT NULL,
///     PRIMARY KEY (model_id, item_id)
/// );
/// ```
pub struct PgVectorStore {
    pool: PgPool,
}

impl PgVectorStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VectorStore for PgVectorStore {
    async fn put(&self, model_id: i32, item_id: &str, vector: &[f32]) -> Result<()> {
        validate_vector(model_id, item_id, vector)?;

        sqlx::query(
            r#"
            INSERT INTO recsys.item_embeddings (model_id, item_id, embedding)
            VALUES ($1, $2, $3)
            ON CONFLICT (model_id, item_id) DO UPDATE SET embedding = EXCLUDED.embedding
            "#,
        )
        .bind(model_id)
        .bind(item_id)
        .bind(vector.to_vec())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            RecsysError::Storage(format!(
                "write embedding for model {} item {}: {}",
                model_id, item_id, e
            ))
        })?;

        Ok(())
    }

    async fn get(&self, model_id: i32, item_id: &str) -> Result<Vec<f32>> {
        let embedding: Option<Vec<f32>> = sqlx::query_scalar(
            "SELECT embedding FROM recsys.item_embeddings WHERE model_id = $1 AND item_id = $2",
        )
        .bind(model_id)
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            RecsysError::Storage(format!(
                "read embedding for model {} item {}: {}",
                model_id, item_id, e
            ))
        })?;

        embedding.ok_or_else(|| {
            RecsysError::NotFound(format!(
                "no embedding for model {} item {}",
                model_id, item_id
            ))
        })
    }

    async fn list_items(&self, model_id: i32) -> Result<Vec<String>> {
        sqlx::query_scalar(
            "SELECT item_id FROM recsys.item_embeddings WHERE model_id = $1 ORDER BY item_id",
        )
        .bind(model_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RecsysError::Storage(format!("list items for model {}: {}", model_id, e)))
    }
}
