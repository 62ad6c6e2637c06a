use async_trait::async_trait;
use sqlx::{PgPool, Row};

use super::ModelRegistry;
use crate::error::{RecsysError, Result};
use crate::models::{Model, ModelStatus};

/// Postgres-backed model registry.
///
/// Expected schema:
///
/// ```sql
/// CREATE TABLE recsys.models (
///     model_id     INTEGER PRIMARY KEY,
///     model_status TEXT NOT NULL DEFAULT 'pending',
///     weights_path TEXT NOT NULL DEFAULT '',
///     updated_at   TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
///     last_error   TEXT
/// );
/// ```
pub struct PgModelRegistry {
    pool: PgPool,
}

impl PgModelRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ModelRegistry for PgModelRegistry {
    async fn get(&self, model_id: i32) -> Result<Model> {
        let row = sqlx::query(
            r#"
            SELECT model_id, model_status, weights_path, updated_at, last_error
            FROM recsys.models
            WHERE model_id = $1
            "#,
        )
        .bind(model_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RecsysError::Storage(format!("read model {}: {}", model_id, e)))?
        .ok_or_else(|| RecsysError::NotFound(format!("unknown model {}", model_id)))?;

        let status_text: String = row
            .try_get("model_status")
            .map_err(|e| RecsysError::Storage(format!("decode model {}: {}", model_id, e)))?;
        let status = ModelStatus::parse(&status_text).ok_or_else(|| {
            RecsysError::Storage(format!(
                "model {} has unknown status {}",
                model_id, status_text
            ))
        })?;

        Ok(Model {
            model_id,
            status,
            weights_path: row
                .try_get("weights_path")
                .map_err(|e| RecsysError::Storage(format!("decode model {}: {}", model_id, e)))?,
            updated_at: row
                .try_get("updated_at")
                .map_err(|e| RecsysError::Storage(format!("decode model {}: {}", model_id, e)))?,
            last_error: row
                .try_get("last_error")
                .map_err(|e| RecsysError::Storage(format!("decode model {}: {}", model_id, e)))?,
        })
    }

    async fn begin_training(&self, model_id: i32) -> Result<()> {
        // Single-statement compare-and-set: the insert creates a fresh row,
        // the conflict arm claims an existing one unless it is mid-training.
        let result = sqlx::query(
            r#"
            INSERT INTO recsys.models (model_id, model_status, updated_at)
            VALUES ($1, 'training', CURRENT_TIMESTAMP)
            ON CONFLICT (model_id) DO UPDATE
                SET model_status = 'training',
                    updated_at = CURRENT_TIMESTAMP,
                    last_error = NULL
                WHERE recsys.models.model_status <> 'training'
            "#,
        )
        .bind(model_id)
        .execute(&self.pool)
        .await
        .map_err(|e| RecsysError::Storage(format!("claim model {}: {}", model_id, e)))?;

        if result.rows_affected() == 0 {
            return Err(RecsysError::Conflict(format!(
                "training already in progress for model {}",
                model_id
            )));
        }
        Ok(())
    }

    async fn mark_ready(&self, model_id: i32) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE recsys.models
            SET model_status = 'ready', updated_at = CURRENT_TIMESTAMP, last_error = NULL
            WHERE model_id = $1 AND model_status = 'training'
            "#,
        )
        .bind(model_id)
        .execute(&self.pool)
        .await
        .map_err(|e| RecsysError::Storage(format!("commit model {}: {}", model_id, e)))?;

        if result.rows_affected() == 0 {
            return Err(RecsysError::Conflict(format!(
                "model {} is not in a training run",
                model_id
            )));
        }
        Ok(())
    }

    async fn mark_failed(&self, model_id: i32, message: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE recsys.models
            SET model_status = 'failed', updated_at = CURRENT_TIMESTAMP, last_error = $2
            WHERE model_id = $1 AND model_status = 'training'
            "#,
        )
        .bind(model_id)
        .bind(message)
        .execute(&self.pool)
        .await
        .map_err(|e| RecsysError::Storage(format!("fail model {}: {}", model_id, e)))?;

        if result.rows_affected() == 0 {
            return Err(RecsysError::Conflict(format!(
                "model {} is not in a training run",
                model_id
            )));
        }
        Ok(())
    }
}
