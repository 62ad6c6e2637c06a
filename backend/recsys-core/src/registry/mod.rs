mod postgres;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::{RecsysError, Result};
use crate::models::{Model, ModelStatus};

pub use postgres::PgModelRegistry;

/// Model rows are the serialization point for training: `begin_training` is
/// an atomic claim, and at most one run per model holds it at a time.
#[async_trait]
pub trait ModelRegistry: Send + Sync {
    /// Fails with `NotFound` for a model that was never trained or registered.
    async fn get(&self, model_id: i32) -> Result<Model>;

    /// Claims the model for a training run, creating the row on first use.
    /// A model already `training` is rejected with a conflict; `ready` and
    /// `failed` models restart through `pending`.
    async fn begin_training(&self, model_id: i32) -> Result<()>;

    /// Commits a successful run: `training -> ready`, stamps `updated_at`.
    async fn mark_ready(&self, model_id: i32) -> Result<()>;

    /// Records a failed run: `training -> failed`, keeps the error message so
    /// the model stays queryable with diagnostics.
    async fn mark_failed(&self, model_id: i32, message: &str) -> Result<()>;
}

/// In-memory registry. DashMap entry locking makes each transition atomic.
#[derive(Debug, Default)]
pub struct MemoryModelRegistry {
    models: DashMap<i32, Model>,
}

impl MemoryModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_model<T>(
        &self,
        model_id: i32,
        apply: impl FnOnce(&mut Model) -> Result<T>,
    ) -> Result<T> {
        let mut entry = self.models.get_mut(&model_id).ok_or_else(|| {
            RecsysError::NotFound(format!("unknown model {}", model_id))
        })?;
        apply(entry.value_mut())
    }
}

#[async_trait]
impl ModelRegistry for MemoryModelRegistry {
    async fn get(&self, model_id: i32) -> Result<Model> {
        self.models
            .get(&model_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| RecsysError::NotFound(format!("unknown model {}", model_id)))
    }

    async fn begin_training(&self, model_id: i32) -> Result<()> {
        let mut entry = self
            .models
            .entry(model_id)
            .or_insert_with(|| Model::new(model_id));
        let model = entry.value_mut();

        if model.status == ModelStatus::Training {
            return Err(RecsysError::Conflict(format!(
                "training already in progress for model {}",
                model_id
            )));
        }
        if model.status != ModelStatus::Pending {
            model.transition(ModelStatus::Pending)?;
        }
        model.transition(ModelStatus::Training)?;
        model.last_error = None;
        Ok(())
    }

    async fn mark_ready(&self, model_id: i32) -> Result<()> {
        self.with_model(model_id, |model| model.transition(ModelStatus::Ready))
    }

    async fn mark_failed(&self, model_id: i32, message: &str) -> Result<()> {
        self.with_model(model_id, |model| {
            model.transition(ModelStatus::Failed)?;
            model.last_error = Some(message.to_string());
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_model_is_not_found() {
        let registry = MemoryModelRegistry::new();
        assert!(registry.get(42).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_begin_training_claims_and_conflicts() {
        let registry = MemoryModelRegistry::new();
        registry.begin_training(1).await.unwrap();
        assert_eq!(registry.get(1).await.unwrap().status, ModelStatus::Training);

        let err = registry.begin_training(1).await.unwrap_err();
        assert!(matches!(err, RecsysError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_full_lifecycle() {
        let registry = MemoryModelRegistry::new();
        registry.begin_training(1).await.unwrap();
        registry.mark_ready(1).await.unwrap();
        assert_eq!(registry.get(1).await.unwrap().status, ModelStatus::Ready);

        // A ready model can be retrained.
        registry.begin_training(1).await.unwrap();
        registry.mark_failed(1, "storage write failed").await.unwrap();

        let model = registry.get(1).await.unwrap();
        assert_eq!(model.status, ModelStatus::Failed);
        assert_eq!(model.last_error.as_deref(), Some("storage write failed"));

        // And a failed model restarts at pending on the next run.
        registry.begin_training(1).await.unwrap();
        assert_eq!(registry.get(1).await.unwrap().status, ModelStatus::Training);
        assert_eq!(registry.get(1).await.unwrap().last_error, None);
    }

    #[tokio::test]
    async fn test_mark_ready_requires_training() {
        let registry = MemoryModelRegistry::new();
        registry.begin_training(1).await.unwrap();
        registry.mark_ready(1).await.unwrap();
        assert!(registry.mark_ready(1).await.is_err());
    }
}
