mod postgres;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::{RecsysError, Result};
use crate::models::validate_vector;

pub use postgres::PgVectorStore;

/// Persisted item embeddings, keyed by `(model_id, item_id)`.
///
/// `put` is an upsert: a re-train overwrites, never duplicates. Writes to one
/// key are linearizable; concurrent writers leave exactly one of their
/// vectors behind, never a torn mix.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Upserts one embedding. Fails with a storage error unless the vector
    /// has exactly 128 finite components. Durable before returning.
    async fn put(&self, model_id: i32, item_id: &str, vector: &[f32]) -> Result<()>;

    /// Fails with `NotFound` if the key has no embedding.
    async fn get(&self, model_id: i32, item_id: &str) -> Result<Vec<f32>>;

    /// All item ids embedded for a model. Finite, restartable, and
    /// deterministic for a fixed store state; no other ordering guarantee.
    async fn list_items(&self, model_id: i32) -> Result<Vec<String>>;
}

/// In-memory store for tests and single-process hosts.
#[derive(Debug, Default)]
pub struct MemoryVectorStore {
    embeddings: DashMap<(i32, String), Vec<f32>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn put(&self, model_id: i32, item_id: &str, vector: &[f32]) -> Result<()> {
        validate_vector(model_id, item_id, vector)?;
        self.embeddings
            .insert((model_id, item_id.to_string()), vector.to_vec());
        Ok(())
    }

    async fn get(&self, model_id: i32, item_id: &str) -> Result<Vec<f32>> {
        self.embeddings
            .get(&(model_id, item_id.to_string()))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| {
                RecsysError::NotFound(format!(
                    "no embedding for model {} item {}",
                    model_id, item_id
                ))
            })
    }

    async fn list_items(&self, model_id: i32) -> Result<Vec<String>> {
        let mut items: Vec<String> = self
            .embeddings
            .iter()
            .filter(|entry| entry.key().0 == model_id)
            .map(|entry| entry.key().1.clone())
            .collect();
        // DashMap iteration order is not deterministic; sorting makes the
        // listing stable for a fixed store state.
        items.sort_unstable();
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EMBEDDING_DIM;

    fn unit_vector(index: usize) -> Vec<f32> {
        let mut v = vec![0.0f32; EMBEDDING_DIM];
        v[index] = 1.0;
        v
    }

    #[tokio::test]
    async fn test_put_get_round_trip() {
        let store = MemoryVectorStore::new();
        store.put(1, "a", &unit_vector(0)).await.unwrap();
        assert_eq!(store.get(1, "a").await.unwrap(), unit_vector(0));
    }

    #[tokio::test]
    async fn test_put_overwrites_same_key() {
        let store = MemoryVectorStore::new();
        store.put(1, "a", &unit_vector(0)).await.unwrap();
        store.put(1, "a", &unit_vector(1)).await.unwrap();
        assert_eq!(store.get(1, "a").await.unwrap(), unit_vector(1));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_put_rejects_bad_vectors() {
        let store = MemoryVectorStore::new();
        assert!(matches!(
            store.put(1, "a", &[1.0, 2.0]).await,
            Err(RecsysError::Storage(_))
        ));
        let mut inf = unit_vector(0);
        inf[3] = f32::INFINITY;
        assert!(matches!(
            store.put(1, "a", &inf).await,
            Err(RecsysError::Storage(_))
        ));
        // Nothing was persisted by the rejected writes.
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let store = MemoryVectorStore::new();
        assert!(store.get(9, "ghost").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_list_items_scoped_to_model() {
        let store = MemoryVectorStore::new();
        store.put(1, "b", &unit_vector(0)).await.unwrap();
        store.put(1, "a", &unit_vector(0)).await.unwrap();
        store.put(2, "c", &unit_vector(0)).await.unwrap();

        assert_eq!(store.list_items(1).await.unwrap(), vec!["a", "b"]);
        assert_eq!(store.list_items(2).await.unwrap(), vec!["c"]);
        assert!(store.list_items(3).await.unwrap().is_empty());
    }
}
