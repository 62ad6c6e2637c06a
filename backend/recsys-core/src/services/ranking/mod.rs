use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, info};

use crate::dataset::Dataset;
use crate::error::{RecsysError, Result};
use crate::models::{RecommendationResult, EMBEDDING_DIM};
use crate::registry::ModelRegistry;
use crate::storage::VectorStore;

/// Default bound on the candidate pool scored per call.
pub const DEFAULT_CANDIDATE_LIMIT: usize = 10_000;

/// Scores candidate items against a user representation and returns a
/// thresholded, sorted top-k list. Read-only over store and registry.
pub struct Recommender {
    store: Arc<dyn VectorStore>,
    registry: Arc<dyn ModelRegistry>,
    candidate_limit: usize,
}

impl Recommender {
    pub fn new(store: Arc<dyn VectorStore>, registry: Arc<dyn ModelRegistry>) -> Self {
        Self {
            store,
            registry,
            candidate_limit: DEFAULT_CANDIDATE_LIMIT,
        }
    }

    /// Caps how many stored items are scored per call. `list_items` is
    /// deterministic for a fixed store state, so the capped pool is stable
    /// across calls too.
    pub fn with_candidate_limit(mut self, limit: usize) -> Self {
        self.candidate_limit = limit;
        self
    }

    /// Top-k recommendations for `user_id` under `model_id`.
    ///
    /// The user vector is the mean of the embeddings of items the user has
    /// interacted with; candidates are every item with a persisted embedding
    /// for the model. Candidates (or history items) without an embedding are
    /// skipped, tolerating embedding/dataset drift. Scores are cosine
    /// similarity; `score >= min_score` passes, results sort by descending
    /// score with ascending item-id tie-breaks, and `top_k = 0` is an empty
    /// result, not an error. `min_score` must be finite; a NaN threshold
    /// filters everything out.
    #[allow(clippy::too_many_arguments)]
    pub async fn recommend(
        &self,
        dataset: &dyn Dataset,
        table: &str,
        user_column: &str,
        item_column: &str,
        model_id: i32,
        user_id: &str,
        top_k: usize,
        min_score: f64,
    ) -> Result<Vec<RecommendationResult>> {
        // Unknown models fail before any dataset work.
        let model = self.registry.get(model_id).await?;
        debug!(model_id, status = model.status.as_str(), user_id, "recommend requested");

        if top_k == 0 {
            return Ok(Vec::new());
        }

        let user_vector = self
            .user_vector(dataset, table, user_column, item_column, model_id, user_id)
            .await?;

        let mut candidates = self.store.list_items(model_id).await?;
        candidates.truncate(self.candidate_limit);
        let mut results = Vec::new();
        for item_id in candidates {
            let vector = match self.store.get(model_id, &item_id).await {
                Ok(v) => v,
                // Deliberate policy: a candidate losing its embedding between
                // listing and scoring is drift, not an error.
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            };
            let score = cosine_similarity(&user_vector, &vector);
            if score >= min_score {
                results.push(RecommendationResult { item_id, score });
            }
        }

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.item_id.cmp(&b.item_id))
        });
        results.truncate(top_k);

        info!(
            model_id,
            user_id,
            returned = results.len(),
            top_k,
            min_score,
            "recommend completed"
        );
        Ok(results)
    }

    /// Mean of the embeddings of the user's interacted items. History items
    /// without an embedding are skipped; if none resolve, the user has no
    /// usable interactions.
    async fn user_vector(
        &self,
        dataset: &dyn Dataset,
        table: &str,
        user_column: &str,
        item_column: &str,
        model_id: i32,
        user_id: &str,
    ) -> Result<Vec<f64>> {
        let rows = dataset
            .select_rows(table, user_column, item_column, Some(user_id))
            .await?;

        let mut sum = vec![0.0f64; EMBEDDING_DIM];
        let mut resolved = 0usize;
        for row in &rows {
            match self.store.get(model_id, &row.item_id).await {
                Ok(vector) => {
                    for (acc, component) in sum.iter_mut().zip(&vector) {
                        *acc += f64::from(*component);
                    }
                    resolved += 1;
                }
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            }
        }

        if resolved == 0 {
            return Err(RecsysError::NoInteractions {
                model_id,
                user_id: user_id.to_string(),
            });
        }

        for component in sum.iter_mut() {
            *component /= resolved as f64;
        }
        debug!(model_id, user_id, history = rows.len(), resolved, "user vector built");
        Ok(sum)
    }
}

/// Cosine similarity between the user vector and an item embedding.
/// A zero vector on either side scores 0.0 instead of dividing by zero.
fn cosine_similarity(user: &[f64], item: &[f32]) -> f64 {
    let mut dot = 0.0f64;
    let mut norm_user = 0.0f64;
    let mut norm_item = 0.0f64;
    for (u, i) in user.iter().zip(item.iter()) {
        let i = f64::from(*i);
        dot += u * i;
        norm_user += u * u;
        norm_item += i * i;
    }
    if norm_user <= f64::EPSILON || norm_item <= f64::EPSILON {
        return 0.0;
    }
    dot / (norm_user.sqrt() * norm_item.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical_direction() {
        let user = vec![1.0f64, 0.0, 0.0];
        let item = vec![2.0f32, 0.0, 0.0];
        assert!((cosine_similarity(&user, &item) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let user = vec![1.0f64, 0.0];
        let item = vec![0.0f32, 1.0];
        assert_eq!(cosine_similarity(&user, &item), 0.0);
    }

    #[test]
    fn test_cosine_opposite() {
        let user = vec![1.0f64, 0.0];
        let item = vec![-1.0f32, 0.0];
        assert!((cosine_similarity(&user, &item) + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_zero_vector_scores_zero() {
        let user = vec![0.0f64; 4];
        let item = vec![1.0f32; 4];
        assert_eq!(cosine_similarity(&user, &item), 0.0);
    }

    #[test]
    fn test_cosine_known_angle() {
        // cos(60°) = 0.5
        let user = vec![1.0f64, 0.0];
        let item = vec![0.5f32, 0.866_025_4];
        assert!((cosine_similarity(&user, &item) - 0.5).abs() < 1e-6);
    }
}
