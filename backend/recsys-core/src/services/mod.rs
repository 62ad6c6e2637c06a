mod ranking;
mod training;

use std::sync::Arc;
use tokio::sync::watch;

use crate::dataset::Dataset;
use crate::error::Result;
use crate::models::RecommendationResult;
use crate::registry::ModelRegistry;
use crate::storage::VectorStore;

pub use ranking::{Recommender, DEFAULT_CANDIDATE_LIMIT};
pub use training::{RandomInitPolicy, Trainer, TrainingPolicy};

/// In-process service facade a host (CLI, server, database extension) wraps.
pub struct RecsysService {
    dataset: Arc<dyn Dataset>,
    trainer: Trainer,
    recommender: Recommender,
}

impl RecsysService {
    pub fn new(
        dataset: Arc<dyn Dataset>,
        store: Arc<dyn VectorStore>,
        registry: Arc<dyn ModelRegistry>,
    ) -> Self {
        Self {
            dataset,
            trainer: Trainer::new(store.clone(), registry.clone()),
            recommender: Recommender::new(store, registry),
        }
    }

    /// Caps the candidate pool scored per `recommend` call. Hosts wire
    /// `Config::max_candidate_items` through here.
    pub fn with_candidate_limit(mut self, limit: usize) -> Self {
        self.recommender = self.recommender.with_candidate_limit(limit);
        self
    }

    /// Trains `model_id` with the baseline random-init policy.
    pub async fn train(
        &self,
        dataset_table: &str,
        user_column: &str,
        item_column: &str,
        model_id: i32,
    ) -> Result<()> {
        let mut policy = RandomInitPolicy::new();
        self.train_with_policy(
            dataset_table,
            user_column,
            item_column,
            model_id,
            &mut policy,
            None,
        )
        .await
    }

    /// Trains with a caller-supplied policy and optional cancellation signal.
    pub async fn train_with_policy(
        &self,
        dataset_table: &str,
        user_column: &str,
        item_column: &str,
        model_id: i32,
        policy: &mut dyn TrainingPolicy,
        cancel: Option<&watch::Receiver<bool>>,
    ) -> Result<()> {
        self.trainer
            .train(
                self.dataset.as_ref(),
                dataset_table,
                user_column,
                item_column,
                model_id,
                policy,
                cancel,
            )
            .await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn recommend(
        &self,
        model_id: i32,
        user_id: &str,
        dataset_table: &str,
        user_column: &str,
        item_column: &str,
        top_k: usize,
        min_score: f64,
    ) -> Result<Vec<RecommendationResult>> {
        self.recommender
            .recommend(
                self.dataset.as_ref(),
                dataset_table,
                user_column,
                item_column,
                model_id,
                user_id,
                top_k,
                min_score,
            )
            .await
    }
}
