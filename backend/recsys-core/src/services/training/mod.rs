use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::dataset::Dataset;
use crate::error::{RecsysError, Result};
use crate::models::EMBEDDING_DIM;
use crate::registry::ModelRegistry;
use crate::storage::VectorStore;

/// Produces one embedding per distinct item. Implementations fill the
/// caller's buffer in place; the trainer reuses a single scratch buffer for
/// the whole run, so a policy must overwrite every component.
pub trait TrainingPolicy: Send {
    fn embed_item(&mut self, item_id: &str, out: &mut [f32]);
}

/// Baseline policy: i.i.d. uniform components in [-1, 1].
///
/// The generator is injected so training runs are reproducible; hosts that do
/// not care can use [`RandomInitPolicy::new`].
pub struct RandomInitPolicy {
    rng: StdRng,
}

impl RandomInitPolicy {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomInitPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl TrainingPolicy for RandomInitPolicy {
    fn embed_item(&mut self, _item_id: &str, out: &mut [f32]) {
        for component in out.iter_mut() {
            *component = self.rng.gen_range(-1.0..=1.0);
        }
    }
}

/// Derives item embeddings from a dataset and manages the model lifecycle.
pub struct Trainer {
    store: Arc<dyn VectorStore>,
    registry: Arc<dyn ModelRegistry>,
}

impl Trainer {
    pub fn new(store: Arc<dyn VectorStore>, registry: Arc<dyn ModelRegistry>) -> Self {
        Self { store, registry }
    }

    /// Trains `model_id` from the distinct items of `item_column` in `table`.
    ///
    /// The model is claimed up front (a concurrent run is a conflict) and is
    /// never left `training`: success commits `ready`, any failure or a
    /// cancellation signal records `failed` and propagates the error.
    /// Embeddings written before a mid-run failure remain; re-running is the
    /// recovery path since per-item writes are idempotent.
    ///
    /// `user_column` is carried for policies that learn from interaction
    /// rows; the baseline initializer ignores it beyond the start log.
    #[allow(clippy::too_many_arguments)]
    pub async fn train(
        &self,
        dataset: &dyn Dataset,
        table: &str,
        user_column: &str,
        item_column: &str,
        model_id: i32,
        policy: &mut dyn TrainingPolicy,
        cancel: Option<&watch::Receiver<bool>>,
    ) -> Result<()> {
        self.registry.begin_training(model_id).await?;
        info!(model_id, table, user_column, item_column, "training started");

        // A failed ready-commit goes through the same failure branch as the
        // run itself, so the model can never come out of here still training.
        let committed = match self.run(dataset, table, item_column, model_id, policy, cancel).await
        {
            Ok(count) => self.registry.mark_ready(model_id).await.map(|()| count),
            Err(e) => Err(e),
        };

        match committed {
            Ok(count) => {
                info!(model_id, items = count, "training committed");
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                if let Err(mark_err) = self.registry.mark_failed(model_id, &message).await {
                    warn!(model_id, error = %mark_err, "failed to record training failure");
                }
                warn!(model_id, error = %message, "training aborted");
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        dataset: &dyn Dataset,
        table: &str,
        item_column: &str,
        model_id: i32,
        policy: &mut dyn TrainingPolicy,
        cancel: Option<&watch::Receiver<bool>>,
    ) -> Result<usize> {
        let items = dataset.select_distinct(table, item_column).await?;
        debug!(model_id, items = items.len(), "resolved distinct items");

        // One scratch buffer for the whole run; the policy refills it per item.
        let mut buffer = vec![0.0f32; EMBEDDING_DIM];

        for item_id in &items {
            if cancel.map(|rx| *rx.borrow()).unwrap_or(false) {
                return Err(RecsysError::Cancelled(model_id));
            }
            policy.embed_item(item_id, &mut buffer);
            self.store.put(model_id, item_id, &buffer).await?;
        }

        Ok(items.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baseline_policy_stays_in_bounds() {
        let mut policy = RandomInitPolicy::seeded(7);
        let mut buffer = vec![0.0f32; EMBEDDING_DIM];
        policy.embed_item("a", &mut buffer);
        assert!(buffer.iter().all(|v| (-1.0..=1.0).contains(v)));
        // Uniform draws over 128 components are not all identical.
        assert!(buffer.iter().any(|v| *v != buffer[0]));
    }

    #[test]
    fn test_seeded_policy_is_reproducible() {
        let mut a = RandomInitPolicy::seeded(42);
        let mut b = RandomInitPolicy::seeded(42);
        let mut buf_a = vec![0.0f32; EMBEDDING_DIM];
        let mut buf_b = vec![0.0f32; EMBEDDING_DIM];
        a.embed_item("x", &mut buf_a);
        b.embed_item("x", &mut buf_b);
        assert_eq!(buf_a, buf_b);
    }
}
