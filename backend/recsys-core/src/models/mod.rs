// Domain models for the recommendation core

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RecsysError, Result};

/// Every persisted embedding has exactly this many components.
pub const EMBEDDING_DIM: usize = 128;

/// Model lifecycle status.
///
/// Legal transitions: `Pending -> Training -> {Ready, Failed}`, and
/// `{Ready, Failed} -> Pending` when a new training run restarts the model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ModelStatus {
    Pending,
    Training,
    Ready,
    Failed,
}

impl ModelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelStatus::Pending => "pending",
            ModelStatus::Training => "training",
            ModelStatus::Ready => "ready",
            ModelStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(ModelStatus::Pending),
            "training" => Some(ModelStatus::Training),
            "ready" => Some(ModelStatus::Ready),
            "failed" => Some(ModelStatus::Failed),
            _ => None,
        }
    }

    /// Whether `self -> next` is a legal lifecycle transition.
    pub fn can_transition_to(self, next: ModelStatus) -> bool {
        use ModelStatus::*;
        matches!(
            (self, next),
            (Pending, Training)
                | (Training, Ready)
                | (Training, Failed)
                | (Ready, Pending)
                | (Failed, Pending)
        )
    }
}

/// One row in the model registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    pub model_id: i32,
    pub status: ModelStatus,
    pub weights_path: String,
    pub updated_at: DateTime<Utc>,
    /// Message from the most recent failed run, if any.
    pub last_error: Option<String>,
}

impl Model {
    pub fn new(model_id: i32) -> Self {
        Self {
            model_id,
            status: ModelStatus::Pending,
            weights_path: String::new(),
            updated_at: Utc::now(),
            last_error: None,
        }
    }

    /// Applies a validated status transition and stamps `updated_at`.
    ///
    /// `Training -> Training` is the concurrent-training case and surfaces as
    /// a `Conflict`; every other illegal transition does too.
    pub fn transition(&mut self, next: ModelStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(RecsysError::Conflict(format!(
                "model {} cannot move from {} to {}",
                self.model_id,
                self.status.as_str(),
                next.as_str()
            )));
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// One persisted item embedding, unique per `(model_id, item_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemEmbedding {
    pub model_id: i32,
    pub item_id: String,
    pub vector: Vec<f32>,
}

/// One user/item interaction from the external dataset. Read-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InteractionRow {
    pub user_id: String,
    pub item_id: String,
}

/// One scored recommendation. Ordering is part of the `recommend` contract.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecommendationResult {
    pub item_id: String,
    pub score: f64,
}

/// Rejects vectors that are not exactly 128 finite components.
pub fn validate_vector(model_id: i32, item_id: &str, vector: &[f32]) -> Result<()> {
    if vector.len() != EMBEDDING_DIM {
        return Err(RecsysError::Storage(format!(
            "embedding for model {} item {} has {} components, expected {}",
            model_id,
            item_id,
            vector.len(),
            EMBEDDING_DIM
        )));
    }
    if let Some(idx) = vector.iter().position(|v| !v.is_finite()) {
        return Err(RecsysError::Storage(format!(
            "embedding for model {} item {} has non-finite component at index {}",
            model_id, item_id, idx
        )));
    }
    Ok(())
}
