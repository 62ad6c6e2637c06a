pub mod config;
pub mod dataset;
pub mod error;
pub mod models;
pub mod registry;
pub mod services;
pub mod storage;

pub use config::{format_config, parse_config, Config, ModelConfig};
pub use error::{RecsysError, Result};
pub use models::{
    InteractionRow, ItemEmbedding, Model, ModelStatus, RecommendationResult, EMBEDDING_DIM,
};
pub use services::{RandomInitPolicy, Recommender, RecsysService, Trainer, TrainingPolicy};
