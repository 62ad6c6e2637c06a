use thiserror::Error;

pub type Result<T> = std::result::Result<T, RecsysError>;

#[derive(Debug, Error)]
pub enum RecsysError {
    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("user {user_id} has no usable interactions for model {model_id}")]
    NoInteractions { model_id: i32, user_id: String },

    #[error("training cancelled for model {0}")]
    Cancelled(i32),

    #[error("config error: {0}")]
    Config(String),
}

impl RecsysError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RecsysError::NotFound(_))
    }
}
