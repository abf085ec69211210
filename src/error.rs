use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::cache::CacheError;
use crate::evaluation::validation::ValidationError;

pub type Result<T> = std::result::Result<T, EvaluationError>;

/// Outcomes of an evaluation or invalidation request that the caller has to see
#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("flag '{key}' not found")]
    FlagNotFound { key: String },

    #[error("project {0} not found")]
    ProjectNotFound(Uuid),

    #[error("flag lookup unavailable: {0}")]
    LookupUnavailable(String),

    #[error("flag lookup timed out after {0:?}")]
    LookupTimeout(Duration),

    #[error("evaluation cache unavailable: {0}")]
    CacheUnavailable(#[from] CacheError),
}
