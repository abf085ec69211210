//! Collaborators the engine reads flag definitions and project ownership from.
//!
//! The management layer owns these records; the engine only looks them up.

mod memory;
mod postgres;

pub use memory::InMemoryFlagStore;
pub use postgres::PgFlagStore;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::evaluation::model::{Flag, UnknownVariant};

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt flag record: {0}")]
    Corrupt(#[from] UnknownVariant),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Resolves flag aggregates (flag, rule sets, conditions, items)
#[async_trait]
pub trait FlagLookup: Send + Sync {
    async fn find_by_key(
        &self,
        project_id: Uuid,
        environment_id: Uuid,
        key: &str,
    ) -> StoreResult<Option<Flag>>;

    async fn find_by_id(&self, flag_id: Uuid) -> StoreResult<Option<Flag>>;
}

/// Maps a project to the organization that owns it
#[async_trait]
pub trait ProjectResolver: Send + Sync {
    async fn organization_of(&self, project_id: Uuid) -> StoreResult<Option<Uuid>>;
}
