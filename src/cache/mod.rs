//! Evaluation result cache with per-flag invalidation.
//!
//! Cache keys embed a hash of the evaluation context, so they cannot be rebuilt from a
//! flag's identity alone. Every saved key is therefore also registered in an index set
//! keyed by the flag's scope, and invalidating a flag evicts whatever that set lists.
//! Entries still expire after a TTL in case an invalidation is missed.

pub mod error;
pub mod key;
pub mod store;

pub use error::{CacheError, CacheResult};
pub use store::{CacheStore, MemoryStore};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::evaluation::context::EvaluationContext;
use crate::evaluation::model::FlagScope;
use crate::evaluation::EvaluationResult;

/// Get/save/invalidate contract the evaluation service talks to
#[async_trait]
pub trait EvaluationCache: Send + Sync {
    async fn get(
        &self,
        scope: &FlagScope,
        context: &EvaluationContext,
    ) -> CacheResult<Option<EvaluationResult>>;

    async fn save(
        &self,
        scope: &FlagScope,
        context: &EvaluationContext,
        result: &EvaluationResult,
    ) -> CacheResult<()>;

    /// Evict every cached evaluation of the flag, returning how many keys were listed
    async fn invalidate(&self, scope: &FlagScope) -> CacheResult<usize>;
}

/// [`EvaluationCache`] over any [`CacheStore`]
pub struct FlagEvaluationCache<S: CacheStore> {
    store: Arc<S>,
    ttl: Duration,
}

impl<S: CacheStore> FlagEvaluationCache<S> {
    pub fn new(store: Arc<S>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl<S: CacheStore> Clone for FlagEvaluationCache<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            ttl: self.ttl,
        }
    }
}

#[async_trait]
impl<S: CacheStore> EvaluationCache for FlagEvaluationCache<S> {
    async fn get(
        &self,
        scope: &FlagScope,
        context: &EvaluationContext,
    ) -> CacheResult<Option<EvaluationResult>> {
        let key = key::evaluation_key(scope, context);

        let Some(raw) = self.store.get(&key).await? else {
            debug!(%key, "evaluation cache miss");
            return Ok(None);
        };

        debug!(%key, "evaluation cache hit");
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| CacheError::Deserialization(e.to_string()))
    }

    async fn save(
        &self,
        scope: &FlagScope,
        context: &EvaluationContext,
        result: &EvaluationResult,
    ) -> CacheResult<()> {
        let key = key::evaluation_key(scope, context);
        let raw =
            serde_json::to_string(result).map_err(|e| CacheError::Serialization(e.to_string()))?;

        // Register first. An invalidation landing between these two calls takes the
        // index record with it, and the value written after is only bounded by the TTL.
        self.store
            .add_to_set(&key::index_key(scope), &key, self.ttl)
            .await?;
        self.store.set(&key, raw, self.ttl).await
    }

    async fn invalidate(&self, scope: &FlagScope) -> CacheResult<usize> {
        let keys = self.store.take_set(&key::index_key(scope)).await?;
        self.store.delete_many(&keys).await?;

        debug!(flag_key = %scope.flag_key, evicted = keys.len(), "invalidated flag evaluations");
        Ok(keys.len())
    }
}
