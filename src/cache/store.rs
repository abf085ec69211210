//! Key/value store abstraction behind the evaluation cache.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::error::CacheResult;

/// Storage backend for cached evaluations and their invalidation index.
///
/// Besides plain string values a store keeps named sets of keys. Adding a member and
/// taking a whole set must each be atomic with respect to one another, so a set is
/// never observed half-updated.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get a value, `Ok(None)` when absent or expired.
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Set a value that expires after `ttl`.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> CacheResult<()>;

    /// Delete several keys. Missing keys are ignored.
    async fn delete_many(&self, keys: &[String]) -> CacheResult<()>;

    /// Add `member` to the set at `key`. The member itself expires after `ttl`, and
    /// re-adding it renews that.
    async fn add_to_set(&self, key: &str, member: &str, ttl: Duration) -> CacheResult<()>;

    /// Remove the set at `key` and return its live members.
    async fn take_set(&self, key: &str) -> CacheResult<Vec<String>>;
}

struct Entry<T> {
    value: T,
    expires_at: Instant,
}

impl<T> Entry<T> {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// In-process store for single-instance deployments.
#[derive(Clone, Default)]
pub struct MemoryStore {
    values: Arc<RwLock<HashMap<String, Entry<String>>>>,
    // Set name -> member -> member expiry
    sets: Arc<RwLock<HashMap<String, HashMap<String, Instant>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop expired values and expired set members, returning how many were removed.
    ///
    /// A set left without members is removed as well.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();

        let mut values = self.values.write().await;
        let before = values.len();
        values.retain(|_, entry| entry.is_live(now));
        let mut removed = before - values.len();
        drop(values);

        let mut sets = self.sets.write().await;
        for members in sets.values_mut() {
            let before = members.len();
            members.retain(|_, expires_at| *expires_at > now);
            removed += before - members.len();
        }
        sets.retain(|_, members| !members.is_empty());

        removed
    }

    /// Number of live members in the set at `key`
    pub async fn set_len(&self, key: &str) -> usize {
        let now = Instant::now();
        self.sets
            .read()
            .await
            .get(key)
            .map(|members| members.values().filter(|expires_at| **expires_at > now).count())
            .unwrap_or(0)
    }

    pub async fn len(&self) -> usize {
        self.values.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let values = self.values.read().await;
        Ok(values
            .get(key)
            .filter(|entry| entry.is_live(Instant::now()))
            .map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> CacheResult<()> {
        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.values.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete_many(&self, keys: &[String]) -> CacheResult<()> {
        let mut values = self.values.write().await;
        for key in keys {
            values.remove(key);
        }
        Ok(())
    }

    async fn add_to_set(&self, key: &str, member: &str, ttl: Duration) -> CacheResult<()> {
        let now = Instant::now();
        let mut sets = self.sets.write().await;
        let members = sets.entry(key.to_string()).or_default();

        members.retain(|_, expires_at| *expires_at > now);
        members.insert(member.to_string(), now + ttl);

        Ok(())
    }

    async fn take_set(&self, key: &str) -> CacheResult<Vec<String>> {
        let now = Instant::now();
        let mut sets = self.sets.write().await;
        Ok(sets
            .remove(key)
            .map(|members| {
                members
                    .into_iter()
                    .filter(|(_, expires_at)| *expires_at > now)
                    .map(|(member, _)| member)
                    .collect()
            })
            .unwrap_or_default())
    }
}
