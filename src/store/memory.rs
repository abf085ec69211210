use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{FlagLookup, ProjectResolver, StoreResult};
use crate::evaluation::model::Flag;

/// Process-local flag and project records, for embedding and tests
#[derive(Clone, Default)]
pub struct InMemoryFlagStore {
    flags: Arc<RwLock<HashMap<Uuid, Flag>>>,
    projects: Arc<RwLock<HashMap<Uuid, Uuid>>>,
}

impl InMemoryFlagStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert_flag(&self, flag: Flag) {
        self.flags.write().await.insert(flag.id, flag);
    }

    pub async fn remove_flag(&self, flag_id: Uuid) -> Option<Flag> {
        self.flags.write().await.remove(&flag_id)
    }

    pub async fn register_project(&self, project_id: Uuid, organization_id: Uuid) {
        self.projects.write().await.insert(project_id, organization_id);
    }
}

#[async_trait]
impl FlagLookup for InMemoryFlagStore {
    async fn find_by_key(
        &self,
        project_id: Uuid,
        environment_id: Uuid,
        key: &str,
    ) -> StoreResult<Option<Flag>> {
        let flags = self.flags.read().await;
        Ok(flags
            .values()
            .find(|f| f.project_id == project_id && f.environment_id == environment_id && f.key == key)
            .cloned())
    }

    async fn find_by_id(&self, flag_id: Uuid) -> StoreResult<Option<Flag>> {
        Ok(self.flags.read().await.get(&flag_id).cloned())
    }
}

#[async_trait]
impl ProjectResolver for InMemoryFlagStore {
    async fn organization_of(&self, project_id: Uuid) -> StoreResult<Option<Uuid>> {
        Ok(self.projects.read().await.get(&project_id).copied())
    }
}
