use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use super::model::{Flag, FlagScope};
use super::service::FlagEvaluationService;
use crate::error::{EvaluationError, Result};

/// Flag mutations raised by the management layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "flag", rename_all = "snake_case")]
pub enum FlagMutationEvent {
    Updated(Flag),
    Deleted(Flag),
}

impl FlagMutationEvent {
    pub fn flag(&self) -> &Flag {
        match self {
            FlagMutationEvent::Updated(flag) | FlagMutationEvent::Deleted(flag) => flag,
        }
    }
}

impl FlagEvaluationService {
    /// Drop every cached evaluation of the mutated flag
    ///
    /// Events only carry project and environment ids, so the owning organization is
    /// resolved first to rebuild the cache scope. Returns the number of evicted keys.
    #[instrument(skip(self, event), fields(flag_key = %event.flag().key))]
    pub async fn apply_mutation(&self, event: FlagMutationEvent) -> Result<usize> {
        let scope = self.scope_of(event.flag()).await?;

        match event {
            FlagMutationEvent::Updated(flag) => self.remember(Arc::new(flag)).await,
            FlagMutationEvent::Deleted(flag) => {
                let as_of = flag.updated_at;
                self.forget((flag.project_id, flag.environment_id, flag.key), as_of)
                    .await
            }
        }

        let evicted = self.cache.invalidate(&scope).await?;
        info!(evicted, "flag mutation applied to evaluation cache");

        Ok(evicted)
    }

    /// Re-read a flag by id and treat it as updated
    pub async fn refresh_flag(&self, flag_id: Uuid) -> Result<usize> {
        let flag = self
            .lookup_by_id(flag_id)
            .await?
            .ok_or_else(|| EvaluationError::FlagNotFound {
                key: flag_id.to_string(),
            })?;

        self.apply_mutation(FlagMutationEvent::Updated(flag)).await
    }

    async fn scope_of(&self, flag: &Flag) -> Result<FlagScope> {
        let organization_id = tokio::time::timeout(
            self.lookup_timeout,
            self.projects.organization_of(flag.project_id),
        )
        .await
        .map_err(|_| EvaluationError::LookupTimeout(self.lookup_timeout))?
        .map_err(|e| EvaluationError::LookupUnavailable(e.to_string()))?
        .ok_or(EvaluationError::ProjectNotFound(flag.project_id))?;

        Ok(FlagScope::new(
            organization_id,
            flag.project_id,
            flag.environment_id,
            flag.key.clone(),
        ))
    }
}
