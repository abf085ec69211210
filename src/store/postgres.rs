use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use super::{FlagLookup, ProjectResolver, StoreResult};
use crate::evaluation::model::{Flag, RuleCondition, RuleConditionItem, RuleSet};

// Database row types for batch queries
#[derive(Debug, sqlx::FromRow)]
struct FlagRow {
    id: Uuid,
    project_id: Uuid,
    environment_id: Uuid,
    key: String,
    enabled: bool,
    return_value_type: String,
    default_value_on_raw: Option<String>,
    default_value_off_raw: Option<String>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct RuleSetRow {
    id: Uuid,
    priority: i32,
    bucketing_seed: i64,
    percentage: i32,
    return_value_raw: Option<String>,
    off_return_value_raw: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct ConditionRow {
    id: Uuid,
    rule_set_id: Uuid,
    field: String,
    field_type: String,
    operator: String,
    value_string: Option<String>,
    value_number: Option<f64>,
    value_boolean: Option<bool>,
}

#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    rule_condition_id: Uuid,
    value_string: Option<String>,
    value_number: Option<f64>,
}

const FLAG_COLUMNS: &str = "id, project_id, environment_id, key, enabled, return_value_type, \
     default_value_on_raw, default_value_off_raw, updated_at";

/// Reads flag aggregates from the management layer's Postgres tables
#[derive(Clone)]
pub struct PgFlagStore {
    db: PgPool,
}

impl PgFlagStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Load rule sets, conditions and items for a flag in three round trips
    async fn load_aggregate(&self, row: FlagRow) -> StoreResult<Flag> {
        let rule_sets: Vec<RuleSetRow> = sqlx::query_as(
            r#"
            SELECT id, priority, bucketing_seed, percentage, return_value_raw, off_return_value_raw
            FROM rule_sets
            WHERE flag_id = $1
            ORDER BY priority ASC
            "#,
        )
        .bind(row.id)
        .fetch_all(&self.db)
        .await?;

        let rule_set_ids: Vec<Uuid> = rule_sets.iter().map(|r| r.id).collect();

        let conditions: Vec<ConditionRow> = if rule_set_ids.is_empty() {
            Vec::new()
        } else {
            sqlx::query_as(
                r#"
                SELECT id, rule_set_id, field, field_type, operator,
                       value_string, value_number, value_boolean
                FROM rule_conditions
                WHERE rule_set_id = ANY($1)
                ORDER BY position ASC
                "#,
            )
            .bind(&rule_set_ids)
            .fetch_all(&self.db)
            .await?
        };

        let condition_ids: Vec<Uuid> = conditions.iter().map(|c| c.id).collect();

        let items: Vec<ItemRow> = if condition_ids.is_empty() {
            Vec::new()
        } else {
            sqlx::query_as(
                r#"
                SELECT rule_condition_id, value_string, value_number
                FROM rule_condition_items
                WHERE rule_condition_id = ANY($1)
                ORDER BY position ASC
                "#,
            )
            .bind(&condition_ids)
            .fetch_all(&self.db)
            .await?
        };

        let mut items_by_condition: HashMap<Uuid, Vec<RuleConditionItem>> = HashMap::new();
        for item in items {
            items_by_condition
                .entry(item.rule_condition_id)
                .or_default()
                .push(RuleConditionItem {
                    value_string: item.value_string,
                    value_number: item.value_number,
                });
        }

        let mut conditions_by_rule_set: HashMap<Uuid, Vec<RuleCondition>> = HashMap::new();
        for condition in conditions {
            let parsed = RuleCondition {
                id: condition.id,
                field: condition.field,
                field_type: condition.field_type.parse()?,
                operator: condition.operator.parse()?,
                value_string: condition.value_string,
                value_number: condition.value_number,
                value_boolean: condition.value_boolean,
                items: items_by_condition.remove(&condition.id).unwrap_or_default(),
            };
            conditions_by_rule_set
                .entry(condition.rule_set_id)
                .or_default()
                .push(parsed);
        }

        Ok(Flag {
            id: row.id,
            project_id: row.project_id,
            environment_id: row.environment_id,
            key: row.key,
            enabled: row.enabled,
            return_value_type: row.return_value_type.parse()?,
            default_value_on_raw: row.default_value_on_raw,
            default_value_off_raw: row.default_value_off_raw,
            rule_sets: rule_sets
                .into_iter()
                .map(|r| RuleSet {
                    id: r.id,
                    priority: r.priority,
                    bucketing_seed: r.bucketing_seed,
                    percentage: r.percentage,
                    return_value_raw: r.return_value_raw,
                    off_return_value_raw: r.off_return_value_raw,
                    conditions: conditions_by_rule_set.remove(&r.id).unwrap_or_default(),
                })
                .collect(),
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl FlagLookup for PgFlagStore {
    #[instrument(skip(self))]
    async fn find_by_key(
        &self,
        project_id: Uuid,
        environment_id: Uuid,
        key: &str,
    ) -> StoreResult<Option<Flag>> {
        let row: Option<FlagRow> = sqlx::query_as(&format!(
            "SELECT {FLAG_COLUMNS} FROM feature_flags \
             WHERE project_id = $1 AND environment_id = $2 AND key = $3"
        ))
        .bind(project_id)
        .bind(environment_id)
        .bind(key)
        .fetch_optional(&self.db)
        .await?;

        match row {
            Some(row) => Ok(Some(self.load_aggregate(row).await?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, flag_id: Uuid) -> StoreResult<Option<Flag>> {
        let row: Option<FlagRow> =
            sqlx::query_as(&format!("SELECT {FLAG_COLUMNS} FROM feature_flags WHERE id = $1"))
                .bind(flag_id)
                .fetch_optional(&self.db)
                .await?;

        match row {
            Some(row) => Ok(Some(self.load_aggregate(row).await?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ProjectResolver for PgFlagStore {
    #[instrument(skip(self))]
    async fn organization_of(&self, project_id: Uuid) -> StoreResult<Option<Uuid>> {
        let organization_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT organization_id FROM projects WHERE id = $1
            "#,
        )
        .bind(project_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(organization_id)
    }
}
