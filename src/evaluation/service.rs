use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::bucketing::passes_percentage;
use super::conditions;
use super::context::EvaluationContext;
use super::model::{Flag, FlagScope, RuleSet};
use super::validation::{validate_context, validate_rule_set};
use super::value::{coerce, FlagValue};
use super::EvaluationResult;
use crate::cache::EvaluationCache;
use crate::error::{EvaluationError, Result};
use crate::store::{FlagLookup, ProjectResolver};

/// Everything needed to evaluate one flag for one subject
#[derive(Debug, Clone)]
pub struct EvaluateRequest {
    pub flag_key: String,
    pub project_id: Uuid,
    pub environment_id: Uuid,
    pub organization_id: Uuid,
    pub context: EvaluationContext,
}

impl EvaluateRequest {
    pub fn scope(&self) -> FlagScope {
        FlagScope::new(
            self.organization_id,
            self.project_id,
            self.environment_id,
            self.flag_key.clone(),
        )
    }
}

// (project, environment, flag key)
pub(crate) type FlagRef = (Uuid, Uuid, String);

// Newest state of a flag the service has seen
enum Snapshot {
    Live(Arc<Flag>),
    // Gone as of this time. Definitions updated no later than it are outdated.
    Deleted(DateTime<Utc>),
}

impl Snapshot {
    fn is_newer_than(&self, existing: &Snapshot) -> bool {
        match (self, existing) {
            (Snapshot::Live(flag), Snapshot::Live(known)) => flag.updated_at >= known.updated_at,
            (Snapshot::Live(flag), Snapshot::Deleted(at)) => flag.updated_at > *at,
            (Snapshot::Deleted(at), Snapshot::Live(known)) => *at >= known.updated_at,
            (Snapshot::Deleted(at), Snapshot::Deleted(known)) => at >= known,
        }
    }
}

/// Evaluates flags for callers, consulting the cache before the flag lookup
pub struct FlagEvaluationService {
    lookup: Arc<dyn FlagLookup>,
    pub(crate) projects: Arc<dyn ProjectResolver>,
    pub(crate) cache: Arc<dyn EvaluationCache>,
    pub(crate) lookup_timeout: Duration,
    // Last definition seen per flag, served when the lookup fails
    snapshots: RwLock<HashMap<FlagRef, Snapshot>>,
}

impl FlagEvaluationService {
    pub fn new(
        lookup: Arc<dyn FlagLookup>,
        projects: Arc<dyn ProjectResolver>,
        cache: Arc<dyn EvaluationCache>,
        lookup_timeout: Duration,
    ) -> Self {
        Self {
            lookup,
            projects,
            cache,
            lookup_timeout,
            snapshots: RwLock::new(HashMap::new()),
        }
    }

    /// Evaluate a flag for the request's context
    ///
    /// Cache failures fall through to live evaluation. A failed or timed out lookup is
    /// answered from the last-known definition of the flag when there is one.
    #[instrument(skip(self, request), fields(flag_key = %request.flag_key))]
    pub async fn evaluate(&self, request: &EvaluateRequest) -> Result<EvaluationResult> {
        validate_context(&request.context)?;

        let scope = request.scope();

        match self.cache.get(&scope, &request.context).await {
            Ok(Some(cached)) => return Ok(cached),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "evaluation cache read failed, evaluating live"),
        }

        let (flag, stale) = self
            .resolve_flag(request.project_id, request.environment_id, &request.flag_key)
            .await?;

        let mut result = evaluate_flag(&flag, &request.context);

        if stale {
            result.reason.push_str(" (served from last-known flag definition)");
            return Ok(result);
        }

        if let Err(e) = self.cache.save(&scope, &request.context, &result).await {
            warn!(error = %e, "failed to cache evaluation result");
        }

        Ok(result)
    }

    /// Look the flag up, falling back to its snapshot. The flag is marked stale when the
    /// snapshot was used.
    async fn resolve_flag(
        &self,
        project_id: Uuid,
        environment_id: Uuid,
        key: &str,
    ) -> Result<(Arc<Flag>, bool)> {
        let started = Utc::now();
        let lookup = tokio::time::timeout(
            self.lookup_timeout,
            self.lookup.find_by_key(project_id, environment_id, key),
        )
        .await;

        let failure = match lookup {
            Ok(Ok(Some(flag))) => {
                let flag = Arc::new(flag);
                self.remember(flag.clone()).await;
                return Ok((flag, false));
            }
            Ok(Ok(None)) => {
                self.forget((project_id, environment_id, key.to_string()), started)
                    .await;
                return Err(EvaluationError::FlagNotFound {
                    key: key.to_string(),
                });
            }
            Ok(Err(e)) => EvaluationError::LookupUnavailable(e.to_string()),
            Err(_) => EvaluationError::LookupTimeout(self.lookup_timeout),
        };

        let snapshot = match self
            .snapshots
            .read()
            .await
            .get(&(project_id, environment_id, key.to_string()))
        {
            Some(Snapshot::Live(flag)) => Some(flag.clone()),
            Some(Snapshot::Deleted(_)) | None => None,
        };

        match snapshot {
            Some(flag) => {
                warn!(error = %failure, "flag lookup failed, using last-known definition");
                Ok((flag, true))
            }
            None => Err(failure),
        }
    }

    /// Keep `flag` as the last-known definition unless a newer one, or a later
    /// deletion, is already recorded
    pub(crate) async fn remember(&self, flag: Arc<Flag>) {
        let flag_ref = (flag.project_id, flag.environment_id, flag.key.clone());
        self.record(flag_ref, Snapshot::Live(flag)).await;
    }

    /// Record that the flag no longer exists as of `as_of`
    pub(crate) async fn forget(&self, flag_ref: FlagRef, as_of: DateTime<Utc>) {
        self.record(flag_ref, Snapshot::Deleted(as_of)).await;
    }

    async fn record(&self, flag_ref: FlagRef, snapshot: Snapshot) {
        let mut snapshots = self.snapshots.write().await;
        if let Some(existing) = snapshots.get(&flag_ref) {
            if !snapshot.is_newer_than(existing) {
                debug!(flag_key = %flag_ref.2, "ignoring outdated flag definition");
                return;
            }
        }
        snapshots.insert(flag_ref, snapshot);
    }

    #[cfg(test)]
    pub(crate) async fn last_known(&self, flag_ref: &FlagRef) -> Option<Arc<Flag>> {
        match self.snapshots.read().await.get(flag_ref) {
            Some(Snapshot::Live(flag)) => Some(flag.clone()),
            _ => None,
        }
    }

    pub(crate) async fn lookup_by_id(&self, flag_id: Uuid) -> Result<Option<Flag>> {
        tokio::time::timeout(self.lookup_timeout, self.lookup.find_by_id(flag_id))
            .await
            .map_err(|_| EvaluationError::LookupTimeout(self.lookup_timeout))?
            .map_err(|e| EvaluationError::LookupUnavailable(e.to_string()))
    }
}

/// Evaluate a flag definition for a context without touching the cache
///
/// Rule sets are tried in ascending priority. The first whose conditions match decides
/// the outcome: its on value inside the rollout percentage, its off value outside it.
/// When no rule set matches, the flag-level default for the current enabled state is
/// served. Values that cannot be decoded degrade to the flag default, then to the
/// return type's zero value, with the reason saying so.
pub fn evaluate_flag(flag: &Flag, context: &EvaluationContext) -> EvaluationResult {
    let mut rule_sets: Vec<&RuleSet> = flag.rule_sets.iter().collect();
    rule_sets.sort_by_key(|r| r.priority);

    let mut priorities = HashSet::new();

    for rule_set in rule_sets {
        if !priorities.insert(rule_set.priority) {
            warn!(
                flag_key = %flag.key,
                rule_set_id = %rule_set.id,
                priority = rule_set.priority,
                "duplicate rule set priority, skipping rule set"
            );
            continue;
        }

        if let Err(e) = validate_rule_set(rule_set) {
            warn!(
                flag_key = %flag.key,
                rule_set_id = %rule_set.id,
                error = %e,
                "malformed rule set, skipping"
            );
            continue;
        }

        if !conditions::matches(rule_set, context) {
            continue;
        }

        let in_rollout = match passes_percentage(
            rule_set.percentage,
            rule_set.bucketing_seed,
            &flag.key,
            context.sticky_key(),
        ) {
            Ok(in_rollout) => in_rollout,
            Err(e) => {
                warn!(flag_key = %flag.key, rule_set_id = %rule_set.id, error = %e, "bad percentage, skipping");
                continue;
            }
        };

        let (raw, branch) = if in_rollout {
            (rule_set.return_value_raw.as_deref(), "inside")
        } else {
            (rule_set.off_return_value_raw.as_deref(), "outside")
        };

        return rule_set_result(flag, rule_set, raw, branch);
    }

    let (value, reason) = flag_default(flag, "no rule set matched");
    EvaluationResult {
        matched: false,
        value_type: flag.return_value_type,
        value,
        matched_rule_set_id: None,
        reason,
    }
}

fn rule_set_result(
    flag: &Flag,
    rule_set: &RuleSet,
    raw: Option<&str>,
    branch: &str,
) -> EvaluationResult {
    let decoded = raw.map(|raw| coerce(raw, flag.return_value_type));

    match decoded {
        Some(Ok(value)) => {
            debug!(flag_key = %flag.key, rule_set_id = %rule_set.id, "rule set matched");
            EvaluationResult {
                matched: true,
                value_type: flag.return_value_type,
                value,
                matched_rule_set_id: Some(rule_set.id),
                reason: format!(
                    "matched rule set with priority {}, {} {}% rollout",
                    rule_set.priority, branch, rule_set.percentage
                ),
            }
        }
        Some(Err(e)) => {
            warn!(flag_key = %flag.key, rule_set_id = %rule_set.id, error = %e, "rule set value is not decodable");
            let (value, reason) = flag_default(
                flag,
                &format!("rule set with priority {} has an invalid value", rule_set.priority),
            );
            EvaluationResult {
                matched: false,
                value_type: flag.return_value_type,
                value,
                matched_rule_set_id: Some(rule_set.id),
                reason,
            }
        }
        None => {
            let (value, reason) = flag_default(
                flag,
                &format!("rule set with priority {} has no value {} rollout", rule_set.priority, branch),
            );
            EvaluationResult {
                matched: false,
                value_type: flag.return_value_type,
                value,
                matched_rule_set_id: Some(rule_set.id),
                reason,
            }
        }
    }
}

// Flag-level default for the enabled state, or the zero value when that is unusable
fn flag_default(flag: &Flag, why: &str) -> (FlagValue, String) {
    let (raw, branch) = if flag.enabled {
        (flag.default_value_on_raw.as_deref(), "on")
    } else {
        (flag.default_value_off_raw.as_deref(), "off")
    };

    let Some(raw) = raw else {
        warn!(flag_key = %flag.key, branch, "flag has no default value configured");
        return (
            FlagValue::zero(flag.return_value_type),
            format!("{}; no {} default configured, serving zero value", why, branch),
        );
    };

    match coerce(raw, flag.return_value_type) {
        Ok(value) => (value, format!("{}; serving {} default", why, branch)),
        Err(e) => {
            warn!(flag_key = %flag.key, branch, error = %e, "flag default is not decodable");
            (
                FlagValue::zero(flag.return_value_type),
                format!("{}; {} default is invalid, serving zero value", why, branch),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheError, CacheResult, FlagEvaluationCache, MemoryStore};
    use crate::evaluation::bucketing::bucket;
    use crate::evaluation::model::{FieldType, Operator, ReturnValueType, RuleCondition};
    use crate::store::{InMemoryFlagStore, StoreError, StoreResult};
    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    const SEED: i64 = 42;

    fn flag(key: &str, return_value_type: ReturnValueType, rule_sets: Vec<RuleSet>) -> Flag {
        Flag {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            environment_id: Uuid::new_v4(),
            key: key.to_string(),
            enabled: true,
            return_value_type,
            default_value_on_raw: Some("false".to_string()),
            default_value_off_raw: Some("false".to_string()),
            rule_sets,
            updated_at: Utc::now(),
        }
    }

    fn rule_set(priority: i32, percentage: i32, on: &str, off: &str) -> RuleSet {
        RuleSet {
            id: Uuid::new_v4(),
            priority,
            bucketing_seed: SEED,
            percentage,
            return_value_raw: Some(on.to_string()),
            off_return_value_raw: Some(off.to_string()),
            conditions: vec![],
        }
    }

    fn country_equals(country: &str) -> RuleCondition {
        RuleCondition {
            id: Uuid::new_v4(),
            field: "country".to_string(),
            field_type: FieldType::String,
            operator: Operator::Equals,
            value_string: Some(country.to_string()),
            value_number: None,
            value_boolean: None,
            items: vec![],
        }
    }

    fn new_checkout() -> Flag {
        let mut us_rollout = rule_set(1, 50, "true", "false");
        us_rollout.conditions.push(country_equals("US"));
        flag("new-checkout", ReturnValueType::Boolean, vec![us_rollout])
    }

    // Pure evaluation

    #[test]
    fn test_new_checkout_scenario() {
        let flag = new_checkout();
        let rule_set_id = flag.rule_sets[0].id;

        let us = EvaluationContext::new("user-42").with_attr("country", "US");
        let result = evaluate_flag(&flag, &us);
        let expected = bucket(SEED, "new-checkout", "user-42") < 5000;

        assert!(result.matched);
        assert_eq!(result.value, FlagValue::Boolean(expected));
        assert_eq!(result.matched_rule_set_id, Some(rule_set_id));
        assert_eq!(evaluate_flag(&flag, &us), result);

        let ca = EvaluationContext::new("user-42").with_attr("country", "CA");
        let result = evaluate_flag(&flag, &ca);
        assert!(!result.matched);
        assert_eq!(result.value, FlagValue::Boolean(false));
        assert_eq!(result.matched_rule_set_id, None);
        assert!(result.reason.contains("on default"));
    }

    #[test]
    fn test_lower_priority_value_wins() {
        // Declared out of order on purpose
        let flag = flag(
            "banner",
            ReturnValueType::String,
            vec![
                rule_set(2, 100, "second", "second-off"),
                rule_set(1, 100, "first", "first-off"),
            ],
        );

        let result = evaluate_flag(&flag, &EvaluationContext::new("user-1"));
        assert_eq!(result.value, FlagValue::String("first".to_string()));
    }

    #[test]
    fn test_percentage_miss_serves_off_value_without_falling_through() {
        let flag = flag(
            "banner",
            ReturnValueType::String,
            vec![rule_set(1, 0, "on", "held-back"), rule_set(2, 100, "next", "next-off")],
        );

        let result = evaluate_flag(&flag, &EvaluationContext::new("user-1"));
        assert!(result.matched);
        assert_eq!(result.value, FlagValue::String("held-back".to_string()));
        assert!(result.reason.contains("outside 0% rollout"));
    }

    #[test]
    fn test_fallback_follows_enabled_state() {
        let mut flag = flag("limit", ReturnValueType::Number, vec![]);
        flag.default_value_on_raw = Some("100".to_string());
        flag.default_value_off_raw = Some("10".to_string());
        let ctx = EvaluationContext::new("user-1");

        let on = evaluate_flag(&flag, &ctx);
        assert!(!on.matched);
        assert_eq!(on.value, FlagValue::Number(100.0));

        flag.enabled = false;
        assert_eq!(evaluate_flag(&flag, &ctx).value, FlagValue::Number(10.0));
    }

    #[test]
    fn test_missing_default_serves_zero_value() {
        let mut flag = flag("layout", ReturnValueType::Json, vec![]);
        flag.default_value_on_raw = None;

        let result = evaluate_flag(&flag, &EvaluationContext::new("user-1"));
        assert_eq!(result.value, FlagValue::Json(serde_json::Value::Null));
        assert!(result.reason.contains("no on default configured"));
    }

    #[test]
    fn test_undecodable_rule_value_degrades_to_flag_default() {
        let mut flag = flag("limit", ReturnValueType::Number, vec![rule_set(1, 100, "lots", "0")]);
        flag.default_value_on_raw = Some("5".to_string());

        let result = evaluate_flag(&flag, &EvaluationContext::new("user-1"));
        assert!(!result.matched);
        assert_eq!(result.value, FlagValue::Number(5.0));
        assert!(result.reason.contains("invalid value"));

        flag.default_value_on_raw = Some("five".to_string());
        let result = evaluate_flag(&flag, &EvaluationContext::new("user-1"));
        assert_eq!(result.value, FlagValue::Number(0.0));
    }

    #[test]
    fn test_malformed_rule_sets_are_skipped() {
        let mut bad_percentage = rule_set(1, 150, "bad", "bad");
        bad_percentage.conditions.clear();

        let mut bad_operator = rule_set(2, 100, "bad", "bad");
        bad_operator.conditions.push(RuleCondition {
            operator: Operator::GreaterThan,
            ..country_equals("US")
        });

        let duplicate = rule_set(3, 100, "good", "good-off");
        let shadowed = rule_set(3, 100, "shadowed", "shadowed-off");

        let flag = flag(
            "banner",
            ReturnValueType::String,
            vec![bad_percentage, bad_operator, duplicate, shadowed],
        );
        let ctx = EvaluationContext::new("user-1").with_attr("country", "US");

        assert_eq!(evaluate_flag(&flag, &ctx).value, FlagValue::String("good".to_string()));
    }

    #[test]
    fn test_json_flag() {
        let flag = flag(
            "layout",
            ReturnValueType::Json,
            vec![rule_set(1, 100, r#"{"columns":3}"#, "null")],
        );
        let result = evaluate_flag(&flag, &EvaluationContext::new("user-1"));
        assert_eq!(result.value, FlagValue::Json(json!({"columns": 3})));
        assert_eq!(result.value_type, ReturnValueType::Json);
    }

    // Service

    struct FlakyLookup {
        inner: InMemoryFlagStore,
        failing: AtomicBool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl FlagLookup for FlakyLookup {
        async fn find_by_key(
            &self,
            project_id: Uuid,
            environment_id: Uuid,
            key: &str,
        ) -> StoreResult<Option<Flag>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("connection refused".to_string()));
            }
            self.inner.find_by_key(project_id, environment_id, key).await
        }

        async fn find_by_id(&self, flag_id: Uuid) -> StoreResult<Option<Flag>> {
            self.inner.find_by_id(flag_id).await
        }
    }

    struct BrokenCache;

    #[async_trait]
    impl EvaluationCache for BrokenCache {
        async fn get(&self, _: &FlagScope, _: &EvaluationContext) -> CacheResult<Option<EvaluationResult>> {
            Err(CacheError::Connection("cache down".to_string()))
        }

        async fn save(&self, _: &FlagScope, _: &EvaluationContext, _: &EvaluationResult) -> CacheResult<()> {
            Err(CacheError::Connection("cache down".to_string()))
        }

        async fn invalidate(&self, _: &FlagScope) -> CacheResult<usize> {
            Err(CacheError::Connection("cache down".to_string()))
        }
    }

    struct Fixture {
        service: FlagEvaluationService,
        lookup: Arc<FlakyLookup>,
        flag: Flag,
    }

    async fn fixture(cache: Arc<dyn EvaluationCache>) -> Fixture {
        let store = InMemoryFlagStore::new();
        let flag = new_checkout();
        store.upsert_flag(flag.clone()).await;

        let lookup = Arc::new(FlakyLookup {
            inner: store.clone(),
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        });
        let service = FlagEvaluationService::new(
            lookup.clone(),
            Arc::new(store),
            cache,
            Duration::from_millis(200),
        );

        Fixture { service, lookup, flag }
    }

    fn memory_cache() -> Arc<dyn EvaluationCache> {
        Arc::new(FlagEvaluationCache::new(
            Arc::new(MemoryStore::new()),
            Duration::from_secs(60),
        ))
    }

    fn request(flag: &Flag, sticky_key: &str) -> EvaluateRequest {
        EvaluateRequest {
            flag_key: flag.key.clone(),
            project_id: flag.project_id,
            environment_id: flag.environment_id,
            organization_id: Uuid::nil(),
            context: EvaluationContext::new(sticky_key).with_attr("country", "US"),
        }
    }

    #[tokio::test]
    async fn test_second_evaluation_is_served_from_cache() {
        let fx = fixture(memory_cache()).await;
        let req = request(&fx.flag, "user-42");

        let first = fx.service.evaluate(&req).await.unwrap();
        let second = fx.service.evaluate(&req).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(fx.lookup.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_sticky_key_is_rejected() {
        let fx = fixture(memory_cache()).await;
        let err = fx.service.evaluate(&request(&fx.flag, "")).await.unwrap_err();
        assert!(matches!(err, EvaluationError::Validation(_)));
    }

    #[tokio::test]
    async fn test_unknown_flag_is_reported_distinctly() {
        let fx = fixture(memory_cache()).await;
        let mut req = request(&fx.flag, "user-42");
        req.flag_key = "missing".to_string();

        let err = fx.service.evaluate(&req).await.unwrap_err();
        assert!(matches!(err, EvaluationError::FlagNotFound { ref key } if key == "missing"));
    }

    #[tokio::test]
    async fn test_broken_cache_falls_through_to_live_evaluation() {
        let fx = fixture(Arc::new(BrokenCache)).await;
        let result = fx.service.evaluate(&request(&fx.flag, "user-42")).await.unwrap();
        assert_eq!(result, evaluate_flag(&fx.flag, &request(&fx.flag, "user-42").context));
    }

    #[tokio::test]
    async fn test_lookup_failure_uses_last_known_definition() {
        let fx = fixture(memory_cache()).await;
        fx.service.evaluate(&request(&fx.flag, "user-1")).await.unwrap();

        fx.lookup.failing.store(true, Ordering::SeqCst);

        // Different subject, so the cache cannot answer
        let result = fx.service.evaluate(&request(&fx.flag, "user-2")).await.unwrap();
        assert!(result.reason.contains("last-known"));

        // Stale answers are not cached
        fx.service.evaluate(&request(&fx.flag, "user-2")).await.unwrap();
        assert_eq!(fx.lookup.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_lookup_failure_without_snapshot_is_unavailable() {
        let fx = fixture(memory_cache()).await;
        fx.lookup.failing.store(true, Ordering::SeqCst);

        let err = fx.service.evaluate(&request(&fx.flag, "user-1")).await.unwrap_err();
        assert!(matches!(err, EvaluationError::LookupUnavailable(_)));
    }

    struct HangingLookup;

    #[async_trait]
    impl FlagLookup for HangingLookup {
        async fn find_by_key(&self, _: Uuid, _: Uuid, _: &str) -> StoreResult<Option<Flag>> {
            std::future::pending().await
        }

        async fn find_by_id(&self, _: Uuid) -> StoreResult<Option<Flag>> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_times_out() {
        let store = InMemoryFlagStore::new();
        let service = FlagEvaluationService::new(
            Arc::new(HangingLookup),
            Arc::new(store),
            memory_cache(),
            Duration::from_millis(50),
        );
        let flag = new_checkout();

        let err = service.evaluate(&request(&flag, "user-1")).await.unwrap_err();
        assert!(matches!(err, EvaluationError::LookupTimeout(timeout) if timeout == Duration::from_millis(50)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_lookup_uses_last_known_definition() {
        let fx = fixture(memory_cache()).await;
        let hanging = FlagEvaluationService::new(
            Arc::new(HangingLookup),
            Arc::new(InMemoryFlagStore::new()),
            memory_cache(),
            Duration::from_millis(50),
        );
        hanging.remember(Arc::new(fx.flag.clone())).await;

        let result = hanging.evaluate(&request(&fx.flag, "user-1")).await.unwrap();
        assert!(result.reason.contains("last-known"));
    }

    #[tokio::test]
    async fn test_outdated_definition_does_not_replace_newer_snapshot() {
        let fx = fixture(memory_cache()).await;
        let flag_ref = (fx.flag.project_id, fx.flag.environment_id, fx.flag.key.clone());

        let mut newer = fx.flag.clone();
        newer.updated_at = fx.flag.updated_at + chrono::Duration::minutes(5);
        newer.default_value_on_raw = Some("true".to_string());
        fx.service.remember(Arc::new(newer.clone())).await;

        // A lookup that started before the update finishes late
        fx.service.remember(Arc::new(fx.flag.clone())).await;
        assert_eq!(fx.service.last_known(&flag_ref).await.as_deref(), Some(&newer));

        // Same for a deletion: the definition it removed must not come back
        fx.service.forget(flag_ref.clone(), newer.updated_at).await;
        fx.service.remember(Arc::new(newer.clone())).await;
        assert_eq!(fx.service.last_known(&flag_ref).await, None);

        fx.lookup.failing.store(true, Ordering::SeqCst);
        let err = fx.service.evaluate(&request(&fx.flag, "user-1")).await.unwrap_err();
        assert!(matches!(err, EvaluationError::LookupUnavailable(_)));

        // A definition updated after the deletion is a re-creation
        let mut recreated = newer.clone();
        recreated.updated_at = newer.updated_at + chrono::Duration::minutes(1);
        fx.service.remember(Arc::new(recreated.clone())).await;
        assert_eq!(fx.service.last_known(&flag_ref).await.as_deref(), Some(&recreated));
    }
}
