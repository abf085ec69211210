pub mod bucketing;
pub mod conditions;
pub mod context;
pub mod events;
pub mod model;
pub mod service;
pub mod validation;
pub mod value;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use context::EvaluationContext;
pub use events::FlagMutationEvent;
pub use model::{
    FieldType, Flag, FlagScope, Operator, ReturnValueType, RuleCondition, RuleConditionItem,
    RuleSet,
};
pub use service::{evaluate_flag, EvaluateRequest, FlagEvaluationService};
pub use value::FlagValue;

// Flag evaluation result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// True when a rule set, rather than the flag-level default, produced the value
    pub matched: bool,
    pub value_type: ReturnValueType,
    pub value: FlagValue,
    pub matched_rule_set_id: Option<Uuid>,
    pub reason: String,
}
