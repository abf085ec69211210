use std::collections::HashSet;

use rand::Rng;
use thiserror::Error;

use super::context::EvaluationContext;
use super::model::{FieldType, Flag, Operator, RuleCondition, RuleSet};
use super::value::coerce;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("sticky key cannot be empty")]
    EmptyStickyKey,

    #[error("invalid flag key '{key}': {reason}")]
    InvalidFlagKey { key: String, reason: &'static str },

    #[error("percentage must be between 0 and 100, got {0}")]
    PercentageOutOfRange(i32),

    #[error("operator {operator} cannot be used with {field_type} field '{field}'")]
    IncompatibleOperator {
        field: String,
        field_type: FieldType,
        operator: Operator,
    },

    #[error("condition on '{field}' is missing its {field_type} value")]
    MissingConditionValue { field: String, field_type: FieldType },

    #[error("condition field name cannot be empty")]
    EmptyConditionField,

    #[error("priority {0} is used by more than one rule set")]
    DuplicatePriority(i32),

    #[error("{what} '{raw}' is not a valid {expected} value")]
    InvalidReturnValue {
        what: &'static str,
        raw: String,
        expected: String,
    },
}

// HELPER FUNCTIONS

// Validating the flag key
pub fn validate_flag_key(key: &str) -> Result<(), ValidationError> {
    let invalid = |reason| ValidationError::InvalidFlagKey {
        key: key.to_string(),
        reason,
    };

    let first = key.chars().next().ok_or_else(|| invalid("flag key cannot be empty"))?;

    if key.len() > 64 {
        return Err(invalid("flag key is too long (max 64 characters)"));
    }

    if !first.is_ascii_alphabetic() {
        return Err(invalid("flag key must start with a letter"));
    }

    if !key
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
    {
        return Err(invalid(
            "flag key may only contain lowercase letters, digits, underscores and hyphens",
        ));
    }

    Ok(())
}

// Checks if percentage number is between 0 and 100 inclusive
pub fn validate_percentage(percentage: i32) -> Result<(), ValidationError> {
    if !(0..=100).contains(&percentage) {
        return Err(ValidationError::PercentageOutOfRange(percentage));
    }

    Ok(())
}

pub fn validate_context(context: &EvaluationContext) -> Result<(), ValidationError> {
    if context.sticky_key().trim().is_empty() {
        return Err(ValidationError::EmptyStickyKey);
    }

    Ok(())
}

/// Check a condition's operator against its field type and make sure the payload
/// the field type needs is present
pub fn validate_condition(condition: &RuleCondition) -> Result<(), ValidationError> {
    if condition.field.trim().is_empty() {
        return Err(ValidationError::EmptyConditionField);
    }

    if !condition.operator.supports(condition.field_type) {
        return Err(ValidationError::IncompatibleOperator {
            field: condition.field.clone(),
            field_type: condition.field_type,
            operator: condition.operator,
        });
    }

    let has_value = match condition.field_type {
        FieldType::Boolean => condition.value_boolean.is_some(),
        FieldType::String => condition.value_string.is_some(),
        FieldType::Number => condition.value_number.is_some_and(f64::is_finite),
        FieldType::List => {
            !condition.items.is_empty()
                && condition
                    .items
                    .iter()
                    .all(|item| item.value_string.is_some() || item.value_number.is_some())
        }
    };

    if !has_value {
        return Err(ValidationError::MissingConditionValue {
            field: condition.field.clone(),
            field_type: condition.field_type,
        });
    }

    Ok(())
}

/// Structural checks on a single rule set (percentage and conditions)
pub fn validate_rule_set(rule_set: &RuleSet) -> Result<(), ValidationError> {
    validate_percentage(rule_set.percentage)?;
    rule_set.conditions.iter().try_for_each(validate_condition)
}

/// Full authoring-time validation of a flag definition
pub fn validate_flag(flag: &Flag) -> Result<(), ValidationError> {
    validate_flag_key(&flag.key)?;

    let mut priorities = HashSet::new();
    for rule_set in &flag.rule_sets {
        if !priorities.insert(rule_set.priority) {
            return Err(ValidationError::DuplicatePriority(rule_set.priority));
        }

        validate_rule_set(rule_set)?;
        check_raw(flag, "return value", rule_set.return_value_raw.as_deref())?;
        check_raw(flag, "off return value", rule_set.off_return_value_raw.as_deref())?;
    }

    check_raw(flag, "default on value", flag.default_value_on_raw.as_deref())?;
    check_raw(flag, "default off value", flag.default_value_off_raw.as_deref())?;

    Ok(())
}

fn check_raw(flag: &Flag, what: &'static str, raw: Option<&str>) -> Result<(), ValidationError> {
    let Some(raw) = raw else {
        return Ok(());
    };

    coerce(raw, flag.return_value_type)
        .map(|_| ())
        .map_err(|_| ValidationError::InvalidReturnValue {
            what,
            raw: raw.to_string(),
            expected: flag.return_value_type.to_string(),
        })
}

/// New seed for a rule set; stored once and never regenerated
pub fn generate_bucketing_seed() -> i64 {
    rand::thread_rng().gen_range(0..i64::MAX)
}
