use super::context::{parse_bool, parse_number, EvaluationContext};
use super::model::{FieldType, Operator, RuleCondition, RuleConditionItem, RuleSet};

/// A rule set matches when every one of its conditions matches
///
/// An empty condition list matches everyone, which is how "all users" and
/// pure percentage rollouts are expressed.
pub fn matches(rule_set: &RuleSet, context: &EvaluationContext) -> bool {
    rule_set
        .conditions
        .iter()
        .all(|condition| condition_matches(condition, context))
}

/// Evaluate a single condition against the context
///
/// A missing attribute, an attribute that does not coerce to the field type, or a
/// condition without the value its field type needs never matches. String
/// comparisons are ordinal and case-sensitive.
pub fn condition_matches(condition: &RuleCondition, context: &EvaluationContext) -> bool {
    let Some(actual) = context.get(&condition.field) else {
        return false;
    };

    match condition.field_type {
        FieldType::Boolean => {
            let (Some(actual), Some(expected)) = (parse_bool(actual), condition.value_boolean)
            else {
                return false;
            };
            match condition.operator {
                Operator::Equals => actual == expected,
                Operator::NotEquals => actual != expected,
                _ => false,
            }
        }
        FieldType::Number => {
            let (Some(actual), Some(expected)) = (parse_number(actual), condition.value_number)
            else {
                return false;
            };
            match condition.operator {
                Operator::Equals => actual == expected,
                Operator::NotEquals => actual != expected,
                Operator::GreaterThan => actual > expected,
                Operator::LessThan => actual < expected,
                _ => false,
            }
        }
        FieldType::String => {
            let Some(expected) = condition.value_string.as_deref() else {
                return false;
            };
            match condition.operator {
                Operator::Equals => actual == expected,
                Operator::NotEquals => actual != expected,
                Operator::Contains => actual.contains(expected),
                Operator::StartsWith => actual.starts_with(expected),
                Operator::EndsWith => actual.ends_with(expected),
                _ => false,
            }
        }
        FieldType::List => {
            if condition.items.is_empty() {
                return false;
            }
            let found = condition
                .items
                .iter()
                .any(|item| item_matches(item, actual));
            match condition.operator {
                Operator::In => found,
                Operator::NotIn => !found,
                _ => false,
            }
        }
    }
}

// Numeric items compare numerically, everything else compares as strings
fn item_matches(item: &RuleConditionItem, actual: &str) -> bool {
    if let Some(expected) = item.value_number {
        return parse_number(actual) == Some(expected);
    }

    item.value_string.as_deref() == Some(actual)
}
