use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// MODELS

/// A feature flag together with its ordered rule sets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flag {
    pub id: Uuid,
    pub project_id: Uuid,
    pub environment_id: Uuid,
    pub key: String,
    pub enabled: bool,
    pub return_value_type: ReturnValueType,
    pub default_value_on_raw: Option<String>,
    pub default_value_off_raw: Option<String>,
    #[serde(default)]
    pub rule_sets: Vec<RuleSet>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    pub id: Uuid,
    /// Lower values are evaluated first
    pub priority: i32,
    pub bucketing_seed: i64,
    pub percentage: i32,
    pub return_value_raw: Option<String>,
    pub off_return_value_raw: Option<String>,
    #[serde(default)]
    pub conditions: Vec<RuleCondition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleCondition {
    pub id: Uuid,
    pub field: String,
    pub field_type: FieldType,
    pub operator: Operator,
    pub value_string: Option<String>,
    pub value_number: Option<f64>,
    pub value_boolean: Option<bool>,
    #[serde(default)]
    pub items: Vec<RuleConditionItem>,
}

/// One literal of a List condition's membership set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleConditionItem {
    pub value_string: Option<String>,
    pub value_number: Option<f64>,
}

/// Identifies a flag the way the cache and its invalidation index see it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlagScope {
    pub organization_id: Uuid,
    pub project_id: Uuid,
    pub environment_id: Uuid,
    pub flag_key: String,
}

impl FlagScope {
    pub fn new(
        organization_id: Uuid,
        project_id: Uuid,
        environment_id: Uuid,
        flag_key: impl Into<String>,
    ) -> Self {
        Self {
            organization_id,
            project_id,
            environment_id,
            flag_key: flag_key.into(),
        }
    }
}

// ENUMS

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReturnValueType {
    Boolean,
    Number,
    String,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    Boolean,
    String,
    Number,
    List,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    Contains,
    StartsWith,
    EndsWith,
    In,
    NotIn,
}

impl Operator {
    /// Field types this operator may be applied to
    pub fn valid_field_types(self) -> &'static [FieldType] {
        match self {
            Operator::Equals | Operator::NotEquals => {
                &[FieldType::Boolean, FieldType::String, FieldType::Number]
            }
            Operator::GreaterThan | Operator::LessThan => &[FieldType::Number],
            Operator::Contains | Operator::StartsWith | Operator::EndsWith => &[FieldType::String],
            Operator::In | Operator::NotIn => &[FieldType::List],
        }
    }

    pub fn supports(self, field_type: FieldType) -> bool {
        self.valid_field_types().contains(&field_type)
    }
}

/// Error returned when a stored enum name is not recognised
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! string_enum {
    ($ty:ident, $kind:literal, { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($ty::$variant => $name,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $(
                    if s.eq_ignore_ascii_case($name) {
                        return Ok($ty::$variant);
                    }
                )+
                Err(UnknownVariant { kind: $kind, value: s.to_string() })
            }
        }
    };
}

string_enum!(ReturnValueType, "return value type", {
    Boolean => "Boolean",
    Number => "Number",
    String => "String",
    Json => "Json",
});

string_enum!(FieldType, "field type", {
    Boolean => "Boolean",
    String => "String",
    Number => "Number",
    List => "List",
});

string_enum!(Operator, "operator", {
    Equals => "Equals",
    NotEquals => "NotEquals",
    GreaterThan => "GreaterThan",
    LessThan => "LessThan",
    Contains => "Contains",
    StartsWith => "StartsWith",
    EndsWith => "EndsWith",
    In => "In",
    NotIn => "NotIn",
});
