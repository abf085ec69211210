use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::context::{parse_bool, parse_number};
use super::model::ReturnValueType;

/// A flag value decoded according to the flag's return type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum FlagValue {
    Boolean(bool),
    Number(f64),
    String(String),
    Json(serde_json::Value),
}

impl FlagValue {
    /// The typed zero value served when nothing usable is configured
    pub fn zero(value_type: ReturnValueType) -> Self {
        match value_type {
            ReturnValueType::Boolean => FlagValue::Boolean(false),
            ReturnValueType::Number => FlagValue::Number(0.0),
            ReturnValueType::String => FlagValue::String(String::new()),
            ReturnValueType::Json => FlagValue::Json(serde_json::Value::Null),
        }
    }

    pub fn value_type(&self) -> ReturnValueType {
        match self {
            FlagValue::Boolean(_) => ReturnValueType::Boolean,
            FlagValue::Number(_) => ReturnValueType::Number,
            FlagValue::String(_) => ReturnValueType::String,
            FlagValue::Json(_) => ReturnValueType::Json,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FlagValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FlagValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FlagValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Plain JSON rendering used on the wire
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FlagValue::Boolean(b) => serde_json::Value::Bool(*b),
            FlagValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            FlagValue::String(s) => serde_json::Value::String(s.clone()),
            FlagValue::Json(v) => v.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CoercionError {
    #[error("'{0}' is not a boolean")]
    Boolean(String),

    #[error("'{0}' is not a finite number")]
    Number(String),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decode a raw stored value into the flag's declared type
pub fn coerce(raw: &str, value_type: ReturnValueType) -> Result<FlagValue, CoercionError> {
    match value_type {
        ReturnValueType::Boolean => parse_bool(raw)
            .map(FlagValue::Boolean)
            .ok_or_else(|| CoercionError::Boolean(raw.to_string())),
        ReturnValueType::Number => parse_number(raw)
            .map(FlagValue::Number)
            .ok_or_else(|| CoercionError::Number(raw.to_string())),
        ReturnValueType::String => Ok(FlagValue::String(raw.to_string())),
        ReturnValueType::Json => Ok(FlagValue::Json(serde_json::from_str(raw)?)),
    }
}
