pub mod routes;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::evaluation::ReturnValueType;

#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    pub flag_key: String,
    pub project_id: Uuid,
    pub environment_id: Uuid,
    pub organization_id: Uuid,
    pub sticky_key: String,
    #[serde(default)]
    pub attrs: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct EvaluateResponse {
    pub key: String,
    pub value: serde_json::Value,
    pub value_type: ReturnValueType,
}
