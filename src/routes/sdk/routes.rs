use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use super::{EvaluateRequest, EvaluateResponse};
use crate::evaluation::{service, EvaluationContext};
use crate::routes::error_response;
use crate::state::AppState;

/// Evaluate one flag for the caller's sticky key and attributes
pub async fn evaluate(
    State(state): State<AppState>,
    Json(request): Json<EvaluateRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let request = service::EvaluateRequest {
        context: EvaluationContext::from_parts(request.sticky_key, request.attrs),
        flag_key: request.flag_key,
        project_id: request.project_id,
        environment_id: request.environment_id,
        organization_id: request.organization_id,
    };

    let result = state
        .evaluator
        .evaluate(&request)
        .await
        .map_err(error_response)?;

    Ok(Json(EvaluateResponse {
        key: request.flag_key,
        value: result.value.to_json(),
        value_type: result.value_type,
    }))
}
