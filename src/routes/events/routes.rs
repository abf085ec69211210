use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::evaluation::FlagMutationEvent;
use crate::routes::error_response;
use crate::state::AppState;

/// Receive a flag updated/deleted event from the management layer
pub async fn flag_mutated(
    State(state): State<AppState>,
    Json(event): Json<FlagMutationEvent>,
) -> Result<StatusCode, (StatusCode, String)> {
    state
        .evaluator
        .apply_mutation(event)
        .await
        .map_err(error_response)?;

    Ok(StatusCode::NO_CONTENT)
}

/// Re-read a flag by id and drop its cached evaluations
pub async fn refresh(
    State(state): State<AppState>,
    Path(flag_id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    state
        .evaluator
        .refresh_flag(flag_id)
        .await
        .map_err(error_response)?;

    Ok(StatusCode::NO_CONTENT)
}
