use axum::{
    http::StatusCode,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, warn};

mod events;
mod health;
mod sdk;

pub use health::health;

use crate::error::EvaluationError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    let sdk_router = Router::new()
        .route("/evaluate", post(sdk::routes::evaluate))
        .layer(CorsLayer::permissive());

    let internal_router = Router::new()
        .route("/flag-events", post(events::routes::flag_mutated))
        .route("/flags/{flag_id}/refresh", post(events::routes::refresh));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .nest("/sdk", sdk_router)
        .nest("/internal", internal_router)
        .layer(TraceLayer::new_for_http())
}

async fn root() -> &'static str {
    "Feature flag evaluation service"
}

/// Map an engine error onto the HTTP rejection handlers return
pub(crate) fn error_response(e: EvaluationError) -> (StatusCode, String) {
    let status = match &e {
        EvaluationError::Validation(_) => StatusCode::BAD_REQUEST,
        EvaluationError::FlagNotFound { .. } | EvaluationError::ProjectNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        EvaluationError::LookupUnavailable(_)
        | EvaluationError::LookupTimeout(_)
        | EvaluationError::CacheUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    };

    if status.is_server_error() {
        error!(error = %e, "request failed");
    } else {
        warn!(error = %e, "request rejected");
    }

    (status, e.to_string())
}
