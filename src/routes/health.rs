use axum::{ Json, http::StatusCode };
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthData {
    status: u16,
    service: &'static str,
    version: &'static str,
}

pub async fn health() -> Json<HealthData> {
    let health_data = HealthData {
        status: StatusCode::OK.as_u16(),
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    };
    Json(health_data)
}
