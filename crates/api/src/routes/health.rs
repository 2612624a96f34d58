//! Health check endpoint

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use super::SharedContext;
use crate::context::HealthReport;

pub async fn health(State(ctx): State<SharedContext>) -> (StatusCode, Json<HealthReport>) {
    let report = ctx.health_check().await;
    let status =
        if report.is_healthy() { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, Json(report))
}
