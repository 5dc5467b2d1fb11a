/*
 * Responsibility
 * - GET /health (liveness; outside /api, so no gates)
 */
use axum::{Json, http::StatusCode, response::IntoResponse};
use serde_json::json;

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "message": "Server is running!" })))
}
