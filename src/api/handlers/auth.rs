/*
 * Responsibility
 * - GET /auth/me: echo the identity resolved from the bearer token
 */
use axum::Json;

use crate::api::extractors::CurrentIdentity;
use crate::services::auth::Identity;

pub async fn me(CurrentIdentity(identity): CurrentIdentity) -> Json<Identity> {
    Json(identity)
}
