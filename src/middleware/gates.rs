//! The gate middleware functions wrapped around routes by [`Pipeline`].
//!
//! - `rate_limit`: admission per client address
//! - `require_identity` / `optional_identity`: bearer token → `Identity` in extensions
//! - `post_owner`: the identity must own the post named by the `{id}` path segment
//!
//! [`Pipeline`]: crate::middleware::pipeline::Pipeline

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use crate::api::extractors::PostId;
use crate::error::AppError;
use crate::services::auth::{AuthMode, Identity, Verification};
use crate::services::ownership::Ownership;
use crate::services::rate_limit::Admission;
use crate::state::AppState;

const AUTHORIZATION_CHECK_FAILED: &str = "Authorization check failed";

pub async fn rate_limit(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = state.client_ip.client_key(req.headers(), peer);

    match state.rate_limiter.admit(&client) {
        Admission::Allowed => Ok(next.run(req).await),
        Admission::Denied { retry_after } => {
            tracing::warn!(
                client = %client,
                retry_after_secs = retry_after.as_secs(),
                "rate limit exceeded"
            );
            Err(AppError::RateLimited { retry_after })
        }
    }
}

pub async fn require_identity(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    authenticate(&state, AuthMode::Required, req, next).await
}

pub async fn optional_identity(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    authenticate(&state, AuthMode::Optional, req, next).await
}

async fn authenticate(
    state: &AppState,
    mode: AuthMode,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let authorization = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match state.tokens.verify(authorization, mode) {
        Verification::Authenticated(identity) => {
            // middleware → extractor hand-off
            req.extensions_mut().insert(identity);
        }
        Verification::Anonymous => {}
        Verification::Rejected(reason) => {
            tracing::warn!(reason = %reason, "access token rejected");
            return Err(reason.into());
        }
    }

    Ok(next.run(req).await)
}

pub async fn post_owner(
    State(state): State<AppState>,
    PostId(post_id): PostId,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(identity) = req.extensions().get::<Identity>().cloned() else {
        // Pipeline::new refuses this ordering; reaching here means a hand-built layer stack.
        tracing::error!(post_id, "ownership gate ran without an authenticated identity");
        return Err(AppError::Internal(AUTHORIZATION_CHECK_FAILED));
    };

    match state.ownership.authorize(&identity, post_id).await {
        Ok(Ownership::Allowed) => Ok(next.run(req).await),
        Ok(Ownership::NotFound) => Err(AppError::PostNotFound),
        Ok(Ownership::Forbidden) => {
            tracing::info!(post_id, user_id = %identity.id, "post ownership mismatch");
            Err(AppError::NotPostOwner)
        }
        Err(err) => {
            tracing::error!(post_id, error = ?err, "ownership lookup failed");
            Err(AppError::Internal(AUTHORIZATION_CHECK_FAILED))
        }
    }
}
