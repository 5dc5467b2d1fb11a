/*
 * Responsibility
 * - the application-wide AppError
 * - IntoResponse (HTTP status + `{ "error": ... }` body)
 * - the one place credential failures are mapped to HTTP
 */
use std::time::Duration;

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::services::auth::CredentialError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Every variant's `Display` is the message sent to the client, so internal
/// detail never belongs in it.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(&'static str),

    #[error("Access token required")]
    MissingCredential,
    #[error("Invalid or expired token")]
    InvalidCredential,
    #[error("Invalid or expired token")]
    ExpiredCredential,

    #[error("Access denied. You can only modify your own posts.")]
    NotPostOwner,

    #[error("Post not found")]
    PostNotFound,
    #[error("Route not found")]
    RouteNotFound,

    #[error("Request body too large")]
    PayloadTooLarge,

    #[error("Too many requests. Please try again later.")]
    RateLimited { retry_after: Duration },

    #[error("{0}")]
    Internal(&'static str),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::MissingCredential => StatusCode::UNAUTHORIZED,
            AppError::InvalidCredential | AppError::ExpiredCredential | AppError::NotPostOwner => {
                StatusCode::FORBIDDEN
            }
            AppError::PostNotFound | AppError::RouteNotFound => StatusCode::NOT_FOUND,
            AppError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponse {
            error: self.to_string(),
        };

        let mut response = (status, Json(body)).into_response();

        if let AppError::RateLimited { retry_after } = self {
            // Whole seconds, rounded up, never 0.
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs.max(1)));
        }

        response
    }
}

impl From<CredentialError> for AppError {
    fn from(e: CredentialError) -> Self {
        match e {
            CredentialError::Missing => AppError::MissingCredential,
            CredentialError::Invalid => AppError::InvalidCredential,
            CredentialError::Expired => AppError::ExpiredCredential,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_errors_map_to_wire_statuses() {
        assert_eq!(
            AppError::from(CredentialError::Missing).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::from(CredentialError::Invalid).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::from(CredentialError::Expired).status(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn expired_and_invalid_share_the_wire_message() {
        assert_eq!(
            AppError::ExpiredCredential.to_string(),
            AppError::InvalidCredential.to_string()
        );
        assert_ne!(
            AppError::NotPostOwner.to_string(),
            AppError::InvalidCredential.to_string()
        );
    }

    #[test]
    fn rate_limited_response_carries_retry_after() {
        let response = AppError::RateLimited {
            retry_after: Duration::from_millis(2_500),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "3");
    }
}
