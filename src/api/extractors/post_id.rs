/*
 * Responsibility
 * - the numeric `{id}` path segment of /posts/{id}
 * - non-numeric ids become a JSON 400 before any store access
 */
use axum::{
    extract::{FromRequestParts, Path},
    http::request::Parts,
};

use crate::error::AppError;

pub const INVALID_POST_ID: &str = "Invalid post id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostId(pub i64);

impl<S> FromRequestParts<S> for PostId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<i64>::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::BadRequest(INVALID_POST_ID))?;
        Ok(PostId(id))
    }
}
