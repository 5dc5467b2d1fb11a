/*
 * Responsibility
 * - /posts CRUD handlers
 * - gates (rate limit, authentication, ownership) have already run; see routes.rs
 * - store failures are logged here and answered with a fixed message
 */
use axum::{Json, extract::State, http::StatusCode};

use crate::{
    api::{
        dto::posts::{MessageResponse, PostRequest, PostResponse},
        extractors::{CurrentIdentity, JsonBody, MaybeIdentity, PostId},
    },
    error::AppError,
    repos::{NewPost, PostChanges},
    state::AppState,
};

pub async fn list_posts(
    State(state): State<AppState>,
    MaybeIdentity(viewer): MaybeIdentity,
) -> Result<Json<Vec<PostResponse>>, AppError> {
    let rows = state.posts.list().await.map_err(|e| {
        tracing::error!(error = ?e, "listing posts failed");
        AppError::Internal("Failed to fetch posts")
    })?;

    tracing::debug!(
        viewer = viewer.as_ref().map(|v| v.id.as_str()).unwrap_or("anonymous"),
        count = rows.len(),
        "listed posts"
    );

    Ok(Json(rows.into_iter().map(PostResponse::from).collect()))
}

pub async fn create_post(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    JsonBody(req): JsonBody<PostRequest>,
) -> Result<(StatusCode, Json<PostResponse>), AppError> {
    req.validate().map_err(AppError::BadRequest)?;

    let PostChanges {
        title,
        desc,
        img,
        content,
    } = req.into_changes();

    // Owner fields come from the verified token, never from the body.
    let new_post = NewPost {
        title: title.unwrap_or_default(),
        desc: desc.unwrap_or_default(),
        img,
        content: content.unwrap_or_default(),
        owner_email: identity.email,
        owner_id: identity.id,
    };

    let row = state.posts.create(new_post).await.map_err(|e| {
        tracing::error!(error = ?e, "creating post failed");
        AppError::Internal("Failed to create post")
    })?;

    Ok((StatusCode::CREATED, Json(PostResponse::from(row))))
}

pub async fn get_post(
    State(state): State<AppState>,
    PostId(post_id): PostId,
) -> Result<Json<PostResponse>, AppError> {
    let row = state
        .posts
        .get(post_id)
        .await
        .map_err(|e| {
            tracing::error!(post_id, error = ?e, "fetching post failed");
            AppError::Internal("Database Error")
        })?
        .ok_or(AppError::PostNotFound)?;

    Ok(Json(PostResponse::from(row)))
}

pub async fn update_post(
    State(state): State<AppState>,
    PostId(post_id): PostId,
    JsonBody(req): JsonBody<PostRequest>,
) -> Result<Json<PostResponse>, AppError> {
    req.validate().map_err(AppError::BadRequest)?;

    let row = state
        .posts
        .update(post_id, req.into_changes())
        .await
        .map_err(|e| {
            tracing::error!(post_id, error = ?e, "updating post failed");
            AppError::Internal("Failed to update post")
        })?
        // deleted between the ownership check and here
        .ok_or(AppError::PostNotFound)?;

    Ok(Json(PostResponse::from(row)))
}

pub async fn delete_post(
    State(state): State<AppState>,
    PostId(post_id): PostId,
) -> Result<Json<MessageResponse>, AppError> {
    let deleted = state.posts.delete(post_id).await.map_err(|e| {
        tracing::error!(post_id, error = ?e, "deleting post failed");
        AppError::Internal("Failed to delete post")
    })?;

    if deleted {
        Ok(Json(MessageResponse {
            message: "Post deleted successfully",
        }))
    } else {
        Err(AppError::PostNotFound)
    }
}
