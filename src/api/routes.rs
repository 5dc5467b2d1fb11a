/*
 * Responsibility
 * - the URL structure under /api
 * - which gate pipeline guards each method (see middleware::pipeline)
 */
use axum::{
    Router,
    routing::{get, post, put},
};

use crate::api::handlers::{
    auth::me,
    posts::{create_post, delete_post, get_post, list_posts, update_post},
};
use crate::middleware::{Pipeline, PipelineError};
use crate::state::AppState;

pub fn routes(state: &AppState) -> Result<Router<AppState>, PipelineError> {
    let public = Pipeline::public()?;
    let optional_auth = Pipeline::optional_auth()?;
    let authenticated = Pipeline::authenticated()?;
    let post_owner = Pipeline::post_owner()?;

    let router = Router::new()
        .route(
            "/posts",
            optional_auth
                .wrap(state, get(list_posts))
                .merge(authenticated.wrap(state, post(create_post))),
        )
        .route(
            "/posts/{id}",
            public
                .wrap(state, get(get_post))
                .merge(post_owner.wrap(state, put(update_post).delete(delete_post))),
        )
        .route("/auth/me", authenticated.wrap(state, get(me)));

    Ok(router)
}
