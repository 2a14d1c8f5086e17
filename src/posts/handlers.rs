use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;

use super::model::{CreatePostRequest, Post};
use crate::{auth::extractors::AuthUser, error::reject, state::AppState};

pub fn post_routes() -> Router<AppState> {
    Router::new().route("/posts", get(list_my_posts).post(create_post))
}

#[instrument(skip_all)]
pub async fn list_my_posts(
    State(state): State<AppState>,
    AuthUser { user, .. }: AuthUser,
) -> Result<Json<Vec<Post>>, (StatusCode, String)> {
    let posts = state.accounts.posts_of(user.id()).await.map_err(reject)?;
    Ok(Json(posts))
}

#[instrument(skip_all)]
pub async fn create_post(
    State(state): State<AppState>,
    AuthUser { user, .. }: AuthUser,
    Json(body): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<Post>), (StatusCode, String)> {
    let post = state
        .accounts
        .create_post(user.id(), &body.title, &body.body)
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(post)))
}
