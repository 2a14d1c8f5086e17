use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    accounts::{NewUser, PublicUser},
    auth::{
        dto::{AuthResponse, LoginRequest},
        extractors::AuthUser,
    },
    error::reject,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(register))
        .route("/users/login", post(login))
        .route("/users/logout", post(logout))
        .route("/users/logout-all", post(logout_all))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/users/me", get(get_me).delete(delete_me))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<NewUser>,
) -> Result<(StatusCode, Json<AuthResponse>), (StatusCode, String)> {
    let mut user = state.accounts.create(payload).await.map_err(reject)?;
    let token = state
        .accounts
        .generate_auth_token(&mut user)
        .await
        .map_err(reject)?;

    info!(user_id = %user.id(), "user registered");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user: user.to_safe_view(),
            token,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    let mut user = state
        .accounts
        .find_by_credentials(&payload.email, &payload.password)
        .await
        .map_err(reject)?;
    let token = state
        .accounts
        .generate_auth_token(&mut user)
        .await
        .map_err(reject)?;

    info!(user_id = %user.id(), "user logged in");
    Ok(Json(AuthResponse {
        user: user.to_safe_view(),
        token,
    }))
}

#[instrument(skip_all)]
pub async fn logout(
    State(state): State<AppState>,
    AuthUser { mut user, token }: AuthUser,
) -> Result<StatusCode, (StatusCode, String)> {
    state
        .accounts
        .revoke_token(&mut user, &token)
        .await
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip_all)]
pub async fn logout_all(
    State(state): State<AppState>,
    AuthUser { mut user, .. }: AuthUser,
) -> Result<StatusCode, (StatusCode, String)> {
    state
        .accounts
        .revoke_all_tokens(&mut user)
        .await
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip_all)]
pub async fn get_me(AuthUser { user, .. }: AuthUser) -> Json<PublicUser> {
    Json(user.to_safe_view())
}

#[instrument(skip_all)]
pub async fn delete_me(
    State(state): State<AppState>,
    AuthUser { user, .. }: AuthUser,
) -> Result<Json<PublicUser>, (StatusCode, String)> {
    let view = user.to_safe_view();
    state.accounts.delete_user(user).await.map_err(reject)?;
    Ok(Json(view))
}
