use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};

use crate::{
    accounts::User,
    error::{reject, NOT_AUTHENTICATED},
    state::AppState,
};

/// Authenticated caller: the bearer token and the user it belongs to.
pub struct AuthUser {
    pub user: User,
    pub token: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = (StatusCode, String);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Read Authorization header
        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or((StatusCode::UNAUTHORIZED, NOT_AUTHENTICATED.to_string()))?;

        // Expect "Bearer <token>"
        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .ok_or((StatusCode::UNAUTHORIZED, NOT_AUTHENTICATED.to_string()))?
            .trim();

        let user = state.accounts.authenticate(token).await.map_err(reject)?;
        Ok(AuthUser {
            user,
            token: token.to_string(),
        })
    }
}
