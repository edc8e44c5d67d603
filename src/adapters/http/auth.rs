use axum::http::{HeaderMap, header::AUTHORIZATION};

use crate::{
    adapters::http::app_state::AppState,
    app_error::{AppError, AppResult},
    application::ports::identity_provider::AuthContext,
};

/// Resolve the caller's identity, failing with 401 when absent or invalid.
pub async fn authenticate(headers: &HeaderMap, app_state: &AppState) -> AppResult<AuthContext> {
    maybe_authenticate(headers, app_state)
        .await?
        .ok_or(AppError::Unauthorized)
}

/// Resolve the caller's identity when a token is presented.
///
/// No Authorization header means an anonymous caller (`Ok(None)`). A header
/// that is present but malformed or unresolvable is an error - a caller who
/// tried to authenticate should never silently become anonymous.
pub async fn maybe_authenticate(
    headers: &HeaderMap,
    app_state: &AppState,
) -> AppResult<Option<AuthContext>> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };

    let token = value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
        .ok_or(AppError::Unauthorized)?;

    match app_state.identity.resolve_token(token).await? {
        Some(ctx) => Ok(Some(ctx)),
        None => Err(AppError::Unauthorized),
    }
}
