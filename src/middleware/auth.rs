use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::error::{Error, Result};
use crate::models::user::CurrentUser;
use crate::AppState;

fn bearer_token(headers: &HeaderMap) -> Result<String> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| Error::Unauthorized("missing authorization header".to_string()))?;
    let value = header
        .to_str()
        .map_err(|_| Error::Unauthorized("malformed authorization header".to_string()))?;
    let token = value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Error::Unauthorized("unsupported authorization scheme".to_string()))?;
    Ok(token.to_string())
}

async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<CurrentUser> {
    let token = bearer_token(headers)?;
    state.identity.get_current_user(&token).await
}

/// Resolves the caller through the auth server and stores it as a
/// [`CurrentUser`] request extension.
pub async fn require_user(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response> {
    let headers = req.headers().clone();
    let user = authenticate(&state, &headers).await?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

pub async fn require_staff(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response> {
    let headers = req.headers().clone();
    let user = authenticate(&state, &headers).await?;
    if !user.is_staff() {
        tracing::warn!(user_id = user.id, role = ?user.role, "staff route refused");
        return Err(Error::Forbidden("staff role required".to_string()));
    }
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}
