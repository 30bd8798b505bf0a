use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::db::AppState;
use crate::models::{SessionUser, UserRole};
use crate::util::extract_session_token;

#[derive(Clone)]
pub struct AdminContext {
    pub user: SessionUser,
}

/// Resolve the session token on the request to a user.
fn authenticate_session(state: &AppState, headers: &HeaderMap) -> Result<SessionUser, StatusCode> {
    let token = extract_session_token(headers).ok_or(StatusCode::UNAUTHORIZED)?;
    state.sessions.get(&token).ok_or(StatusCode::UNAUTHORIZED)
}

pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let user = authenticate_session(&state, request.headers())?;
    if !matches!(user.role, UserRole::Admin) {
        return Err(StatusCode::FORBIDDEN);
    }
    request
        .extensions_mut()
        .insert(AdminContext { user });
    Ok(next.run(request).await)
}
