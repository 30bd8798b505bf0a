//! Admin sign-in and sign-out.

use axum::{Router, extract::State, http::HeaderMap, routing::post};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::crypto::verify_password;
use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::Json;
use crate::models::{SessionUser, UserRole};
use crate::util::{RequestInfo, extract_session_token, session_cookie, session_cookie_removal};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: i64,
    pub user: SessionUser,
}

pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(input): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>)> {
    let conn = state.db.get()?;

    // Same answer for unknown user and wrong password
    let Some(user) = queries::get_user_by_username(&conn, &input.username)?
        .filter(|user| verify_password(&input.password, &user.password_hash))
    else {
        let info = RequestInfo::from_headers(&headers);
        tracing::warn!(
            username = %input.username,
            ip = ?info.ip,
            user_agent = ?info.user_agent,
            "failed sign-in"
        );
        return Err(AppError::Unauthorized);
    };

    if user.role != UserRole::Admin {
        tracing::warn!(username = %user.username, "non-admin sign-in refused");
        return Err(AppError::Forbidden(
            "Only administrators can sign in".into(),
        ));
    }

    let session_user = SessionUser::from(&user);
    let token = state.sessions.insert(session_user.clone());
    let ttl = state.sessions.ttl().as_secs();

    tracing::info!(username = %user.username, "admin signed in");

    Ok((
        jar.add(session_cookie(token.clone(), state.secure_cookies)),
        Json(LoginResponse {
            token,
            expires_at: Utc::now().timestamp() + ttl as i64,
            user: session_user,
        }),
    ))
}

pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> (CookieJar, Json<serde_json::Value>) {
    let logged_out = extract_session_token(&headers)
        .map(|token| state.sessions.remove(&token))
        .unwrap_or(false);

    (
        jar.remove(session_cookie_removal()),
        Json(serde_json::json!({ "logged_out": logged_out })),
    )
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
}
