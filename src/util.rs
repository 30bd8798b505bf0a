//! Request helpers shared by the handlers and middleware.

use axum::http::HeaderMap;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use serde::{Deserialize, Deserializer};

pub const SESSION_COOKIE: &str = "session";

/// Where a request came from, for logging rejected attempts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestInfo {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestInfo {
    /// The client address is the first hop of `x-forwarded-for`, else `x-real-ip`.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let ip = header("x-forwarded-for")
            .and_then(|list| list.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
            .or_else(|| header("x-real-ip"))
            .map(String::from);

        Self {
            ip,
            user_agent: header("user-agent").map(String::from),
        }
    }
}

/// Session token from `Authorization: Bearer`, falling back to the session cookie.
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().trim().to_string())
        .filter(|token| !token.is_empty());
    if bearer.is_some() {
        return bearer;
    }

    CookieJar::from_headers(headers)
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
}

/// Cookie carrying a freshly issued session. It lives for the browser
/// session; the server-side TTL decides when the token stops working.
pub fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(secure)
        .build()
}

/// Pass to `CookieJar::remove` to clear the session cookie.
pub fn session_cookie_removal() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE).path("/").build()
}

/// Deserialize a present field (including `null`) as `Some`, so that
/// `Option<Option<T>>` can tell "absent" from "explicitly null".
/// Pair with `#[serde(default)]`.
pub fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}
