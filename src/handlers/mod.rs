pub mod admin;
pub mod auth;
pub mod public;

use axum::Router;

use crate::db::AppState;

/// All routes, without transport layers (tracing, CORS).
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(public::router())
        .merge(auth::router())
        .merge(admin::router(state.clone()))
        .with_state(state)
}
