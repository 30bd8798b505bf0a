mod failed_auths;
mod licenses;
mod users;

pub use failed_auths::*;
pub use licenses::*;
pub use users::*;

use axum::{
    Router, middleware,
    routing::{delete, get, post, put},
};

use crate::db::AppState;
use crate::middleware::require_admin;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        // License management
        .route("/admin/licenses", get(list_licenses))
        .route("/admin/licenses", post(create_license))
        .route("/admin/licenses/{id}", get(get_license))
        .route("/admin/licenses/{id}", put(update_license))
        .route("/admin/licenses/{id}", delete(delete_license))
        .route("/admin/licenses/{id}/reset", post(reset_license))
        // Failure log
        .route("/admin/failed-auths", get(list_failed_auths))
        // User management
        .route("/admin/users", get(list_users))
        .route("/admin/users", post(create_user))
        .route("/admin/users/{id}", put(update_user))
        .route("/admin/users/{id}", delete(delete_user))
        .layer(middleware::from_fn_with_state(state, require_admin))
}
