use axum::extract::{Extension, State};

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::{Json, Path};
use crate::middleware::AdminContext;
use crate::models::{CreateUser, UpdateUser, User, UserRole};

pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>> {
    let conn = state.db.get()?;
    let users = queries::list_users(&conn)?;
    Ok(Json(users))
}

pub async fn create_user(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    Json(input): Json<CreateUser>,
) -> Result<Json<User>> {
    let conn = state.db.get()?;
    let user = queries::create_user(&conn, &input)?;

    tracing::info!(
        admin = %ctx.user.username,
        username = %user.username,
        role = user.role.as_ref(),
        "created user"
    );

    Ok(Json(user))
}

pub async fn update_user(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    Path(id): Path<String>,
    Json(input): Json<UpdateUser>,
) -> Result<Json<User>> {
    let conn = state.db.get()?;

    if id == ctx.user.user_id && input.role.is_some_and(|role| role != UserRole::Admin) {
        return Err(AppError::BadRequest("Cannot remove your own admin role".into()));
    }

    let existing = queries::get_user_by_id(&conn, &id)?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    let user = queries::update_user(&conn, &id, &input)?;

    // A demoted admin loses access now, not when the session expires
    let sessions = if existing.role == UserRole::Admin && user.role != UserRole::Admin {
        state.sessions.remove_user(&id)
    } else {
        0
    };

    tracing::info!(
        admin = %ctx.user.username,
        username = %user.username,
        role = user.role.as_ref(),
        sessions,
        "updated user"
    );

    Ok(Json(user))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let conn = state.db.get()?;

    // Prevent self-deletion
    if id == ctx.user.user_id {
        return Err(AppError::BadRequest("Cannot delete yourself".into()));
    }

    let existing = queries::get_user_by_id(&conn, &id)?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    queries::delete_user(&conn, &id)?;
    let sessions = state.sessions.remove_user(&id);

    tracing::info!(
        admin = %ctx.user.username,
        username = %existing.username,
        sessions,
        "deleted user"
    );

    Ok(Json(serde_json::json!({ "deleted": true })))
}
