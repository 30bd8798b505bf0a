use axum::extract::{Extension, State};

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::{Json, Path};
use crate::middleware::AdminContext;
use crate::models::{CreateLicense, LicenseRecord, UpdateLicense};

pub async fn list_licenses(State(state): State<AppState>) -> Result<Json<Vec<LicenseRecord>>> {
    let conn = state.db.get()?;
    let licenses = queries::list_licenses(&conn)?;
    Ok(Json(licenses))
}

pub async fn create_license(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    Json(input): Json<CreateLicense>,
) -> Result<Json<LicenseRecord>> {
    let conn = state.db.get()?;
    let license = queries::create_license(&conn, &input)?;

    tracing::info!(
        admin = %ctx.user.username,
        code = %license.code,
        max_devices = license.max_devices,
        "created license"
    );

    Ok(Json(license))
}

pub async fn get_license(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<LicenseRecord>> {
    let conn = state.db.get()?;
    let license = queries::get_license_by_id(&conn, &id)?
        .ok_or_else(|| AppError::NotFound("License not found".into()))?;
    Ok(Json(license))
}

pub async fn update_license(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    Path(id): Path<String>,
    Json(input): Json<UpdateLicense>,
) -> Result<Json<LicenseRecord>> {
    let conn = state.db.get()?;
    let license = queries::update_license(&conn, &id, &input)?;

    tracing::info!(
        admin = %ctx.user.username,
        code = %license.code,
        max_devices = license.max_devices,
        expires_at = ?license.expires_at,
        "updated license"
    );

    Ok(Json(license))
}

/// Unbind every device and clear the pinned attributes.
pub async fn reset_license(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    Path(id): Path<String>,
) -> Result<Json<LicenseRecord>> {
    let conn = state.db.get()?;

    if !queries::reset_license_devices(&conn, &id)? {
        return Err(AppError::NotFound("License not found".into()));
    }

    let license = queries::get_license_by_id(&conn, &id)?
        .ok_or_else(|| AppError::NotFound("License not found".into()))?;

    tracing::info!(admin = %ctx.user.username, code = %license.code, "reset license devices");

    Ok(Json(license))
}

pub async fn delete_license(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let conn = state.db.get()?;

    let existing = queries::get_license_by_id(&conn, &id)?
        .ok_or_else(|| AppError::NotFound("License not found".into()))?;

    queries::delete_license(&conn, &id)?;

    tracing::info!(admin = %ctx.user.username, code = %existing.code, "deleted license");

    Ok(Json(serde_json::json!({ "deleted": true })))
}
