use chrono::{DateTime, Utc};
use rusqlite::{Connection, params, types::Value};
use uuid::Uuid;

use crate::crypto::hash_password;
use crate::error::{AppError, Result, map_unique_violation};
use crate::models::*;

use super::from_row::{FAILED_AUTH_COLS, LICENSE_COLS, USER_COLS, query_all, query_one};

fn now() -> i64 {
    Utc::now().timestamp()
}

fn gen_id() -> String {
    Uuid::new_v4().to_string()
}

fn to_micros(dt: Option<DateTime<Utc>>) -> Option<i64> {
    dt.map(|dt| dt.timestamp_micros())
}

/// Builder for dynamic UPDATE statements with optional fields.
/// Combines multiple field updates into a single query for efficiency.
struct UpdateBuilder {
    table: &'static str,
    id: String,
    fields: Vec<(&'static str, Value)>,
    track_updated_at: bool,
    bump_version: bool,
    expected_version: Option<i64>,
}

impl UpdateBuilder {
    fn new(table: &'static str, id: &str) -> Self {
        Self {
            table,
            id: id.to_string(),
            fields: Vec::new(),
            track_updated_at: false,
            bump_version: false,
            expected_version: None,
        }
    }

    fn with_updated_at(mut self) -> Self {
        self.track_updated_at = true;
        self
    }

    /// Increment the `version` column so in-flight binds computed on the old
    /// row lose their compare-and-swap.
    fn with_version_bump(mut self) -> Self {
        self.bump_version = true;
        self
    }

    /// Only apply the update if the row still has this version.
    fn when_version(mut self, version: i64) -> Self {
        self.expected_version = Some(version);
        self
    }

    fn set(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.fields.push((column, value.into()));
        self
    }

    fn set_opt<V: Into<Value>>(self, column: &'static str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.set(column, v),
            None => self,
        }
    }

    /// Set a column to an explicit value (including NULL).
    /// Use this for Option<T> where Some(v) = set to v, None = set to NULL.
    fn set_nullable<V: Into<Value>>(mut self, column: &'static str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.fields.push((column, v.into())),
            None => self.fields.push((column, Value::Null)),
        }
        self
    }

    fn has_changes(&self) -> bool {
        !self.fields.is_empty()
    }

    fn execute(mut self, conn: &Connection) -> rusqlite::Result<bool> {
        if self.fields.is_empty() {
            return Ok(false);
        }
        if self.track_updated_at {
            self.fields.push(("updated_at", now().into()));
        }
        let mut sets: Vec<String> = self
            .fields
            .iter()
            .map(|(col, _)| format!("{} = ?", col))
            .collect();
        if self.bump_version {
            sets.push("version = version + 1".to_string());
        }
        let mut values: Vec<Value> = self.fields.into_iter().map(|(_, v)| v).collect();
        values.push(self.id.into());
        let mut sql = format!("UPDATE {} SET {} WHERE id = ?", self.table, sets.join(", "));
        if let Some(version) = self.expected_version {
            sql.push_str(" AND version = ?");
            values.push(version.into());
        }
        let affected = conn.execute(&sql, rusqlite::params_from_iter(values))?;
        Ok(affected > 0)
    }
}

// ============ Users ============

pub fn create_user(conn: &Connection, input: &CreateUser) -> Result<User> {
    if input.username.trim().is_empty() || input.email.trim().is_empty() || input.password.is_empty() {
        return Err(AppError::BadRequest(
            "Username, email and password are required".into(),
        ));
    }

    let id = gen_id();
    let now = now();
    let password_hash = hash_password(&input.password);

    conn.execute(
        "INSERT INTO users (id, username, email, role, password_hash, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            &id,
            &input.username,
            &input.email,
            input.role.as_ref(),
            &password_hash,
            now,
            now
        ],
    )
    .map_err(|e| map_unique_violation(e, "Username or email already in use"))?;

    Ok(User {
        id,
        username: input.username.clone(),
        email: input.email.clone(),
        role: input.role,
        password_hash,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_user_by_id(conn: &Connection, id: &str) -> Result<Option<User>> {
    Ok(query_one(
        conn,
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLS),
        params![id],
    )?)
}

pub fn get_user_by_username(conn: &Connection, username: &str) -> Result<Option<User>> {
    Ok(query_one(
        conn,
        &format!("SELECT {} FROM users WHERE username = ?1", USER_COLS),
        params![username],
    )?)
}

pub fn list_users(conn: &Connection) -> Result<Vec<User>> {
    Ok(query_all(
        conn,
        &format!("SELECT {} FROM users ORDER BY created_at DESC", USER_COLS),
        [],
    )?)
}

pub fn count_users(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?)
}

pub fn update_user(conn: &Connection, id: &str, input: &UpdateUser) -> Result<User> {
    let blank = |v: &Option<String>| v.as_deref().is_some_and(|v| v.trim().is_empty());
    if blank(&input.username) || blank(&input.email) || input.password.as_deref() == Some("") {
        return Err(AppError::BadRequest(
            "Username, email and password cannot be empty".into(),
        ));
    }

    UpdateBuilder::new("users", id)
        .with_updated_at()
        .set_opt("username", input.username.clone())
        .set_opt("email", input.email.clone())
        .set_opt("role", input.role.map(|role| role.as_ref().to_string()))
        .set_opt("password_hash", input.password.as_deref().map(hash_password))
        .execute(conn)
        .map_err(|e| map_unique_violation(e, "Username or email already in use"))?;

    get_user_by_id(conn, id)?.ok_or_else(|| AppError::NotFound("User not found".into()))
}

pub fn delete_user(conn: &Connection, id: &str) -> Result<bool> {
    let deleted = conn.execute("DELETE FROM users WHERE id = ?1", params![id])?;
    Ok(deleted > 0)
}

// ============ Licenses ============

pub fn create_license(conn: &Connection, input: &CreateLicense) -> Result<LicenseRecord> {
    if input.code.trim().is_empty() {
        return Err(AppError::BadRequest("Code is required".into()));
    }
    if input.max_devices < 1 {
        return Err(AppError::BadRequest("max_devices must be at least 1".into()));
    }

    let id = gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO licenses (id, code, expires_at, max_devices, devices, version, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, '[]', 0, ?5, ?6)",
        params![
            &id,
            &input.code,
            to_micros(input.expires_at),
            input.max_devices,
            now,
            now
        ],
    )
    .map_err(|e| map_unique_violation(e, "Code already exists"))?;

    Ok(LicenseRecord {
        id,
        code: input.code.clone(),
        expires_at: input.expires_at,
        max_devices: input.max_devices,
        devices: Vec::new(),
        device_name: None,
        os_version: None,
        fingerprint: None,
        version: 0,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_license_by_id(conn: &Connection, id: &str) -> Result<Option<LicenseRecord>> {
    Ok(query_one(
        conn,
        &format!("SELECT {} FROM licenses WHERE id = ?1", LICENSE_COLS),
        params![id],
    )?)
}

pub fn get_license_by_code(conn: &Connection, code: &str) -> Result<Option<LicenseRecord>> {
    Ok(super::get_license_by_code(conn, code)?)
}

pub fn list_licenses(conn: &Connection) -> Result<Vec<LicenseRecord>> {
    Ok(query_all(
        conn,
        &format!("SELECT {} FROM licenses ORDER BY created_at DESC", LICENSE_COLS),
        [],
    )?)
}

/// Administrative update of expiry and capacity. The code itself never changes.
///
/// Capacity may not drop below the number of devices already bound.
pub fn update_license(conn: &Connection, id: &str, input: &UpdateLicense) -> Result<LicenseRecord> {
    let existing = get_license_by_id(conn, id)?
        .ok_or_else(|| AppError::NotFound("License not found".into()))?;

    if let Some(max_devices) = input.max_devices {
        if max_devices < 1 {
            return Err(AppError::BadRequest("max_devices must be at least 1".into()));
        }
        if (max_devices as usize) < existing.devices.len() {
            return Err(AppError::BadRequest(format!(
                "max_devices cannot be lower than the {} devices already bound; reset the license first",
                existing.devices.len()
            )));
        }
    }

    let mut builder = UpdateBuilder::new("licenses", id)
        .with_updated_at()
        .with_version_bump()
        .when_version(existing.version)
        .set_opt("max_devices", input.max_devices);
    if let Some(expires_at) = input.expires_at {
        builder = builder.set_nullable("expires_at", to_micros(expires_at));
    }
    let has_changes = builder.has_changes();
    let updated = builder.execute(conn)?;
    if has_changes && !updated {
        return Err(AppError::Conflict(
            "License was modified concurrently, retry the update".into(),
        ));
    }

    get_license_by_id(conn, id)?.ok_or_else(|| AppError::NotFound("License not found".into()))
}

/// Clear the bound devices and pinned attributes, keeping code, capacity and expiry.
pub fn reset_license_devices(conn: &Connection, id: &str) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE licenses
         SET devices = '[]', device_name = NULL, os_version = NULL, fingerprint = NULL,
             version = version + 1, updated_at = ?1
         WHERE id = ?2",
        params![now(), id],
    )?;
    Ok(updated > 0)
}

pub fn delete_license(conn: &Connection, id: &str) -> Result<bool> {
    let deleted = conn.execute("DELETE FROM licenses WHERE id = ?1", params![id])?;
    Ok(deleted > 0)
}

// ============ Failed Authorizations ============

/// Newest first.
pub fn list_failed_auths(conn: &Connection, limit: i64) -> Result<Vec<FailedAuth>> {
    Ok(query_all(
        conn,
        &format!(
            "SELECT {} FROM failed_auths ORDER BY created_at DESC, rowid DESC LIMIT ?1",
            FAILED_AUTH_COLS
        ),
        params![limit],
    )?)
}

pub fn count_failed_auths(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM failed_auths", [], |row| row.get(0))?)
}

/// Purge failure records older than the retention window.
/// Returns the number of deleted records.
/// Called on startup when FAILED_AUTH_RETENTION_DAYS > 0.
pub fn purge_old_failed_auths(conn: &Connection, retention_days: i64) -> Result<usize> {
    let cutoff = now() - (retention_days * 86400);
    let deleted = conn.execute(
        "DELETE FROM failed_auths WHERE created_at < ?1",
        params![cutoff],
    )?;
    Ok(deleted)
}
