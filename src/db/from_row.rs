//! Row mapping for the query layer.
//!
//! Each table has a column list constant that matches the field order its
//! `FromRow` impl reads, so SELECTs and RETURNING clauses stay in sync.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Params, Row, types::Type};

use crate::models::{FailedAuth, LicenseRecord, User, UserRole};

pub const LICENSE_COLS: &str = "id, code, expires_at, max_devices, devices, device_name, os_version, fingerprint, version, created_at, updated_at";

pub const USER_COLS: &str = "id, username, email, role, password_hash, created_at, updated_at";

pub const FAILED_AUTH_COLS: &str =
    "id, code, device_id, device_name, os_version, fingerprint, message, created_at";

pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: impl Params,
) -> rusqlite::Result<Option<T>> {
    conn.query_row(sql, params, |row| T::from_row(row)).optional()
}

pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: impl Params,
) -> rusqlite::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, |row| T::from_row(row))?;
    rows.collect()
}

/// Expiry is stored as unix microseconds.
pub fn micros_to_datetime(idx: usize, micros: Option<i64>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    micros
        .map(|m| {
            DateTime::from_timestamp_micros(m).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    idx,
                    Type::Integer,
                    format!("timestamp out of range: {m}").into(),
                )
            })
        })
        .transpose()
}

impl FromRow for LicenseRecord {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let devices: Option<String> = row.get(4)?;
        let devices = match devices.as_deref() {
            None | Some("") => Vec::new(),
            Some(json) => serde_json::from_str(json).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e))
            })?,
        };

        Ok(LicenseRecord {
            id: row.get(0)?,
            code: row.get(1)?,
            expires_at: micros_to_datetime(2, row.get(2)?)?,
            max_devices: row.get(3)?,
            devices,
            device_name: row.get(5)?,
            os_version: row.get(6)?,
            fingerprint: row.get(7)?,
            version: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }
}

impl FromRow for User {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let role: String = row.get(3)?;
        let role = role.parse::<UserRole>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e))
        })?;

        Ok(User {
            id: row.get(0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            role,
            password_hash: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }
}

impl FromRow for FailedAuth {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(FailedAuth {
            id: row.get(0)?,
            code: row.get(1)?,
            device_id: row.get(2)?,
            device_name: row.get(3)?,
            os_version: row.get(4)?,
            fingerprint: row.get(5)?,
            message: row.get(6)?,
            created_at: row.get(7)?,
        })
    }
}
