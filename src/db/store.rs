//! SQLite implementations of the authorizer's collaborators.

use chrono::Utc;
use rusqlite::{Connection, params};
use uuid::Uuid;

use super::DbPool;
use super::from_row::{FAILED_AUTH_COLS, LICENSE_COLS, query_one};
use crate::authorizer::{FailureSink, LicenseStore};
use crate::error::StorageError;
use crate::models::{BindingPatch, FailedAuth, FailureRecord, LicenseRecord};

pub fn get_license_by_code(conn: &Connection, code: &str) -> rusqlite::Result<Option<LicenseRecord>> {
    query_one(
        conn,
        &format!("SELECT {} FROM licenses WHERE code = ?1", LICENSE_COLS),
        params![code],
    )
}

/// Replace the binding state of a license, but only if nobody else wrote it
/// since `expected_version` was read. Returns the updated record, or `None`
/// on a version mismatch or missing code.
pub fn compare_and_swap_binding(
    conn: &Connection,
    code: &str,
    expected_version: i64,
    patch: &BindingPatch,
) -> rusqlite::Result<Option<LicenseRecord>> {
    let devices = serde_json::to_string(&patch.devices)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;

    query_one(
        conn,
        &format!(
            "UPDATE licenses
             SET devices = ?1, device_name = ?2, os_version = ?3, fingerprint = ?4,
                 version = version + 1, updated_at = ?5
             WHERE code = ?6 AND version = ?7
             RETURNING {}",
            LICENSE_COLS
        ),
        params![
            devices,
            patch.device_name,
            patch.os_version,
            patch.fingerprint,
            Utc::now().timestamp(),
            code,
            expected_version
        ],
    )
}

pub fn insert_failed_auth(conn: &Connection, record: &FailureRecord) -> rusqlite::Result<FailedAuth> {
    let id = Uuid::new_v4().to_string();
    let created_at = record.created_at.timestamp();

    conn.execute(
        &format!(
            "INSERT INTO failed_auths ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            FAILED_AUTH_COLS
        ),
        params![
            &id,
            &record.code,
            &record.device_id,
            &record.device_name,
            &record.os_version,
            &record.fingerprint,
            &record.message,
            created_at
        ],
    )?;

    Ok(FailedAuth {
        id,
        code: record.code.clone(),
        device_id: record.device_id.clone(),
        device_name: record.device_name.clone(),
        os_version: record.os_version.clone(),
        fingerprint: record.fingerprint.clone(),
        message: record.message.clone(),
        created_at,
    })
}

/// License store over one pooled connection, held for the duration of a request.
pub struct SqliteLicenseStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteLicenseStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl LicenseStore for SqliteLicenseStore<'_> {
    fn find(&self, code: &str) -> Result<Option<LicenseRecord>, StorageError> {
        Ok(get_license_by_code(self.conn, code)?)
    }

    fn update(
        &self,
        code: &str,
        expected_version: i64,
        patch: &BindingPatch,
    ) -> Result<Option<LicenseRecord>, StorageError> {
        Ok(compare_and_swap_binding(self.conn, code, expected_version, patch)?)
    }
}

/// Failure log backed by its own database pool. A connection is only checked
/// out when there is something to write.
#[derive(Clone)]
pub struct SqliteFailureLog {
    pool: DbPool,
}

impl SqliteFailureLog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl FailureSink for SqliteFailureLog {
    fn append(&self, record: &FailureRecord) -> Result<(), StorageError> {
        let conn = self.pool.get()?;
        insert_failed_auth(&conn, record)?;
        Ok(())
    }
}
