pub mod from_row;
pub mod queries;
mod store;

pub use store::{
    SqliteFailureLog, SqliteLicenseStore, compare_and_swap_binding, get_license_by_code,
    insert_failed_auth,
};

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use crate::session::SessionCache;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    /// Users and licenses
    pub db: DbPool,
    /// Failed authorization log, kept out of the main database
    pub failures: DbPool,
    pub sessions: Arc<SessionCache>,
    /// Mark session cookies `Secure` (off in dev mode)
    pub secure_cookies: bool,
}

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub fn create_pool(path: impl AsRef<Path>) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(path).with_init(|conn| {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")
    });
    Pool::builder().build(manager)
}

pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL UNIQUE,
            role TEXT NOT NULL DEFAULT 'user',
            password_hash TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS licenses (
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL UNIQUE,
            expires_at INTEGER,
            max_devices INTEGER NOT NULL DEFAULT 1 CHECK (max_devices >= 1),
            devices TEXT NOT NULL DEFAULT '[]',
            device_name TEXT,
            os_version TEXT,
            fingerprint TEXT,
            version INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        "#,
    )
}

pub fn init_failure_log_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS failed_auths (
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL,
            device_id TEXT,
            device_name TEXT,
            os_version TEXT,
            fingerprint TEXT,
            message TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_failed_auths_created_at ON failed_auths(created_at);
        CREATE INDEX IF NOT EXISTS idx_failed_auths_code ON failed_auths(code);
        "#,
    )
}
