use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub failure_log_database_path: String,
    pub dev_mode: bool,
    /// How long an admin session stays valid after login
    pub session_ttl: Duration,
    /// Days to retain failed authorization records (0 = never purge)
    pub failed_auth_retention_days: i64,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

/// First admin account, created when the users table is empty.
#[derive(Debug, Clone)]
pub struct BootstrapAdmin {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("DEVICEGATE_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let session_ttl_secs: u64 = env::var("SESSION_TTL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|&secs| secs > 0)
            .unwrap_or(86400);

        let failed_auth_retention_days: i64 = env::var("FAILED_AUTH_RETENTION_DAYS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        let bootstrap_admin = match (
            env::var("BOOTSTRAP_ADMIN_USERNAME"),
            env::var("BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            (Ok(username), Ok(password)) if !username.is_empty() && !password.is_empty() => {
                let email = env::var("BOOTSTRAP_ADMIN_EMAIL")
                    .unwrap_or_else(|_| format!("{}@localhost", username));
                Some(BootstrapAdmin {
                    username,
                    email,
                    password,
                })
            }
            _ => None,
        };

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "devicegate.db".to_string()),
            failure_log_database_path: env::var("FAILURE_LOG_DATABASE_PATH")
                .unwrap_or_else(|_| "devicegate_failures.db".to_string()),
            dev_mode,
            session_ttl: Duration::from_secs(session_ttl_secs),
            failed_auth_retention_days,
            bootstrap_admin,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
