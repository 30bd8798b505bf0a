use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

use devicegate::config::Config;
use devicegate::db::{self, AppState, queries};
use devicegate::handlers;
use devicegate::models::{CreateUser, UserRole};
use devicegate::session::SessionCache;

#[derive(Parser, Debug)]
#[command(name = "devicegate")]
#[command(about = "Per-code device license server")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Create an admin account
    CreateAdmin {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("devicegate=info,tower_http=info")),
        )
        .init();

    let args = Args::parse();
    let config = Config::from_env();

    let db = db::create_pool(&config.database_path)
        .with_context(|| format!("opening database {}", config.database_path))?;
    db::init_db(&*db.get()?).context("initializing database schema")?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, db).await,
        Command::CreateAdmin {
            username,
            email,
            password,
        } => {
            let conn = db.get()?;
            let user = queries::create_user(
                &conn,
                &CreateUser {
                    username,
                    email,
                    password,
                    role: UserRole::Admin,
                },
            )?;
            tracing::info!(username = %user.username, "created admin account");
            Ok(())
        }
    }
}

async fn serve(config: Config, db: db::DbPool) -> anyhow::Result<()> {
    let failures = db::create_pool(&config.failure_log_database_path).with_context(|| {
        format!(
            "opening failure log database {}",
            config.failure_log_database_path
        )
    })?;
    db::init_failure_log_db(&*failures.get()?).context("initializing failure log schema")?;

    bootstrap_admin(&config, &db)?;

    if config.failed_auth_retention_days > 0 {
        let purged =
            queries::purge_old_failed_auths(&*failures.get()?, config.failed_auth_retention_days)?;
        if purged > 0 {
            tracing::info!(
                purged,
                retention_days = config.failed_auth_retention_days,
                "purged old failed authorization records"
            );
        }
    }

    let sessions = Arc::new(SessionCache::new(config.session_ttl));
    spawn_session_sweeper(Arc::clone(&sessions));

    let state = AppState {
        db,
        failures,
        sessions,
        secure_cookies: !config.dev_mode,
    };

    let mut app = handlers::router(state).layer(TraceLayer::new_for_http());
    if config.dev_mode {
        tracing::warn!("running in development mode: permissive CORS, insecure cookies");
        app = app.layer(CorsLayer::permissive());
    }

    let listener = tokio::net::TcpListener::bind(config.addr())
        .await
        .with_context(|| format!("binding {}", config.addr()))?;
    tracing::info!("devicegate listening on {}", config.addr());
    axum::serve(listener, app).await?;
    Ok(())
}

/// Create the configured first admin when nobody can sign in yet.
fn bootstrap_admin(config: &Config, db: &db::DbPool) -> anyhow::Result<()> {
    let conn = db.get()?;
    if queries::count_users(&conn)? > 0 {
        return Ok(());
    }

    let Some(admin) = &config.bootstrap_admin else {
        tracing::warn!(
            "no users exist; set BOOTSTRAP_ADMIN_USERNAME and BOOTSTRAP_ADMIN_PASSWORD or run `devicegate create-admin`"
        );
        return Ok(());
    };

    let user = queries::create_user(
        &conn,
        &CreateUser {
            username: admin.username.clone(),
            email: admin.email.clone(),
            password: admin.password.clone(),
            role: UserRole::Admin,
        },
    )?;
    tracing::info!(username = %user.username, "created bootstrap admin");
    Ok(())
}

/// Expired sessions are evicted lazily on read; this sweep only bounds memory
/// for tokens that are never presented again.
fn spawn_session_sweeper(sessions: Arc<SessionCache>) {
    let period = sessions.ttl().min(std::time::Duration::from_secs(600));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            let purged = sessions.purge_expired();
            if purged > 0 {
                tracing::debug!(purged, "swept expired sessions");
            }
        }
    });
}
