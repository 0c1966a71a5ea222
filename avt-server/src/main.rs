//! avt-server - apprentice visit tracking service
//!
//! Opens (or creates) the SQLite database, optionally bootstraps the first
//! manager account and serves the REST API until Ctrl+C / SIGTERM.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use sqlx::SqlitePool;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use avt_common::db::init::init_database;
use avt_common::db::models::{NewUser, Role};
use avt_common::db::{sessions, users};
use avt_server::config::Args;
use avt_server::{build_router, AppState};

/// Interval between expired-session sweeps
const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "avt_server=info,avt_common=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting AVT server (avt-server) v{}",
        env!("CARGO_PKG_VERSION")
    );

    let args = Args::parse();

    let db_path = args.database_path();
    info!("Database path: {}", db_path.display());

    let pool = init_database(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    let state = AppState::from_settings(pool.clone())
        .await
        .context("Failed to load settings")?;

    bootstrap_manager(&args, &state).await?;

    match sessions::purge_expired_sessions(&pool).await {
        Ok(purged) => info!("Purged {} expired sessions", purged),
        Err(e) => warn!("Failed to purge expired sessions: {}", e),
    }
    tokio::spawn(purge_sessions_periodically(pool.clone()));

    let app = build_router(state);

    let addr = args.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("avt-server listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    pool.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Create the first manager when the users table is empty
async fn bootstrap_manager(args: &Args, state: &AppState) -> Result<()> {
    let existing = users::count_users(&state.db).await?;

    let Some((username, password)) = args.init_manager() else {
        if existing == 0 {
            warn!("No user accounts exist; pass --init-manager-username and --init-manager-password to create one");
        }
        return Ok(());
    };

    if existing > 0 {
        info!("User accounts already exist, skipping manager bootstrap");
        return Ok(());
    }

    let manager = NewUser {
        username: username.to_string(),
        email: args.init_manager_email.clone(),
        password: password.to_string(),
        first_name: "Manager".to_string(),
        last_name: "Account".to_string(),
        role: Role::Manager,
    };

    let problems = manager.validate(state.password_min_length);
    if !problems.is_empty() {
        let summary: Vec<String> = problems
            .iter()
            .map(|p| format!("{}: {}", p.field, p.message))
            .collect();
        bail!("Invalid bootstrap manager account: {}", summary.join(", "));
    }

    let id = users::create_user(&state.db, &manager).await?;
    info!(user_id = id, username, "Created bootstrap manager account");
    Ok(())
}

async fn purge_sessions_periodically(pool: SqlitePool) {
    let mut ticker = tokio::time::interval(SESSION_PURGE_INTERVAL);
    // First tick completes immediately; startup already purged
    ticker.tick().await;
    loop {
        ticker.tick().await;
        if let Err(e) = sessions::purge_expired_sessions(&pool).await {
            error!("Session purge failed: {}", e);
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
