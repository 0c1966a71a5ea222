//! avt-server library - apprentice visit tracking HTTP API
//!
//! Session-cookie authentication, role guards and the REST endpoints for
//! managers, project leads and consultants.

use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use avt_common::db::init::{
    get_setting_i64, DEFAULT_PASSWORD_MIN_LENGTH, DEFAULT_SESSION_TIMEOUT_SECONDS,
};

pub mod api;
pub mod config;
pub mod error;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Lifetime of a login session in seconds
    pub session_ttl_seconds: i64,
    /// Minimum password length for new accounts
    pub password_min_length: usize,
}

impl AppState {
    /// Create state with default settings
    pub fn new(db: SqlitePool) -> Self {
        Self {
            db,
            session_ttl_seconds: DEFAULT_SESSION_TIMEOUT_SECONDS,
            password_min_length: DEFAULT_PASSWORD_MIN_LENGTH as usize,
        }
    }

    /// Create state from the `settings` table
    pub async fn from_settings(db: SqlitePool) -> avt_common::Result<Self> {
        let session_ttl_seconds =
            get_setting_i64(&db, "session_timeout_seconds", DEFAULT_SESSION_TIMEOUT_SECONDS)
                .await?
                .max(60);
        let password_min_length =
            get_setting_i64(&db, "password_min_length", DEFAULT_PASSWORD_MIN_LENGTH)
                .await?
                .max(1) as usize;

        Ok(Self {
            db,
            session_ttl_seconds,
            password_min_length,
        })
    }
}

/// Build application router
///
/// `/health`, `/api/auth/login` and `/api/auth/logout` are public; every
/// other route sits behind the session gate and a role guard.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/auth", api::auth::routes(state.clone()))
        .nest("/api/admin", api::admin::routes(state.clone()))
        .nest("/api/apprentices", api::apprentices::routes(state.clone()))
        .nest("/api/visits", api::visits::routes(state.clone()))
        .nest("/api/project-lead", api::project_lead::routes(state.clone()))
        .nest("/api/consultant", api::consultant::routes(state.clone()))
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
