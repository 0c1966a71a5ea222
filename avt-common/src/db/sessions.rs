//! Login sessions
//!
//! A session is an opaque random token mapped to a user id with an absolute
//! expiry (unix seconds). Resolution only succeeds for unexpired sessions of
//! active users.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::db::models::User;
use crate::Result;

/// Open a session for `user_id`, valid for `ttl_seconds`
pub async fn create_session(pool: &SqlitePool, user_id: i64, ttl_seconds: i64) -> Result<String> {
    let token = Uuid::new_v4().simple().to_string();
    let now = Utc::now().timestamp();

    sqlx::query("INSERT INTO sessions (token, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)")
        .bind(&token)
        .bind(user_id)
        .bind(now)
        .bind(now + ttl_seconds)
        .execute(pool)
        .await?;

    Ok(token)
}

/// Look up the user behind a session token
pub async fn resolve_session(pool: &SqlitePool, token: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT u.id, u.username, u.email, u.first_name, u.last_name, u.role, u.is_active, u.created_at
        FROM sessions s
        JOIN users u ON u.id = s.user_id
        WHERE s.token = ? AND s.expires_at > ? AND u.is_active = 1
        "#,
    )
    .bind(token)
    .bind(Utc::now().timestamp())
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

pub async fn delete_session(pool: &SqlitePool, token: &str) -> Result<()> {
    sqlx::query("DELETE FROM sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await?;
    Ok(())
}

/// Remove expired sessions, returning how many were dropped
pub async fn purge_expired_sessions(pool: &SqlitePool) -> Result<u64> {
    let purged = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
        .bind(Utc::now().timestamp())
        .execute(pool)
        .await?
        .rows_affected();

    if purged > 0 {
        debug!(purged, "Purged expired sessions");
    }
    Ok(purged)
}
