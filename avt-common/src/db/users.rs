//! User accounts and credential checks

use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use crate::db::models::{NewUser, Role, User};
use crate::password::{hash_password, verify_password};
use crate::{Error, Result};

const USER_COLUMNS: &str =
    "id, username, email, first_name, last_name, role, is_active, created_at";

/// Insert a new user, hashing the password
///
/// Fails with [`Error::Conflict`] when the username or email is taken.
pub async fn create_user(pool: &SqlitePool, user: &NewUser) -> Result<i64> {
    let password_hash = hash_password(&user.password)?;

    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, password_hash, first_name, last_name, role)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user.username.trim())
    .bind(user.email.trim())
    .bind(&password_hash)
    .bind(user.first_name.trim())
    .bind(user.last_name.trim())
    .bind(user.role)
    .execute(pool)
    .await
    .map_err(Error::from);

    match result {
        Ok(done) => {
            let id = done.last_insert_rowid();
            info!(user_id = id, username = %user.username, role = %user.role, "Created user");
            Ok(id)
        }
        Err(e) if e.is_unique_violation() => Err(Error::Conflict(
            "Username or email already in use".to_string(),
        )),
        Err(e) => Err(e),
    }
}

/// Check credentials; returns the user only when active and the password matches
pub async fn authenticate(
    pool: &SqlitePool,
    username: &str,
    password: &str,
) -> Result<Option<User>> {
    let row = sqlx::query(
        "SELECT id, password_hash FROM users WHERE username = ? AND is_active = 1",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        debug!(username, "Login for unknown or inactive user");
        return Ok(None);
    };

    let id: i64 = row.get("id");
    let stored_hash: String = row.get("password_hash");

    if !verify_password(password, &stored_hash) {
        debug!(username, "Password mismatch");
        return Ok(None);
    }

    get_user(pool, id).await
}

pub async fn get_user(pool: &SqlitePool, id: i64) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

/// Active users holding `role`, ordered by name
pub async fn list_users_by_role(pool: &SqlitePool, role: Role) -> Result<Vec<User>> {
    let users = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE role = ? AND is_active = 1 ORDER BY last_name, first_name",
        USER_COLUMNS
    ))
    .bind(role)
    .fetch_all(pool)
    .await?;
    Ok(users)
}

/// True when an active user with this id holds `role`
pub async fn user_has_role(pool: &SqlitePool, id: i64, role: Role) -> Result<bool> {
    let found: Option<i64> =
        sqlx::query_scalar("SELECT 1 FROM users WHERE id = ? AND role = ? AND is_active = 1")
            .bind(id)
            .bind(role)
            .fetch_optional(pool)
            .await?;
    Ok(found.is_some())
}

pub async fn count_users(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init::create_schema;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        create_schema(&pool).await.unwrap();
        pool
    }

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.into(),
            email: email.into(),
            password: "secret123".into(),
            first_name: "Jane".into(),
            last_name: "Doe".into(),
            role: Role::ProjectLead,
        }
    }

    #[tokio::test]
    async fn authenticate_roundtrip() {
        let pool = setup().await;
        let id = create_user(&pool, &new_user("jdoe", "jdoe@example.com")).await.unwrap();

        let user = authenticate(&pool, "jdoe", "secret123").await.unwrap().unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.role, Role::ProjectLead);

        assert!(authenticate(&pool, "jdoe", "wrong").await.unwrap().is_none());
        assert!(authenticate(&pool, "nobody", "secret123").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn inactive_users_cannot_log_in() {
        let pool = setup().await;
        let id = create_user(&pool, &new_user("jdoe", "jdoe@example.com")).await.unwrap();
        sqlx::query("UPDATE users SET is_active = 0 WHERE id = ?")
            .bind(id)
            .execute(&pool)
            .await
            .unwrap();

        assert!(authenticate(&pool, "jdoe", "secret123").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_username_is_conflict() {
        let pool = setup().await;
        create_user(&pool, &new_user("jdoe", "a@example.com")).await.unwrap();
        let err = create_user(&pool, &new_user("jdoe", "b@example.com")).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        let err = create_user(&pool, &new_user("other", "a@example.com")).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn role_lookup() {
        let pool = setup().await;
        let id = create_user(&pool, &new_user("jdoe", "jdoe@example.com")).await.unwrap();
        assert!(user_has_role(&pool, id, Role::ProjectLead).await.unwrap());
        assert!(!user_has_role(&pool, id, Role::Manager).await.unwrap());
        assert_eq!(list_users_by_role(&pool, Role::ProjectLead).await.unwrap().len(), 1);
        assert_eq!(count_users(&pool).await.unwrap(), 1);
    }
}
