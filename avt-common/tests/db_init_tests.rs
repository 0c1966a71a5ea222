//! Database initialization and schema constraint tests

use avt_common::db::init::{get_setting_i64, init_database};
use tempfile::TempDir;

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("nested").join("avt.db");

    let result = init_database(&db_path).await;
    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("avt.db");

    let pool1 = init_database(&db_path).await.unwrap();
    sqlx::query("INSERT INTO class_groups (name, school_year) VALUES ('BTS 1', '2024-2025')")
        .execute(&pool1)
        .await
        .unwrap();
    pool1.close().await;

    let pool2 = init_database(&db_path).await;
    assert!(pool2.is_ok(), "Failed to open existing database: {:?}", pool2.err());
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM class_groups")
        .fetch_one(&pool2.unwrap())
        .await
        .unwrap();
    assert_eq!(count, 1, "Reopening must keep existing rows");
}

#[tokio::test]
async fn test_default_settings_initialized() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("avt.db")).await.unwrap();

    assert_eq!(
        get_setting_i64(&pool, "session_timeout_seconds", 0).await.unwrap(),
        86_400
    );
    assert_eq!(get_setting_i64(&pool, "password_min_length", 0).await.unwrap(), 6);
    assert_eq!(get_setting_i64(&pool, "missing_key", 42).await.unwrap(), 42);
}

#[tokio::test]
async fn test_null_setting_reset_on_startup() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("avt.db");
    let pool = init_database(&db_path).await.unwrap();

    sqlx::query("UPDATE settings SET value = NULL WHERE key = 'password_min_length'")
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;

    let pool = init_database(&db_path).await.unwrap();
    assert_eq!(get_setting_i64(&pool, "password_min_length", 0).await.unwrap(), 6);
}

/// Seed one apprentice and a handful of visits, returning their ids
async fn seed_visits(pool: &sqlx::SqlitePool, count: usize) -> (i64, Vec<i64>) {
    sqlx::query("INSERT INTO class_groups (id, name, school_year) VALUES (1, 'G', '2024')")
        .execute(pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO companies (id, name, postal_address) VALUES (1, 'Acme', 'Paris')")
        .execute(pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO mentors (id, company_id, last_name, first_name) VALUES (1, 1, 'M', 'M')")
        .execute(pool)
        .await
        .unwrap();
    sqlx::query(
        r#"INSERT INTO users (id, username, email, password_hash, first_name, last_name, role)
           VALUES (1, 'lead', 'lead@example.com', 'x', 'L', 'L', 'chef_projet')"#,
    )
    .execute(pool)
    .await
    .unwrap();
    sqlx::query(
        r#"INSERT INTO apprentices (id, group_id, company_id, mentor_id, last_name, first_name, contract_start, contract_end)
           VALUES (1, 1, 1, 1, 'A', 'A', '2024-01-01', '2025-12-31')"#,
    )
    .execute(pool)
    .await
    .unwrap();

    let mut visits = Vec::new();
    for day in 1..=count {
        let id = sqlx::query(
            "INSERT INTO visits (apprentice_id, project_lead_id, visit_date, modality) VALUES (1, 1, ?, 'phone')",
        )
        .bind(format!("2024-03-{:02}", day))
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid();
        visits.push(id);
    }
    (1, visits)
}

#[tokio::test]
async fn test_tracking_rejects_slot_gaps() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("avt.db")).await.unwrap();
    let (apprentice, visits) = seed_visits(&pool, 2).await;

    let result = sqlx::query(
        "INSERT INTO annual_tracking (apprentice_id, year, visit_2_id) VALUES (?, 2024, ?)",
    )
    .bind(apprentice)
    .bind(visits[0])
    .execute(&pool)
    .await;
    assert!(result.is_err(), "Slot 2 without slot 1 must be rejected");
}

#[tokio::test]
async fn test_tracking_unique_per_year() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("avt.db")).await.unwrap();
    let (apprentice, visits) = seed_visits(&pool, 2).await;

    sqlx::query("INSERT INTO annual_tracking (apprentice_id, year, visit_1_id) VALUES (?, 2024, ?)")
        .bind(apprentice)
        .bind(visits[0])
        .execute(&pool)
        .await
        .unwrap();
    let duplicate =
        sqlx::query("INSERT INTO annual_tracking (apprentice_id, year, visit_1_id) VALUES (?, 2024, ?)")
            .bind(apprentice)
            .bind(visits[1])
            .execute(&pool)
            .await;
    assert!(duplicate.is_err(), "Second record for the same year must be rejected");

    sqlx::query("INSERT INTO annual_tracking (apprentice_id, year, visit_1_id) VALUES (?, 2025, ?)")
        .bind(apprentice)
        .bind(visits[1])
        .execute(&pool)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_tracked_visit_cannot_be_deleted_directly() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("avt.db")).await.unwrap();
    let (apprentice, visits) = seed_visits(&pool, 1).await;

    sqlx::query("INSERT INTO annual_tracking (apprentice_id, year, visit_1_id) VALUES (?, 2024, ?)")
        .bind(apprentice)
        .bind(visits[0])
        .execute(&pool)
        .await
        .unwrap();

    let result = sqlx::query("DELETE FROM visits WHERE id = ?")
        .bind(visits[0])
        .execute(&pool)
        .await;
    assert!(result.is_err(), "Foreign key must protect tracked visits");
}
