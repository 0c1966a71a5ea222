//! Apprentice queries

use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;

use crate::db::models::{
    ApprenticeDetail, ApprenticeUpdate, ApprenticeWithVisits, NewApprentice, VisitStatus,
};
use crate::db::reference::{company_exists, get_mentor, group_exists};
use crate::{Error, Result};

/// Apprentice columns joined with group, company and mentor names
const DETAIL_SELECT: &str = r#"
    SELECT
        a.id, a.group_id, a.company_id, a.mentor_id, a.last_name, a.first_name,
        a.email, a.phone, a.address, a.contract_start, a.contract_end, a.status,
        a.notes, a.is_active, a.created_at, a.updated_at,
        g.name AS group_name,
        c.name AS company_name,
        c.trade_name AS company_trade_name,
        m.last_name AS mentor_last_name,
        m.first_name AS mentor_first_name,
        m.mobile_phone AS mentor_phone,
        m.email AS mentor_email,
        m.job_title AS mentor_job_title
    FROM apprentices a
    JOIN class_groups g ON g.id = a.group_id
    JOIN companies c ON c.id = a.company_id
    JOIN mentors m ON m.id = a.mentor_id
"#;

/// Headcount by status plus spread across groups and companies
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ApprenticeStats {
    pub total: i64,
    pub active: i64,
    pub suspended: i64,
    pub completed: i64,
    pub dropped: i64,
    pub group_count: i64,
    pub company_count: i64,
}

/// Active apprentices, ordered by name
pub async fn list_apprentices(pool: &SqlitePool) -> Result<Vec<ApprenticeDetail>> {
    let sql = format!(
        "{} WHERE a.is_active = 1 ORDER BY a.last_name, a.first_name",
        DETAIL_SELECT
    );
    let apprentices = sqlx::query_as::<_, ApprenticeDetail>(&sql)
        .fetch_all(pool)
        .await?;
    Ok(apprentices)
}

/// Active apprentice by id
pub async fn get_apprentice(pool: &SqlitePool, id: i64) -> Result<Option<ApprenticeDetail>> {
    let sql = format!("{} WHERE a.id = ? AND a.is_active = 1", DETAIL_SELECT);
    let apprentice = sqlx::query_as::<_, ApprenticeDetail>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(apprentice)
}

pub async fn apprentice_is_active(pool: &SqlitePool, id: i64) -> Result<bool> {
    let found: Option<i64> =
        sqlx::query_scalar("SELECT 1 FROM apprentices WHERE id = ? AND is_active = 1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
    Ok(found.is_some())
}

/// Check that group, company and mentor exist and the mentor works for the company
async fn check_placement(
    pool: &SqlitePool,
    group_id: i64,
    company_id: i64,
    mentor_id: i64,
) -> Result<()> {
    if !group_exists(pool, group_id).await? {
        return Err(Error::NotFound(format!("Group {}", group_id)));
    }
    if !company_exists(pool, company_id).await? {
        return Err(Error::NotFound(format!("Company {}", company_id)));
    }
    let mentor = get_mentor(pool, mentor_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Mentor {}", mentor_id)))?;
    if mentor.company_id != company_id {
        return Err(Error::InvalidInput(format!(
            "Mentor {} does not belong to company {}",
            mentor_id, company_id
        )));
    }
    Ok(())
}

pub async fn create_apprentice(pool: &SqlitePool, apprentice: &NewApprentice) -> Result<i64> {
    check_placement(
        pool,
        apprentice.group_id,
        apprentice.company_id,
        apprentice.mentor_id,
    )
    .await?;

    let id = sqlx::query(
        r#"
        INSERT INTO apprentices (
            group_id, company_id, mentor_id, last_name, first_name,
            email, phone, address, contract_start, contract_end, notes
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(apprentice.group_id)
    .bind(apprentice.company_id)
    .bind(apprentice.mentor_id)
    .bind(apprentice.last_name.trim())
    .bind(apprentice.first_name.trim())
    .bind(&apprentice.email)
    .bind(&apprentice.phone)
    .bind(&apprentice.address)
    .bind(apprentice.contract_start)
    .bind(apprentice.contract_end)
    .bind(&apprentice.notes)
    .execute(pool)
    .await?
    .last_insert_rowid();

    info!(apprentice_id = id, "Created apprentice");
    Ok(id)
}

/// Apply a partial update to an active apprentice
///
/// Returns `false` when no active apprentice has this id.
pub async fn update_apprentice(
    pool: &SqlitePool,
    id: i64,
    update: &ApprenticeUpdate,
) -> Result<bool> {
    let Some(current) = get_apprentice(pool, id).await? else {
        return Ok(false);
    };
    let current = current.apprentice;

    let group_id = update.group_id.unwrap_or(current.group_id);
    let company_id = update.company_id.unwrap_or(current.company_id);
    let mentor_id = update.mentor_id.unwrap_or(current.mentor_id);
    if update.group_id.is_some() || update.company_id.is_some() || update.mentor_id.is_some() {
        check_placement(pool, group_id, company_id, mentor_id).await?;
    }

    let start = update.contract_start.unwrap_or(current.contract_start);
    let end = update.contract_end.unwrap_or(current.contract_end);
    if end < start {
        return Err(Error::InvalidInput(
            "Contract end must not precede contract start".to_string(),
        ));
    }

    let affected = sqlx::query(
        r#"
        UPDATE apprentices SET
            group_id = COALESCE(?, group_id),
            company_id = COALESCE(?, company_id),
            mentor_id = COALESCE(?, mentor_id),
            last_name = COALESCE(?, last_name),
            first_name = COALESCE(?, first_name),
            email = COALESCE(?, email),
            phone = COALESCE(?, phone),
            address = COALESCE(?, address),
            contract_start = COALESCE(?, contract_start),
            contract_end = COALESCE(?, contract_end),
            status = COALESCE(?, status),
            notes = COALESCE(?, notes),
            updated_at = CURRENT_TIMESTAMP
        WHERE id = ? AND is_active = 1
        "#,
    )
    .bind(update.group_id)
    .bind(update.company_id)
    .bind(update.mentor_id)
    .bind(&update.last_name)
    .bind(&update.first_name)
    .bind(&update.email)
    .bind(&update.phone)
    .bind(&update.address)
    .bind(update.contract_start)
    .bind(update.contract_end)
    .bind(update.status)
    .bind(&update.notes)
    .bind(id)
    .execute(pool)
    .await?
    .rows_affected();

    Ok(affected > 0)
}

/// Soft delete: the row stays for visits and tracking history
pub async fn deactivate_apprentice(pool: &SqlitePool, id: i64) -> Result<bool> {
    let affected = sqlx::query(
        "UPDATE apprentices SET is_active = 0, updated_at = CURRENT_TIMESTAMP WHERE id = ? AND is_active = 1",
    )
    .bind(id)
    .execute(pool)
    .await?
    .rows_affected();

    if affected > 0 {
        info!(apprentice_id = id, "Deactivated apprentice");
    }
    Ok(affected > 0)
}

pub async fn apprentice_stats(pool: &SqlitePool) -> Result<ApprenticeStats> {
    let stats = sqlx::query_as::<_, ApprenticeStats>(
        r#"
        SELECT
            COUNT(*) AS total,
            COALESCE(SUM(status = 'active'), 0) AS active,
            COALESCE(SUM(status = 'suspended'), 0) AS suspended,
            COALESCE(SUM(status = 'completed'), 0) AS completed,
            COALESCE(SUM(status = 'dropped'), 0) AS dropped,
            COUNT(DISTINCT group_id) AS group_count,
            COUNT(DISTINCT company_id) AS company_count
        FROM apprentices
        WHERE is_active = 1
        "#,
    )
    .fetch_one(pool)
    .await?;
    Ok(stats)
}

/// Active apprentices with the number of done visits by one project lead
pub async fn list_apprentices_for_project_lead(
    pool: &SqlitePool,
    project_lead_id: i64,
) -> Result<Vec<ApprenticeWithVisits>> {
    let sql = format!(
        r#"
        SELECT d.*, (
            SELECT COUNT(*) FROM visits v
            WHERE v.apprentice_id = d.id AND v.project_lead_id = ? AND v.status = ?
        ) AS visit_count
        FROM ({detail} WHERE a.is_active = 1) d
        ORDER BY d.last_name, d.first_name
        "#,
        detail = DETAIL_SELECT
    );
    let apprentices = sqlx::query_as::<_, ApprenticeWithVisits>(&sql)
        .bind(project_lead_id)
        .bind(VisitStatus::Done)
        .fetch_all(pool)
        .await?;
    Ok(apprentices)
}

/// Active apprentices with their total number of visits
pub async fn list_apprentices_with_visit_totals(
    pool: &SqlitePool,
) -> Result<Vec<ApprenticeWithVisits>> {
    let sql = format!(
        r#"
        SELECT d.*, (
            SELECT COUNT(*) FROM visits v WHERE v.apprentice_id = d.id
        ) AS visit_count
        FROM ({detail} WHERE a.is_active = 1) d
        ORDER BY d.last_name, d.first_name
        "#,
        detail = DETAIL_SELECT
    );
    let apprentices = sqlx::query_as::<_, ApprenticeWithVisits>(&sql)
        .fetch_all(pool)
        .await?;
    Ok(apprentices)
}
