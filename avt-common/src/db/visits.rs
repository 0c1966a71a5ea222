//! Visit queries

use chrono::Datelike;
use sqlx::SqlitePool;
use tracing::info;

use crate::db::models::{NewVisit, Role, Visit, VisitDetail, VisitStatus, VisitUpdate};
use crate::db::users::user_has_role;
use crate::{Error, Result};

/// Visit columns joined with apprentice, placement and project lead names
pub(crate) const DETAIL_SELECT: &str = r#"
    SELECT
        v.id, v.apprentice_id, v.project_lead_id, v.visit_date, v.modality, v.status,
        v.comment, v.assessment, v.apprentice_feedback_date, v.created_at, v.updated_at,
        a.last_name AS apprentice_last_name,
        a.first_name AS apprentice_first_name,
        a.email AS apprentice_email,
        a.phone AS apprentice_phone,
        g.name AS group_name,
        c.name AS company_name,
        c.trade_name AS company_trade_name,
        m.last_name AS mentor_last_name,
        m.first_name AS mentor_first_name,
        m.mobile_phone AS mentor_phone,
        m.email AS mentor_email,
        u.first_name AS project_lead_first_name,
        u.last_name AS project_lead_last_name
    FROM visits v
    JOIN apprentices a ON a.id = v.apprentice_id
    JOIN class_groups g ON g.id = a.group_id
    JOIN companies c ON c.id = a.company_id
    JOIN mentors m ON m.id = a.mentor_id
    JOIN users u ON u.id = v.project_lead_id
"#;

const VISIT_COLUMNS: &str = "id, apprentice_id, project_lead_id, visit_date, modality, status, \
     comment, assessment, apprentice_feedback_date, created_at, updated_at";

pub async fn create_visit(pool: &SqlitePool, visit: &NewVisit) -> Result<i64> {
    let id = sqlx::query(
        r#"
        INSERT INTO visits (
            apprentice_id, project_lead_id, visit_date, modality, status,
            comment, assessment, apprentice_feedback_date
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(visit.apprentice_id)
    .bind(visit.project_lead_id)
    .bind(visit.visit_date)
    .bind(visit.modality)
    .bind(visit.status)
    .bind(&visit.comment)
    .bind(&visit.assessment)
    .bind(visit.apprentice_feedback_date)
    .execute(pool)
    .await?
    .last_insert_rowid();

    info!(
        visit_id = id,
        apprentice_id = visit.apprentice_id,
        project_lead_id = visit.project_lead_id,
        "Recorded visit"
    );
    Ok(id)
}

pub async fn get_visit(pool: &SqlitePool, id: i64) -> Result<Option<Visit>> {
    let visit = sqlx::query_as::<_, Visit>(&format!(
        "SELECT {} FROM visits WHERE id = ?",
        VISIT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(visit)
}

pub async fn get_visit_detail(pool: &SqlitePool, id: i64) -> Result<Option<VisitDetail>> {
    let sql = format!("{} WHERE v.id = ?", DETAIL_SELECT);
    let visit = sqlx::query_as::<_, VisitDetail>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(visit)
}

/// Every visit, most recent first
pub async fn list_visits(pool: &SqlitePool) -> Result<Vec<VisitDetail>> {
    let sql = format!("{} ORDER BY v.visit_date DESC, v.id DESC", DETAIL_SELECT);
    let visits = sqlx::query_as::<_, VisitDetail>(&sql)
        .fetch_all(pool)
        .await?;
    Ok(visits)
}

/// Visits logged by one project lead, optionally filtered by status
///
/// Planned visits come soonest first; other listings are most recent first.
pub async fn list_visits_for_project_lead(
    pool: &SqlitePool,
    project_lead_id: i64,
    status: Option<VisitStatus>,
) -> Result<Vec<VisitDetail>> {
    let order = if status == Some(VisitStatus::Planned) {
        "ORDER BY v.visit_date ASC, v.id ASC"
    } else {
        "ORDER BY v.visit_date DESC, v.id DESC"
    };

    let visits = match status {
        Some(status) => {
            let sql = format!(
                "{} WHERE v.project_lead_id = ? AND v.status = ? {}",
                DETAIL_SELECT, order
            );
            sqlx::query_as::<_, VisitDetail>(&sql)
                .bind(project_lead_id)
                .bind(status)
                .fetch_all(pool)
                .await?
        }
        None => {
            let sql = format!("{} WHERE v.project_lead_id = ? {}", DETAIL_SELECT, order);
            sqlx::query_as::<_, VisitDetail>(&sql)
                .bind(project_lead_id)
                .fetch_all(pool)
                .await?
        }
    };
    Ok(visits)
}

/// True when the visit occupies a slot of some annual tracking record
pub async fn is_tracked(pool: &SqlitePool, visit_id: i64) -> Result<bool> {
    let found: Option<i64> = sqlx::query_scalar(
        r#"
        SELECT 1 FROM annual_tracking
        WHERE ? IN (visit_1_id, visit_2_id, visit_3_id, visit_4_id)
        LIMIT 1
        "#,
    )
    .bind(visit_id)
    .fetch_optional(pool)
    .await?;
    Ok(found.is_some())
}

/// Apply a partial update to a visit
///
/// A tracked visit keeps its calendar year: moving it to another year would
/// leave it in the wrong annual record. Returns `false` when the visit does
/// not exist.
pub async fn update_visit(pool: &SqlitePool, id: i64, update: &VisitUpdate) -> Result<bool> {
    let Some(current) = get_visit(pool, id).await? else {
        return Ok(false);
    };

    if let Some(new_date) = update.visit_date {
        if new_date.year() != current.visit_date.year() && is_tracked(pool, id).await? {
            return Err(Error::Conflict(format!(
                "Visit {} is tracked for {} and cannot move to another year",
                id,
                current.visit_date.year()
            )));
        }
    }

    let affected = sqlx::query(
        r#"
        UPDATE visits SET
            visit_date = COALESCE(?, visit_date),
            modality = COALESCE(?, modality),
            status = COALESCE(?, status),
            comment = COALESCE(?, comment),
            assessment = COALESCE(?, assessment),
            apprentice_feedback_date = COALESCE(?, apprentice_feedback_date),
            updated_at = CURRENT_TIMESTAMP
        WHERE id = ?
        "#,
    )
    .bind(update.visit_date)
    .bind(update.modality)
    .bind(update.status)
    .bind(&update.comment)
    .bind(&update.assessment)
    .bind(update.apprentice_feedback_date)
    .bind(id)
    .execute(pool)
    .await?
    .rows_affected();

    Ok(affected > 0)
}

/// Delete an untracked visit
///
/// Fails with [`Error::NotFound`] when absent and [`Error::Conflict`] when
/// the visit occupies a tracking slot.
pub async fn delete_visit(pool: &SqlitePool, id: i64) -> Result<()> {
    if get_visit(pool, id).await?.is_none() {
        return Err(Error::NotFound(format!("Visit {}", id)));
    }
    if is_tracked(pool, id).await? {
        return Err(Error::Conflict(format!("Visit {} is part of annual tracking", id)));
    }

    // The slot foreign keys still reject the delete if a reconcile won the race
    match sqlx::query("DELETE FROM visits WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .map_err(Error::from)
    {
        Ok(_) => {
            info!(visit_id = id, "Deleted visit");
            Ok(())
        }
        Err(e) if e.is_foreign_key_violation() => Err(Error::Conflict(format!(
            "Visit {} is part of annual tracking",
            id
        ))),
        Err(e) => Err(e),
    }
}

/// Record that a manager handed a visit to a project lead
pub async fn create_assignment(
    pool: &SqlitePool,
    visit_id: i64,
    manager_id: i64,
    project_lead_id: i64,
) -> Result<i64> {
    if get_visit(pool, visit_id).await?.is_none() {
        return Err(Error::NotFound(format!("Visit {}", visit_id)));
    }
    if !user_has_role(pool, project_lead_id, Role::ProjectLead).await? {
        return Err(Error::NotFound(format!("Project lead {}", project_lead_id)));
    }

    let id = sqlx::query(
        "INSERT INTO visit_assignments (visit_id, manager_id, project_lead_id) VALUES (?, ?, ?)",
    )
    .bind(visit_id)
    .bind(manager_id)
    .bind(project_lead_id)
    .execute(pool)
    .await?
    .last_insert_rowid();

    info!(visit_id, project_lead_id, "Assigned visit");
    Ok(id)
}
