//! Annual tracking persistence
//!
//! [`reconcile`] is the only writer of `annual_tracking`. It runs as a
//! single conditional upsert, so concurrent calls for the same apprentice
//! and year serialize on the SQLite write lock and each one sees the slots
//! left by the previous one.

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info, warn};

use crate::db::models::{Modality, VisitStatus};
use crate::tracking::{AnnualTracking, ReconcileOutcome, TrackingSlots, SLOT_COUNT};
use crate::{Error, Result};

/// Insert the record with slot 1 set, or fill the first empty slot.
///
/// Every SET expression reads the pre-update row, and the slots are
/// gap-free, so exactly one CASE branch fires. The WHERE clause skips the
/// update when the visit is already present or every slot is taken; in
/// that case nothing is returned.
const RECONCILE_UPSERT: &str = r#"
    INSERT INTO annual_tracking (apprentice_id, year, visit_1_id)
    VALUES (?, ?, ?)
    ON CONFLICT (apprentice_id, year) DO UPDATE SET
        visit_1_id = COALESCE(visit_1_id, excluded.visit_1_id),
        visit_2_id = CASE WHEN visit_1_id IS NOT NULL AND visit_2_id IS NULL
                          THEN excluded.visit_1_id ELSE visit_2_id END,
        visit_3_id = CASE WHEN visit_2_id IS NOT NULL AND visit_3_id IS NULL
                          THEN excluded.visit_1_id ELSE visit_3_id END,
        visit_4_id = CASE WHEN visit_3_id IS NOT NULL AND visit_4_id IS NULL
                          THEN excluded.visit_1_id ELSE visit_4_id END,
        updated_at = CURRENT_TIMESTAMP
    WHERE excluded.visit_1_id NOT IN (
            COALESCE(visit_1_id, -1), COALESCE(visit_2_id, -1),
            COALESCE(visit_3_id, -1), COALESCE(visit_4_id, -1))
      AND visit_4_id IS NULL
    RETURNING id, apprentice_id, year, visit_1_id, visit_2_id, visit_3_id, visit_4_id
"#;

fn tracking_from_row(row: &SqliteRow) -> Result<AnnualTracking> {
    let mut slots = [None; SLOT_COUNT];
    for (index, slot) in slots.iter_mut().enumerate() {
        *slot = row.try_get(format!("visit_{}_id", index + 1).as_str())?;
    }
    Ok(AnnualTracking {
        id: row.try_get("id")?,
        apprentice_id: row.try_get("apprentice_id")?,
        year: row.try_get("year")?,
        slots: TrackingSlots::new(slots),
    })
}

/// Attach `visit_id` to the apprentice's tracking record for `year`
///
/// Creates the record when missing. When all slots are taken the record is
/// left unchanged and [`ReconcileOutcome::SlotsExhausted`] is returned.
/// Calling again with a visit that is already tracked changes nothing.
pub async fn reconcile(
    pool: &SqlitePool,
    apprentice_id: i64,
    year: i32,
    visit_id: i64,
) -> Result<ReconcileOutcome> {
    let returned = sqlx::query(RECONCILE_UPSERT)
        .bind(apprentice_id)
        .bind(year)
        .bind(visit_id)
        .fetch_optional(pool)
        .await?;

    if let Some(row) = returned {
        let tracking = tracking_from_row(&row)?;
        let slot = tracking.slots.slot_of(visit_id).ok_or_else(|| {
            Error::Internal(format!(
                "Visit {} missing from tracking record {} after upsert",
                visit_id, tracking.id
            ))
        })?;
        info!(
            apprentice_id,
            year,
            visit_id,
            slot,
            status = %tracking.status_label(),
            "Visit assigned to tracking slot"
        );
        return Ok(ReconcileOutcome::assigned(slot, tracking));
    }

    let tracking = get_tracking(pool, apprentice_id, year)
        .await?
        .ok_or_else(|| {
            Error::Internal(format!(
                "Tracking record for apprentice {} in {} not found after upsert",
                apprentice_id, year
            ))
        })?;

    match tracking.slots.slot_of(visit_id) {
        Some(slot) => {
            debug!(apprentice_id, year, visit_id, slot, "Visit already tracked");
            Ok(ReconcileOutcome::already_tracked(slot, tracking))
        }
        None => {
            warn!(
                apprentice_id,
                year, visit_id, "All tracking slots taken, visit left untracked"
            );
            Ok(ReconcileOutcome::exhausted(tracking))
        }
    }
}

pub async fn get_tracking(
    pool: &SqlitePool,
    apprentice_id: i64,
    year: i32,
) -> Result<Option<AnnualTracking>> {
    let row = sqlx::query(
        r#"
        SELECT id, apprentice_id, year, visit_1_id, visit_2_id, visit_3_id, visit_4_id
        FROM annual_tracking
        WHERE apprentice_id = ? AND year = ?
        "#,
    )
    .bind(apprentice_id)
    .bind(year)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(tracking_from_row).transpose()
}

/// A visit sitting in a tracking slot
#[derive(Debug, Clone, Serialize)]
pub struct SlotVisit {
    pub slot: usize,
    pub visit_id: i64,
    pub visit_date: NaiveDate,
    pub modality: Modality,
    pub status: VisitStatus,
}

/// Tracking record with apprentice names and slot visit details
#[derive(Debug, Clone, Serialize)]
pub struct TrackingReportRow {
    #[serde(flatten)]
    pub tracking: AnnualTracking,
    pub apprentice_last_name: String,
    pub apprentice_first_name: String,
    pub group_name: String,
    pub company_name: String,
    pub visits: Vec<SlotVisit>,
    pub progression: String,
}

const REPORT_SELECT: &str = r#"
    SELECT
        t.id, t.apprentice_id, t.year,
        t.visit_1_id, t.visit_2_id, t.visit_3_id, t.visit_4_id,
        a.last_name AS apprentice_last_name,
        a.first_name AS apprentice_first_name,
        g.name AS group_name,
        c.name AS company_name,
        v1.visit_date AS visit_1_date, v1.modality AS visit_1_modality, v1.status AS visit_1_status,
        v2.visit_date AS visit_2_date, v2.modality AS visit_2_modality, v2.status AS visit_2_status,
        v3.visit_date AS visit_3_date, v3.modality AS visit_3_modality, v3.status AS visit_3_status,
        v4.visit_date AS visit_4_date, v4.modality AS visit_4_modality, v4.status AS visit_4_status
    FROM annual_tracking t
    JOIN apprentices a ON a.id = t.apprentice_id
    JOIN class_groups g ON g.id = a.group_id
    JOIN companies c ON c.id = a.company_id
    LEFT JOIN visits v1 ON v1.id = t.visit_1_id
    LEFT JOIN visits v2 ON v2.id = t.visit_2_id
    LEFT JOIN visits v3 ON v3.id = t.visit_3_id
    LEFT JOIN visits v4 ON v4.id = t.visit_4_id
"#;

const REPORT_ORDER: &str = "ORDER BY a.last_name, a.first_name, t.year DESC";

fn report_row(row: &SqliteRow) -> Result<TrackingReportRow> {
    let tracking = tracking_from_row(row)?;

    let mut visits = Vec::with_capacity(tracking.slots.filled());
    for (index, visit_id) in tracking.slots.as_array().into_iter().enumerate() {
        let Some(visit_id) = visit_id else { continue };
        let slot = index + 1;
        visits.push(SlotVisit {
            slot,
            visit_id,
            visit_date: row.try_get(format!("visit_{}_date", slot).as_str())?,
            modality: row.try_get(format!("visit_{}_modality", slot).as_str())?,
            status: row.try_get(format!("visit_{}_status", slot).as_str())?,
        });
    }

    Ok(TrackingReportRow {
        progression: tracking.status_label(),
        apprentice_last_name: row.try_get("apprentice_last_name")?,
        apprentice_first_name: row.try_get("apprentice_first_name")?,
        group_name: row.try_get("group_name")?,
        company_name: row.try_get("company_name")?,
        tracking,
        visits,
    })
}

/// Every tracking record, by apprentice name then most recent year
pub async fn tracking_report(pool: &SqlitePool) -> Result<Vec<TrackingReportRow>> {
    let sql = format!("{} {}", REPORT_SELECT, REPORT_ORDER);
    let rows = sqlx::query(&sql).fetch_all(pool).await?;
    rows.iter().map(report_row).collect()
}

/// Tracking records of apprentices the project lead has visited at least once
pub async fn tracking_report_for_project_lead(
    pool: &SqlitePool,
    project_lead_id: i64,
) -> Result<Vec<TrackingReportRow>> {
    let sql = format!(
        r#"{}
        WHERE EXISTS (
            SELECT 1 FROM visits v
            WHERE v.apprentice_id = t.apprentice_id AND v.project_lead_id = ?
        )
        {}"#,
        REPORT_SELECT, REPORT_ORDER
    );
    let rows = sqlx::query(&sql)
        .bind(project_lead_id)
        .fetch_all(pool)
        .await?;
    rows.iter().map(report_row).collect()
}
