//! Reporting read models
//!
//! Aggregations behind the project lead and consultant dashboards. Years and
//! months are taken from the stored `visit_date` text (`YYYY-MM-DD`).

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use sqlx::SqlitePool;
use std::str::FromStr;

use crate::db::models::{Modality, Role, VisitDetail, VisitStatus};
use crate::db::visits::DETAIL_SELECT;
use crate::{Error, Result};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ModalityCount {
    pub modality: Modality,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MonthCount {
    /// 1-12
    pub month: i64,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct GroupCount {
    pub group_name: String,
    pub apprentice_count: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CompanyCount {
    pub company_name: String,
    pub apprentice_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectLeadStatistics {
    pub year: i32,
    /// Visits with status `done` in `year`
    pub done_visits: i64,
    /// Distinct apprentices visited in `year`, whatever the visit status
    pub apprentices_followed: i64,
    pub by_modality: Vec<ModalityCount>,
    pub by_month: Vec<MonthCount>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Totals {
    pub apprentices: i64,
    pub companies: i64,
    pub visits: i64,
    pub project_leads: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConsultantStatistics {
    pub year: i32,
    pub totals: Totals,
    pub by_modality: Vec<ModalityCount>,
    pub by_month: Vec<MonthCount>,
    pub groups: Vec<GroupCount>,
    pub top_companies: Vec<CompanyCount>,
}

/// Number of companies listed in the consultant ranking
pub const TOP_COMPANIES: i64 = 10;

pub async fn project_lead_statistics(
    pool: &SqlitePool,
    project_lead_id: i64,
    year: i32,
) -> Result<ProjectLeadStatistics> {
    let done_visits: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM visits
        WHERE project_lead_id = ? AND status = ?
          AND CAST(strftime('%Y', visit_date) AS INTEGER) = ?
        "#,
    )
    .bind(project_lead_id)
    .bind(VisitStatus::Done)
    .bind(year)
    .fetch_one(pool)
    .await?;

    let apprentices_followed: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(DISTINCT apprentice_id) FROM visits
        WHERE project_lead_id = ?
          AND CAST(strftime('%Y', visit_date) AS INTEGER) = ?
        "#,
    )
    .bind(project_lead_id)
    .bind(year)
    .fetch_one(pool)
    .await?;

    let by_modality = sqlx::query_as::<_, ModalityCount>(
        r#"
        SELECT modality, COUNT(*) AS count FROM visits
        WHERE project_lead_id = ? AND status = ?
          AND CAST(strftime('%Y', visit_date) AS INTEGER) = ?
        GROUP BY modality
        ORDER BY modality
        "#,
    )
    .bind(project_lead_id)
    .bind(VisitStatus::Done)
    .bind(year)
    .fetch_all(pool)
    .await?;

    let by_month = sqlx::query_as::<_, MonthCount>(
        r#"
        SELECT CAST(strftime('%m', visit_date) AS INTEGER) AS month, COUNT(*) AS count
        FROM visits
        WHERE project_lead_id = ? AND status = ?
          AND CAST(strftime('%Y', visit_date) AS INTEGER) = ?
        GROUP BY month
        ORDER BY month
        "#,
    )
    .bind(project_lead_id)
    .bind(VisitStatus::Done)
    .bind(year)
    .fetch_all(pool)
    .await?;

    Ok(ProjectLeadStatistics {
        year,
        done_visits,
        apprentices_followed,
        by_modality,
        by_month,
    })
}

pub async fn consultant_statistics(pool: &SqlitePool, year: i32) -> Result<ConsultantStatistics> {
    let apprentices: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM apprentices WHERE is_active = 1")
            .fetch_one(pool)
            .await?;
    let companies: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM companies")
        .fetch_one(pool)
        .await?;
    let visits: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM visits WHERE CAST(strftime('%Y', visit_date) AS INTEGER) = ?",
    )
    .bind(year)
    .fetch_one(pool)
    .await?;
    let project_leads: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = ? AND is_active = 1")
            .bind(Role::ProjectLead)
            .fetch_one(pool)
            .await?;

    let by_modality = sqlx::query_as::<_, ModalityCount>(
        r#"
        SELECT modality, COUNT(*) AS count FROM visits
        WHERE CAST(strftime('%Y', visit_date) AS INTEGER) = ?
        GROUP BY modality
        ORDER BY modality
        "#,
    )
    .bind(year)
    .fetch_all(pool)
    .await?;

    let by_month = sqlx::query_as::<_, MonthCount>(
        r#"
        SELECT CAST(strftime('%m', visit_date) AS INTEGER) AS month, COUNT(*) AS count
        FROM visits
        WHERE CAST(strftime('%Y', visit_date) AS INTEGER) = ?
        GROUP BY month
        ORDER BY month
        "#,
    )
    .bind(year)
    .fetch_all(pool)
    .await?;

    let groups = sqlx::query_as::<_, GroupCount>(
        r#"
        SELECT g.name AS group_name, COUNT(a.id) AS apprentice_count
        FROM class_groups g
        LEFT JOIN apprentices a ON a.group_id = g.id AND a.is_active = 1
        GROUP BY g.id
        ORDER BY g.name
        "#,
    )
    .fetch_all(pool)
    .await?;

    let top_companies = sqlx::query_as::<_, CompanyCount>(
        r#"
        SELECT c.name AS company_name, COUNT(a.id) AS apprentice_count
        FROM companies c
        LEFT JOIN apprentices a ON a.company_id = c.id AND a.is_active = 1
        GROUP BY c.id
        ORDER BY apprentice_count DESC, c.name
        LIMIT ?
        "#,
    )
    .bind(TOP_COMPANIES)
    .fetch_all(pool)
    .await?;

    Ok(ConsultantStatistics {
        year,
        totals: Totals {
            apprentices,
            companies,
            visits,
            project_leads,
        },
        by_modality,
        by_month,
        groups,
        top_companies,
    })
}

/// Time window of a visit report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportPeriod {
    /// Calendar month containing the reference date
    Month,
    /// Calendar year containing the reference date
    Year,
    All,
}

impl FromStr for ReportPeriod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "month" => Ok(ReportPeriod::Month),
            "year" => Ok(ReportPeriod::Year),
            "all" => Ok(ReportPeriod::All),
            other => Err(Error::InvalidInput(format!(
                "Invalid period '{}' (expected month, year or all)",
                other
            ))),
        }
    }
}

/// Visits within `period` around `today`, most recent first
pub async fn visits_for_period(
    pool: &SqlitePool,
    period: ReportPeriod,
    today: NaiveDate,
) -> Result<Vec<VisitDetail>> {
    let order = "ORDER BY v.visit_date DESC, v.id DESC";
    let visits = match period {
        ReportPeriod::Month => {
            let sql = format!(
                r#"{} WHERE CAST(strftime('%Y', v.visit_date) AS INTEGER) = ?
                     AND CAST(strftime('%m', v.visit_date) AS INTEGER) = ? {}"#,
                DETAIL_SELECT, order
            );
            sqlx::query_as::<_, VisitDetail>(&sql)
                .bind(today.year())
                .bind(today.month())
                .fetch_all(pool)
                .await?
        }
        ReportPeriod::Year => {
            let sql = format!(
                "{} WHERE CAST(strftime('%Y', v.visit_date) AS INTEGER) = ? {}",
                DETAIL_SELECT, order
            );
            sqlx::query_as::<_, VisitDetail>(&sql)
                .bind(today.year())
                .fetch_all(pool)
                .await?
        }
        ReportPeriod::All => {
            let sql = format!("{} {}", DETAIL_SELECT, order);
            sqlx::query_as::<_, VisitDetail>(&sql).fetch_all(pool).await?
        }
    };
    Ok(visits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_parsing() {
        assert_eq!("month".parse::<ReportPeriod>().unwrap(), ReportPeriod::Month);
        assert_eq!("year".parse::<ReportPeriod>().unwrap(), ReportPeriod::Year);
        assert_eq!("all".parse::<ReportPeriod>().unwrap(), ReportPeriod::All);
        assert!("week".parse::<ReportPeriod>().is_err());
        assert!("".parse::<ReportPeriod>().is_err());
    }
}
