//! Consultant views (`/api/consultant`), read only

use axum::{
    extract::{Path, Query, State},
    middleware,
    routing::get,
    Json, Router,
};
use chrono::Local;

use avt_common::db::apprentices::list_apprentices_with_visit_totals;
use avt_common::db::models::{ApprenticeWithVisits, CompanyOverview, VisitDetail};
use avt_common::db::reference::list_company_overview;
use avt_common::db::reports::{
    consultant_statistics, visits_for_period, ConsultantStatistics, ReportPeriod,
};
use avt_common::db::tracking::{tracking_report, TrackingReportRow};
use avt_common::db::visits::list_visits;

use crate::api::{require_consultant, YearQuery};
use crate::error::ApiResult;
use crate::AppState;

pub async fn visits(State(state): State<AppState>) -> ApiResult<Json<Vec<VisitDetail>>> {
    Ok(Json(list_visits(&state.db).await?))
}

pub async fn apprentices(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<ApprenticeWithVisits>>> {
    Ok(Json(list_apprentices_with_visit_totals(&state.db).await?))
}

pub async fn companies(State(state): State<AppState>) -> ApiResult<Json<Vec<CompanyOverview>>> {
    Ok(Json(list_company_overview(&state.db).await?))
}

pub async fn tracking(State(state): State<AppState>) -> ApiResult<Json<Vec<TrackingReportRow>>> {
    Ok(Json(tracking_report(&state.db).await?))
}

pub async fn statistics(
    State(state): State<AppState>,
    Query(query): Query<YearQuery>,
) -> ApiResult<Json<ConsultantStatistics>> {
    Ok(Json(
        consultant_statistics(&state.db, query.year_or_current()).await?,
    ))
}

/// GET /api/consultant/reports/:period - `month`, `year` or `all`
pub async fn report(
    State(state): State<AppState>,
    Path(period): Path<String>,
) -> ApiResult<Json<Vec<VisitDetail>>> {
    let period: ReportPeriod = period.parse()?;
    let today = Local::now().date_naive();
    Ok(Json(visits_for_period(&state.db, period, today).await?))
}

/// Build consultant routes
pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/visits", get(visits))
        .route("/apprentices", get(apprentices))
        .route("/companies", get(companies))
        .route("/tracking", get(tracking))
        .route("/statistics", get(statistics))
        .route("/reports/:period", get(report))
        .route_layer(middleware::from_fn_with_state(state, require_consultant))
}
