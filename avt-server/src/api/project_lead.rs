//! Project lead views (`/api/project-lead`)
//!
//! Every listing is scoped to the calling project lead.

use axum::{
    extract::{Query, State},
    middleware,
    routing::get,
    Extension, Json, Router,
};

use avt_common::db::apprentices::list_apprentices_for_project_lead;
use avt_common::db::models::{ApprenticeWithVisits, VisitDetail, VisitStatus};
use avt_common::db::reports::{project_lead_statistics, ProjectLeadStatistics};
use avt_common::db::tracking::{tracking_report_for_project_lead, TrackingReportRow};
use avt_common::db::visits::list_visits_for_project_lead;

use crate::api::{require_project_lead, AuthContext, YearQuery};
use crate::error::ApiResult;
use crate::AppState;

pub async fn my_visits(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> ApiResult<Json<Vec<VisitDetail>>> {
    Ok(Json(
        list_visits_for_project_lead(&state.db, ctx.user_id, None).await?,
    ))
}

/// Upcoming visits, soonest first
pub async fn planned_visits(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> ApiResult<Json<Vec<VisitDetail>>> {
    Ok(Json(
        list_visits_for_project_lead(&state.db, ctx.user_id, Some(VisitStatus::Planned)).await?,
    ))
}

pub async fn done_visits(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> ApiResult<Json<Vec<VisitDetail>>> {
    Ok(Json(
        list_visits_for_project_lead(&state.db, ctx.user_id, Some(VisitStatus::Done)).await?,
    ))
}

/// Active apprentices with the number of done visits by the caller
pub async fn my_apprentices(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> ApiResult<Json<Vec<ApprenticeWithVisits>>> {
    Ok(Json(
        list_apprentices_for_project_lead(&state.db, ctx.user_id).await?,
    ))
}

pub async fn my_tracking(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> ApiResult<Json<Vec<TrackingReportRow>>> {
    Ok(Json(
        tracking_report_for_project_lead(&state.db, ctx.user_id).await?,
    ))
}

pub async fn statistics(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Query(query): Query<YearQuery>,
) -> ApiResult<Json<ProjectLeadStatistics>> {
    let year = query.year_or_current();
    Ok(Json(
        project_lead_statistics(&state.db, ctx.user_id, year).await?,
    ))
}

/// Build project lead routes
pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/visits", get(my_visits))
        .route("/visits/planned", get(planned_visits))
        .route("/visits/done", get(done_visits))
        .route("/apprentices", get(my_apprentices))
        .route("/tracking", get(my_tracking))
        .route("/statistics", get(statistics))
        .route_layer(middleware::from_fn_with_state(state, require_project_lead))
}
