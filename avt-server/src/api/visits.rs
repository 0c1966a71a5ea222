//! Visit endpoints (`/api/visits`)
//!
//! Recording a visit also places it in the apprentice's annual tracking
//! record. The visit is committed first; a tracking failure is logged and
//! reported in the response but never undoes the visit.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    middleware,
    routing::get,
    Extension, Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::error;

use avt_common::db::models::{Modality, NewVisit, Role, VisitDetail, VisitStatus, VisitUpdate};
use avt_common::db::{apprentices, tracking, users, visits};
use avt_common::tracking::{parse_visit_date, tracking_year};
use avt_common::ReconcileOutcome;

use crate::api::{message, require_authenticated, AuthContext, Message};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateVisitRequest {
    pub apprentice_id: i64,
    /// ISO 8601 date or date-time
    pub visit_date: String,
    pub modality: Modality,
    /// Defaults to `done`
    pub status: Option<VisitStatus>,
    pub comment: Option<String>,
    pub assessment: Option<String>,
    pub apprentice_feedback_date: Option<NaiveDate>,
    /// Required when a manager records a visit on behalf of a project lead
    pub project_lead_id: Option<i64>,
}

/// What happened to the annual tracking record
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum TrackingResult {
    Reconciled(ReconcileOutcome),
    /// The visit is kept; details go to the log only
    Failed { outcome: &'static str, error: &'static str },
}

#[derive(Debug, Serialize)]
pub struct CreateVisitResponse {
    pub visit_id: i64,
    pub tracking: TrackingResult,
}

/// POST /api/visits
pub async fn create(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    payload: Result<Json<CreateVisitRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CreateVisitResponse>)> {
    ctx.require_any(&[Role::ProjectLead, Role::Manager])?;
    let Json(request) = payload?;

    let visit_date = parse_visit_date(&request.visit_date).ok_or_else(|| {
        ApiError::BadRequest(format!("Invalid visit_date '{}'", request.visit_date))
    })?;

    let project_lead_id = if ctx.is(Role::Manager) {
        let id = request.project_lead_id.ok_or_else(|| {
            ApiError::BadRequest("project_lead_id is required".to_string())
        })?;
        if !users::user_has_role(&state.db, id, Role::ProjectLead).await? {
            return Err(ApiError::NotFound(format!("Project lead {} not found", id)));
        }
        id
    } else {
        match request.project_lead_id {
            Some(id) if id != ctx.user_id => {
                return Err(ApiError::Forbidden(
                    "Project leads can only record their own visits".to_string(),
                ))
            }
            _ => ctx.user_id,
        }
    };

    if !apprentices::apprentice_is_active(&state.db, request.apprentice_id).await? {
        return Err(ApiError::NotFound(format!(
            "Apprentice {} not found",
            request.apprentice_id
        )));
    }

    let status = request.status.unwrap_or(VisitStatus::Done);
    let visit_id = visits::create_visit(
        &state.db,
        &NewVisit {
            apprentice_id: request.apprentice_id,
            project_lead_id,
            visit_date,
            modality: request.modality,
            status,
            comment: request.comment,
            assessment: request.assessment,
            apprentice_feedback_date: request.apprentice_feedback_date,
        },
    )
    .await?;

    let year = tracking_year(visit_date);
    let tracking_result =
        match tracking::reconcile(&state.db, request.apprentice_id, year, visit_id).await {
            Ok(outcome) => TrackingResult::Reconciled(outcome),
            Err(e) => {
                error!(
                    apprentice_id = request.apprentice_id,
                    year,
                    visit_id,
                    error = %e,
                    "Annual tracking update failed; visit kept"
                );
                TrackingResult::Failed {
                    outcome: "failed",
                    error: "Annual tracking update failed",
                }
            }
        };

    Ok((
        StatusCode::CREATED,
        Json(CreateVisitResponse {
            visit_id,
            tracking: tracking_result,
        }),
    ))
}

/// GET /api/visits (manager, consultant)
pub async fn list(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> ApiResult<Json<Vec<VisitDetail>>> {
    ctx.require_any(&[Role::Manager, Role::Consultant])?;
    Ok(Json(visits::list_visits(&state.db).await?))
}

/// GET /api/visits/project-lead/:id (manager, or that project lead)
pub async fn list_for_project_lead(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(project_lead_id): Path<i64>,
) -> ApiResult<Json<Vec<VisitDetail>>> {
    if !ctx.is(Role::Manager) && !(ctx.is(Role::ProjectLead) && ctx.user_id == project_lead_id) {
        return Err(ApiError::Forbidden(
            "Only managers or the project lead may list these visits".to_string(),
        ));
    }
    Ok(Json(
        visits::list_visits_for_project_lead(&state.db, project_lead_id, None).await?,
    ))
}

pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<VisitDetail>> {
    visits::get_visit_detail(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Visit {} not found", id)))
}

/// PUT /api/visits/:id (manager, or the project lead who recorded it)
pub async fn update(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<i64>,
    payload: Result<Json<VisitUpdate>, JsonRejection>,
) -> ApiResult<Json<VisitDetail>> {
    ctx.require_any(&[Role::Manager, Role::ProjectLead])?;
    let Json(changes) = payload?;

    let visit = visits::get_visit(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Visit {} not found", id)))?;
    if ctx.is(Role::ProjectLead) && visit.project_lead_id != ctx.user_id {
        return Err(ApiError::Forbidden(
            "Project leads can only edit their own visits".to_string(),
        ));
    }
    if changes.is_empty() {
        return Err(ApiError::BadRequest("No fields to update".to_string()));
    }

    if !visits::update_visit(&state.db, id, &changes).await? {
        return Err(ApiError::NotFound(format!("Visit {} not found", id)));
    }

    visits::get_visit_detail(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Visit {} not found", id)))
}

/// DELETE /api/visits/:id (manager); tracked visits are refused with 409
pub async fn remove(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Message>> {
    ctx.require_any(&[Role::Manager])?;
    visits::delete_visit(&state.db, id).await?;
    Ok(message("Visit deleted"))
}

/// Build visit routes
pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/project-lead/:id", get(list_for_project_lead))
        .route("/:id", get(get_one).put(update).delete(remove))
        .route_layer(middleware::from_fn_with_state(state, require_authenticated))
}
