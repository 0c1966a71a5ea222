//! Manager administration endpoints (`/api/admin`)

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    middleware,
    routing::get,
    routing::post,
    Extension, Json, Router,
};
use serde::Deserialize;

use avt_common::db::models::{
    ApprenticeDetail, Company, Group, MentorDetail, NewApprentice, NewCompany, NewGroup,
    NewMentor, Role, User,
};
use avt_common::db::tracking::{tracking_report, TrackingReportRow};
use avt_common::db::{apprentices, reference, users, visits};

use crate::api::{created, require_manager, AuthContext, Created};
use crate::error::{validated, ApiResult};
use crate::AppState;

type CreatedResponse = ApiResult<(StatusCode, Json<Created>)>;

pub async fn list_apprentices(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<ApprenticeDetail>>> {
    Ok(Json(apprentices::list_apprentices(&state.db).await?))
}

pub async fn list_groups(State(state): State<AppState>) -> ApiResult<Json<Vec<Group>>> {
    Ok(Json(reference::list_groups(&state.db).await?))
}

pub async fn list_companies(State(state): State<AppState>) -> ApiResult<Json<Vec<Company>>> {
    Ok(Json(reference::list_companies(&state.db).await?))
}

pub async fn list_mentors(State(state): State<AppState>) -> ApiResult<Json<Vec<MentorDetail>>> {
    Ok(Json(reference::list_mentors(&state.db).await?))
}

/// Active project leads, for visit assignment pickers
pub async fn list_project_leads(State(state): State<AppState>) -> ApiResult<Json<Vec<User>>> {
    Ok(Json(users::list_users_by_role(&state.db, Role::ProjectLead).await?))
}

pub async fn create_apprentice(
    State(state): State<AppState>,
    payload: Result<Json<NewApprentice>, JsonRejection>,
) -> CreatedResponse {
    let Json(apprentice) = payload?;
    validated(apprentice.validate())?;
    let id = apprentices::create_apprentice(&state.db, &apprentice).await?;
    Ok(created(id))
}

pub async fn create_company(
    State(state): State<AppState>,
    payload: Result<Json<NewCompany>, JsonRejection>,
) -> CreatedResponse {
    let Json(company) = payload?;
    validated(company.validate())?;
    let id = reference::create_company(&state.db, &company).await?;
    Ok(created(id))
}

pub async fn create_mentor(
    State(state): State<AppState>,
    payload: Result<Json<NewMentor>, JsonRejection>,
) -> CreatedResponse {
    let Json(mentor) = payload?;
    validated(mentor.validate())?;
    let id = reference::create_mentor(&state.db, &mentor).await?;
    Ok(created(id))
}

pub async fn create_group(
    State(state): State<AppState>,
    payload: Result<Json<NewGroup>, JsonRejection>,
) -> CreatedResponse {
    let Json(group) = payload?;
    validated(group.validate())?;
    let id = reference::create_group(&state.db, &group).await?;
    Ok(created(id))
}

#[derive(Debug, Deserialize)]
pub struct AssignmentRequest {
    pub visit_id: i64,
    pub project_lead_id: i64,
}

/// POST /api/admin/visit-assignments
pub async fn create_visit_assignment(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    payload: Result<Json<AssignmentRequest>, JsonRejection>,
) -> CreatedResponse {
    let Json(request) = payload?;
    let id = visits::create_assignment(
        &state.db,
        request.visit_id,
        ctx.user_id,
        request.project_lead_id,
    )
    .await?;
    Ok(created(id))
}

pub async fn get_tracking(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<TrackingReportRow>>> {
    Ok(Json(tracking_report(&state.db).await?))
}

/// Build manager routes
pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/apprentices", get(list_apprentices).post(create_apprentice))
        .route("/groups", get(list_groups).post(create_group))
        .route("/companies", get(list_companies).post(create_company))
        .route("/mentors", get(list_mentors).post(create_mentor))
        .route("/project-leads", get(list_project_leads))
        .route("/visit-assignments", post(create_visit_assignment))
        .route("/tracking", get(get_tracking))
        .route_layer(middleware::from_fn_with_state(state, require_manager))
}
