//! Apprentice endpoints (`/api/apprentices`)
//!
//! Reads are open to every role; writes are manager only.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    middleware,
    routing::get,
    Extension, Json, Router,
};

use avt_common::db::apprentices::{self, ApprenticeStats};
use avt_common::db::models::{ApprenticeDetail, ApprenticeUpdate, NewApprentice, Role};

use crate::api::{created, message, require_authenticated, AuthContext, Created, Message};
use crate::error::{validated, ApiError, ApiResult};
use crate::AppState;

pub async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<ApprenticeDetail>>> {
    Ok(Json(apprentices::list_apprentices(&state.db).await?))
}

pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<ApprenticeDetail>> {
    apprentices::get_apprentice(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Apprentice {} not found", id)))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    payload: Result<Json<NewApprentice>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Created>)> {
    ctx.require_any(&[Role::Manager])?;
    let Json(apprentice) = payload?;
    validated(apprentice.validate())?;

    let id = apprentices::create_apprentice(&state.db, &apprentice).await?;
    Ok(created(id))
}

/// PUT /api/apprentices/:id - partial update, returns the updated record
pub async fn update(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<i64>,
    payload: Result<Json<ApprenticeUpdate>, JsonRejection>,
) -> ApiResult<Json<ApprenticeDetail>> {
    ctx.require_any(&[Role::Manager])?;
    let Json(changes) = payload?;
    if changes.is_empty() {
        return Err(ApiError::BadRequest("No fields to update".to_string()));
    }

    if !apprentices::update_apprentice(&state.db, id, &changes).await? {
        return Err(ApiError::NotFound(format!("Apprentice {} not found", id)));
    }

    apprentices::get_apprentice(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Apprentice {} not found", id)))
}

/// DELETE /api/apprentices/:id - soft delete
pub async fn remove(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Message>> {
    ctx.require_any(&[Role::Manager])?;
    if !apprentices::deactivate_apprentice(&state.db, id).await? {
        return Err(ApiError::NotFound(format!("Apprentice {} not found", id)));
    }
    Ok(message("Apprentice deactivated"))
}

pub async fn stats_overview(State(state): State<AppState>) -> ApiResult<Json<ApprenticeStats>> {
    Ok(Json(apprentices::apprentice_stats(&state.db).await?))
}

/// Build apprentice routes
pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/stats/overview", get(stats_overview))
        .route("/:id", get(get_one).put(update).delete(remove))
        .route_layer(middleware::from_fn_with_state(state, require_authenticated))
}
