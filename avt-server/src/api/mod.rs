//! HTTP API handlers for avt-server

use axum::{http::StatusCode, Json};
use chrono::{Datelike, Local};
use serde::{Deserialize, Serialize};

pub mod admin;
pub mod apprentices;
pub mod auth;
pub mod consultant;
pub mod health;
pub mod project_lead;
pub mod visits;

pub use auth::{
    require_authenticated, require_consultant, require_manager, require_project_lead,
    AuthContext,
};
pub use health::health_routes;

/// Body of a successful create
#[derive(Debug, Serialize)]
pub struct Created {
    pub id: i64,
}

pub(crate) fn created(id: i64) -> (StatusCode, Json<Created>) {
    (StatusCode::CREATED, Json(Created { id }))
}

#[derive(Debug, Serialize)]
pub struct Message {
    pub message: String,
}

pub(crate) fn message(text: impl Into<String>) -> Json<Message> {
    Json(Message {
        message: text.into(),
    })
}

/// `?year=` query for statistics endpoints
#[derive(Debug, Default, Deserialize)]
pub struct YearQuery {
    pub year: Option<i32>,
}

impl YearQuery {
    /// Requested year, or the current local year
    pub fn year_or_current(&self) -> i32 {
        self.year.unwrap_or_else(|| Local::now().year())
    }
}
