//! Database models

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Role of an authenticated user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
pub enum Role {
    #[serde(rename = "manager")]
    #[sqlx(rename = "manager")]
    Manager,
    /// Project lead ("chef de projet"): performs and logs visits
    #[serde(rename = "chef_projet")]
    #[sqlx(rename = "chef_projet")]
    ProjectLead,
    #[serde(rename = "consultant")]
    #[sqlx(rename = "consultant")]
    Consultant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Manager => "manager",
            Role::ProjectLead => "chef_projet",
            Role::Consultant => "consultant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manager" => Ok(Role::Manager),
            "chef_projet" => Ok(Role::ProjectLead),
            "consultant" => Ok(Role::Consultant),
            other => Err(Error::InvalidInput(format!("Unknown role: {}", other))),
        }
    }
}

/// How a visit was carried out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum Modality {
    Phone,
    OnSite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum VisitStatus {
    Planned,
    Done,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ApprenticeStatus {
    Active,
    Suspended,
    Completed,
    Dropped,
}

// ========================================
// Users
// ========================================

/// User profile (never carries credentials)
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
}

// ========================================
// Reference data
// ========================================

/// Class group an apprentice belongs to
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Group {
    pub id: i64,
    pub name: String,
    pub school_year: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewGroup {
    pub name: String,
    pub school_year: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Company {
    pub id: i64,
    pub name: String,
    /// Trading name ("enseigne"), when it differs from the legal name
    pub trade_name: Option<String>,
    pub postal_address: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCompany {
    pub name: String,
    pub trade_name: Option<String>,
    pub postal_address: String,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// Company with consultant-facing counters
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CompanyOverview {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub company: Company,
    pub apprentice_count: i64,
    pub mentor_count: i64,
    pub visit_count: i64,
}

/// Workplace mentor ("maître d'apprentissage")
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Mentor {
    pub id: i64,
    pub company_id: i64,
    pub last_name: String,
    pub first_name: String,
    pub mobile_phone: Option<String>,
    pub email: Option<String>,
    pub job_title: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MentorDetail {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub mentor: Mentor,
    pub company_name: String,
    pub company_trade_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewMentor {
    pub company_id: i64,
    pub last_name: String,
    pub first_name: String,
    pub mobile_phone: Option<String>,
    pub email: Option<String>,
    pub job_title: Option<String>,
}

// ========================================
// Apprentices
// ========================================

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Apprentice {
    pub id: i64,
    pub group_id: i64,
    pub company_id: i64,
    pub mentor_id: i64,
    pub last_name: String,
    pub first_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub contract_start: NaiveDate,
    pub contract_end: NaiveDate,
    pub status: ApprenticeStatus,
    pub notes: Option<String>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Apprentice joined with group, company and mentor names
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ApprenticeDetail {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub apprentice: Apprentice,
    pub group_name: String,
    pub company_name: String,
    pub company_trade_name: Option<String>,
    pub mentor_last_name: String,
    pub mentor_first_name: String,
    pub mentor_phone: Option<String>,
    pub mentor_email: Option<String>,
    pub mentor_job_title: Option<String>,
}

/// Apprentice detail with a visit counter (meaning depends on the query)
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ApprenticeWithVisits {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub detail: ApprenticeDetail,
    pub visit_count: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewApprentice {
    pub group_id: i64,
    pub company_id: i64,
    pub mentor_id: i64,
    pub last_name: String,
    pub first_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub contract_start: NaiveDate,
    pub contract_end: NaiveDate,
    pub notes: Option<String>,
}

/// Partial apprentice update; absent fields keep their stored value
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApprenticeUpdate {
    pub group_id: Option<i64>,
    pub company_id: Option<i64>,
    pub mentor_id: Option<i64>,
    pub last_name: Option<String>,
    pub first_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub contract_start: Option<NaiveDate>,
    pub contract_end: Option<NaiveDate>,
    pub status: Option<ApprenticeStatus>,
    pub notes: Option<String>,
}

impl ApprenticeUpdate {
    pub fn is_empty(&self) -> bool {
        self.group_id.is_none()
            && self.company_id.is_none()
            && self.mentor_id.is_none()
            && self.last_name.is_none()
            && self.first_name.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.address.is_none()
            && self.contract_start.is_none()
            && self.contract_end.is_none()
            && self.status.is_none()
            && self.notes.is_none()
    }
}

// ========================================
// Visits
// ========================================

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Visit {
    pub id: i64,
    pub apprentice_id: i64,
    pub project_lead_id: i64,
    pub visit_date: NaiveDate,
    pub modality: Modality,
    pub status: VisitStatus,
    pub comment: Option<String>,
    pub assessment: Option<String>,
    /// Date the apprentice sent back their own feedback
    pub apprentice_feedback_date: Option<NaiveDate>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Visit joined with apprentice, company, mentor and project lead names
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct VisitDetail {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub visit: Visit,
    pub apprentice_last_name: String,
    pub apprentice_first_name: String,
    pub apprentice_email: Option<String>,
    pub apprentice_phone: Option<String>,
    pub group_name: String,
    pub company_name: String,
    pub company_trade_name: Option<String>,
    pub mentor_last_name: String,
    pub mentor_first_name: String,
    pub mentor_phone: Option<String>,
    pub mentor_email: Option<String>,
    pub project_lead_first_name: String,
    pub project_lead_last_name: String,
}

#[derive(Debug, Clone)]
pub struct NewVisit {
    pub apprentice_id: i64,
    pub project_lead_id: i64,
    pub visit_date: NaiveDate,
    pub modality: Modality,
    pub status: VisitStatus,
    pub comment: Option<String>,
    pub assessment: Option<String>,
    pub apprentice_feedback_date: Option<NaiveDate>,
}

/// Partial visit update; absent fields keep their stored value
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VisitUpdate {
    pub visit_date: Option<NaiveDate>,
    pub modality: Option<Modality>,
    pub status: Option<VisitStatus>,
    pub comment: Option<String>,
    pub assessment: Option<String>,
    pub apprentice_feedback_date: Option<NaiveDate>,
}

impl VisitUpdate {
    pub fn is_empty(&self) -> bool {
        self.visit_date.is_none()
            && self.modality.is_none()
            && self.status.is_none()
            && self.comment.is_none()
            && self.assessment.is_none()
            && self.apprentice_feedback_date.is_none()
    }
}
