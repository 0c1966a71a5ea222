//! Reference data: class groups, companies and mentors

use sqlx::SqlitePool;

use crate::db::models::{
    Company, CompanyOverview, Group, Mentor, MentorDetail, NewCompany, NewGroup, NewMentor,
};
use crate::{Error, Result};

pub async fn list_groups(pool: &SqlitePool) -> Result<Vec<Group>> {
    let groups = sqlx::query_as::<_, Group>(
        "SELECT id, name, school_year, created_at FROM class_groups ORDER BY name",
    )
    .fetch_all(pool)
    .await?;
    Ok(groups)
}

pub async fn create_group(pool: &SqlitePool, group: &NewGroup) -> Result<i64> {
    let id = sqlx::query("INSERT INTO class_groups (name, school_year) VALUES (?, ?)")
        .bind(group.name.trim())
        .bind(group.school_year.trim())
        .execute(pool)
        .await?
        .last_insert_rowid();
    Ok(id)
}

pub async fn list_companies(pool: &SqlitePool) -> Result<Vec<Company>> {
    let companies = sqlx::query_as::<_, Company>(
        r#"
        SELECT id, name, trade_name, postal_address, phone, email, created_at
        FROM companies
        ORDER BY name
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(companies)
}

/// Companies with active apprentice, mentor and visit counters
pub async fn list_company_overview(pool: &SqlitePool) -> Result<Vec<CompanyOverview>> {
    let companies = sqlx::query_as::<_, CompanyOverview>(
        r#"
        SELECT
            c.id, c.name, c.trade_name, c.postal_address, c.phone, c.email, c.created_at,
            COUNT(DISTINCT a.id) AS apprentice_count,
            COUNT(DISTINCT m.id) AS mentor_count,
            COUNT(DISTINCT v.id) AS visit_count
        FROM companies c
        LEFT JOIN apprentices a ON a.company_id = c.id AND a.is_active = 1
        LEFT JOIN mentors m ON m.company_id = c.id
        LEFT JOIN visits v ON v.apprentice_id = a.id
        GROUP BY c.id
        ORDER BY c.name
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(companies)
}

pub async fn create_company(pool: &SqlitePool, company: &NewCompany) -> Result<i64> {
    let id = sqlx::query(
        r#"
        INSERT INTO companies (name, trade_name, postal_address, phone, email)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(company.name.trim())
    .bind(&company.trade_name)
    .bind(company.postal_address.trim())
    .bind(&company.phone)
    .bind(&company.email)
    .execute(pool)
    .await?
    .last_insert_rowid();
    Ok(id)
}

/// Mentors with the name of their company
pub async fn list_mentors(pool: &SqlitePool) -> Result<Vec<MentorDetail>> {
    let mentors = sqlx::query_as::<_, MentorDetail>(
        r#"
        SELECT
            m.id, m.company_id, m.last_name, m.first_name, m.mobile_phone, m.email,
            m.job_title, m.created_at,
            c.name AS company_name,
            c.trade_name AS company_trade_name
        FROM mentors m
        JOIN companies c ON c.id = m.company_id
        ORDER BY m.last_name, m.first_name
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(mentors)
}

pub async fn get_mentor(pool: &SqlitePool, id: i64) -> Result<Option<Mentor>> {
    let mentor = sqlx::query_as::<_, Mentor>(
        r#"
        SELECT id, company_id, last_name, first_name, mobile_phone, email, job_title, created_at
        FROM mentors WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(mentor)
}

/// Insert a mentor; the company must exist
pub async fn create_mentor(pool: &SqlitePool, mentor: &NewMentor) -> Result<i64> {
    if !company_exists(pool, mentor.company_id).await? {
        return Err(Error::NotFound(format!("Company {}", mentor.company_id)));
    }

    let id = sqlx::query(
        r#"
        INSERT INTO mentors (company_id, last_name, first_name, mobile_phone, email, job_title)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(mentor.company_id)
    .bind(mentor.last_name.trim())
    .bind(mentor.first_name.trim())
    .bind(&mentor.mobile_phone)
    .bind(&mentor.email)
    .bind(&mentor.job_title)
    .execute(pool)
    .await?
    .last_insert_rowid();
    Ok(id)
}

pub async fn group_exists(pool: &SqlitePool, id: i64) -> Result<bool> {
    let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM class_groups WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(found.is_some())
}

pub async fn company_exists(pool: &SqlitePool, id: i64) -> Result<bool> {
    let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM companies WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(found.is_some())
}
