//! Input validation for create requests

use serde::Serialize;

use crate::db::models::{NewApprentice, NewCompany, NewGroup, NewMentor, NewUser};

/// One rejected field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

fn require(errors: &mut Vec<FieldError>, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.push(FieldError::new(field, format!("{} is required", field)));
    }
}

fn optional_email(errors: &mut Vec<FieldError>, field: &str, value: Option<&str>) {
    if let Some(email) = value {
        if !email.is_empty() && !is_valid_email(email) {
            errors.push(FieldError::new(field, "Invalid email"));
        }
    }
}

/// Minimal syntactic email check: `local@domain.tld`, no whitespace
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain
            .split_once('.')
            .is_some_and(|(head, tail)| {
                !head.is_empty() && !tail.is_empty() && !tail.ends_with('.')
            })
}

impl NewUser {
    pub fn validate(&self, min_password_length: usize) -> Vec<FieldError> {
        let mut errors = Vec::new();
        require(&mut errors, "username", &self.username);
        if !is_valid_email(&self.email) {
            errors.push(FieldError::new("email", "Invalid email"));
        }
        if self.password.chars().count() < min_password_length {
            errors.push(FieldError::new(
                "password",
                format!("Password must be at least {} characters", min_password_length),
            ));
        }
        require(&mut errors, "first_name", &self.first_name);
        require(&mut errors, "last_name", &self.last_name);
        errors
    }
}

impl NewGroup {
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        require(&mut errors, "name", &self.name);
        require(&mut errors, "school_year", &self.school_year);
        errors
    }
}

impl NewCompany {
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        require(&mut errors, "name", &self.name);
        require(&mut errors, "postal_address", &self.postal_address);
        optional_email(&mut errors, "email", self.email.as_deref());
        errors
    }
}

impl NewMentor {
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        require(&mut errors, "last_name", &self.last_name);
        require(&mut errors, "first_name", &self.first_name);
        optional_email(&mut errors, "email", self.email.as_deref());
        errors
    }
}

impl NewApprentice {
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        require(&mut errors, "last_name", &self.last_name);
        require(&mut errors, "first_name", &self.first_name);
        optional_email(&mut errors, "email", self.email.as_deref());
        if self.contract_end < self.contract_start {
            errors.push(FieldError::new(
                "contract_end",
                "Contract end must not precede contract start",
            ));
        }
        errors
    }
}
