//! # AVT Common Library
//!
//! Shared code for the apprentice visit tracking service:
//! - Database schema, models and queries
//! - Annual visit tracking rule (slot reconciliation)
//! - Credential hashing and input validation
//! - Configuration loading

pub mod config;
pub mod db;
pub mod error;
pub mod password;
pub mod tracking;
pub mod validation;

pub use error::{Error, Result};
pub use tracking::{ReconcileOutcome, TrackingSlots, SLOT_COUNT};
