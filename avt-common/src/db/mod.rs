//! Database models and queries

pub mod apprentices;
pub mod init;
pub mod models;
pub mod reference;
pub mod reports;
pub mod sessions;
pub mod tracking;
pub mod users;
pub mod visits;

pub use init::*;
pub use models::*;
