//! Repository implementations for database access
//!
//! Repositories borrow a session's connection, so every query runs inside
//! the request's transaction:
//! - Conflicts come from UNIQUE constraints (no check-then-insert)
//! - Missing owners come from FOREIGN KEY constraints

pub mod items;
pub mod users;

pub use items::{Item, ItemRepo};
pub use users::{User, UserRepo};

/// Repository error type
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("not found: {resource} '{id}'")]
    NotFound { resource: &'static str, id: String },

    #[error("{resource} with {field} '{value}' already exists")]
    Conflict {
        resource: &'static str,
        field: &'static str,
        value: String,
    },
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

pub(crate) fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_foreign_key_violation())
}
