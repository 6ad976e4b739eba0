//! Error types for pgcrud-server
//!
//! Driver errors stop at the lifecycle boundary: connectivity failures turn
//! into a `bool` or a readiness state, never into a panic.

use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigError;

/// Transient connectivity failure.
#[derive(Debug, Error)]
pub enum ConnectivityError {
    #[error("database round-trip failed: {0}")]
    Driver(#[from] sqlx::Error),

    #[error("database did not answer within {0:?}")]
    Timeout(Duration),
}

/// Failure while materializing the schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("schema statement '{statement}' failed: {source}")]
    Statement {
        statement: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("schema transaction failed: {0}")]
    Transaction(#[from] sqlx::Error),
}

/// Top-level error for running the server.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
