//! pgcrud-server: user/item CRUD over PostgreSQL
//!
//! The interesting part is the connection lifecycle: configuration is
//! resolved up front, the engine is created lazily, startup verifies
//! connectivity with bounded retry before materializing the schema, and
//! readiness is reported through an explicit state machine instead of
//! crashing the process. Requests work inside scoped sessions that are
//! released exactly once.

pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod models;

pub use config::{resolve_config, resolve_retry_policy, ConfigError, ConfigSource, ConnectionConfig, EnvSource};
pub use error::{Error, Result};
pub use lifecycle::{Lifecycle, Readiness, ReadinessState, RetryPolicy};
