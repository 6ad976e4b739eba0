//! Database layer - engine, sessions, schema, and repositories
//!
//! # Design Principles
//!
//! - One lazily connecting pool per process, built by a pluggable strategy
//! - Sessions are transactions that release exactly once
//! - Rely on DB constraints, translate violations - no check-then-insert

pub mod engine;
pub mod repos;
pub mod schema;
pub mod session;
pub mod strategy;

pub use engine::{create_engine, EngineHandle};
pub use repos::*;
pub use schema::materialize_schema;
pub use session::{scoped, Lease, PgSession, PgTransaction, SessionError, SessionHandle, SessionLedger, Transactional};
pub use strategy::{strategy_for, ConnectStrategy, DirectTcp, ManagedConnector, UnixSocket};
