//! HTTP server layer
//!
//! Axum server with:
//! - Liveness (`/health`) and readiness (`/ready`)
//! - User/item CRUD over request-scoped sessions
//! - JSON error responses

pub mod error;
pub mod extractors;
pub mod routes;
pub mod server;

pub use error::ApiError;
pub use server::{build_router, run_server, AppState, ServerConfig, ServerError};
