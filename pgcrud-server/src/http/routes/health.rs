//! Liveness and readiness endpoints
//!
//! `/health` is liveness: always 200, reports what it sees. `/ready` is
//! readiness: 200 only when the lifecycle is ready and a live probe passes.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;

use crate::http::server::AppState;
use crate::lifecycle::{recheck, verify_connectivity, Backend, Readiness, ReadinessState};

#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub message: &'static str,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
    pub readiness: ReadinessState,
    pub service: &'static str,
    pub version: &'static str,
}

/// Readiness response; only `status` is set when ready.
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<ReadinessState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

impl ReadyResponse {
    fn ready() -> Self {
        Self {
            status: "ready",
            state: None,
            reason: None,
        }
    }

    fn not_ready(state: ReadinessState, reason: &'static str) -> Self {
        Self {
            status: "not_ready",
            state: Some(state),
            reason: Some(reason),
        }
    }
}

pub async fn health_report<B: Backend + ?Sized>(backend: &B, readiness: &Readiness) -> HealthResponse {
    let connected = verify_connectivity(backend).await;
    HealthResponse {
        status: if connected { "healthy" } else { "degraded" },
        database: if connected { "connected" } else { "disconnected" },
        readiness: readiness.get(),
        service: "running",
        version: env!("CARGO_PKG_VERSION"),
    }
}

/// Readiness decision. A failed instance gets one heal attempt first.
pub async fn readiness_report<B: Backend + ?Sized>(
    backend: &B,
    readiness: &Readiness,
) -> (StatusCode, ReadyResponse) {
    let unavailable = |state, reason| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            ReadyResponse::not_ready(state, reason),
        )
    };

    match readiness.get() {
        ReadinessState::NotReady => unavailable(ReadinessState::NotReady, "startup in progress"),
        ReadinessState::Failed => match recheck(backend, readiness).await {
            ReadinessState::Ready => (StatusCode::OK, ReadyResponse::ready()),
            state => unavailable(state, "startup failed"),
        },
        ReadinessState::Ready => {
            if verify_connectivity(backend).await {
                (StatusCode::OK, ReadyResponse::ready())
            } else {
                unavailable(ReadinessState::Ready, "database unreachable")
            }
        }
    }
}

/// GET /
async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "pgcrud with PostgreSQL",
    })
}

/// GET /health
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let lifecycle = &state.lifecycle;
    Json(health_report(lifecycle.backend(), lifecycle.readiness()).await)
}

/// GET /ready
async fn ready(State(state): State<Arc<AppState>>) -> (StatusCode, Json<ReadyResponse>) {
    let lifecycle = &state.lifecycle;
    let (status, body) = readiness_report(lifecycle.backend(), lifecycle.readiness()).await;
    (status, Json(body))
}

/// Health routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/ready", get(ready))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    use crate::error::{ConnectivityError, SchemaError};

    struct Switch {
        up: AtomicBool,
    }

    impl Switch {
        fn new(up: bool) -> Self {
            Self {
                up: AtomicBool::new(up),
            }
        }
    }

    #[async_trait]
    impl Backend for Switch {
        async fn ping(&self) -> Result<(), ConnectivityError> {
            if self.up.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(ConnectivityError::Timeout(std::time::Duration::from_millis(1)))
            }
        }

        async fn materialize_schema(&self) -> Result<(), SchemaError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn root_returns_message() {
        let Json(body) = root().await;
        assert_eq!(body.message, "pgcrud with PostgreSQL");
    }

    #[tokio::test]
    async fn ready_and_reachable_is_200() {
        let readiness = Readiness::new();
        readiness.transition(ReadinessState::Ready).unwrap();

        let (status, body) = readiness_report(&Switch::new(true), &readiness).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({"status": "ready"})
        );
    }

    #[tokio::test]
    async fn ready_but_unreachable_is_503_without_state_change() {
        let readiness = Readiness::new();
        readiness.transition(ReadinessState::Ready).unwrap();

        let (status, body) = readiness_report(&Switch::new(false), &readiness).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.reason, Some("database unreachable"));
        assert_eq!(readiness.get(), ReadinessState::Ready);
    }

    #[tokio::test]
    async fn failed_heals_through_readiness_probe() {
        let readiness = Readiness::new();
        readiness.transition(ReadinessState::Failed).unwrap();
        let backend = Switch::new(false);

        let (status, body) = readiness_report(&backend, &readiness).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.state, Some(ReadinessState::Failed));

        backend.up.store(true, Ordering::SeqCst);
        let (status, _) = readiness_report(&backend, &readiness).await;
        assert_eq!(status, StatusCode::OK);
        assert!(readiness.is_ready());
    }

    #[tokio::test]
    async fn not_ready_skips_probe() {
        let (status, body) = readiness_report(&Switch::new(true), &Readiness::new()).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.reason, Some("startup in progress"));
    }

    #[tokio::test]
    async fn health_is_degraded_when_unreachable() {
        let report = health_report(&Switch::new(false), &Readiness::new()).await;
        assert_eq!(report.status, "degraded");
        assert_eq!(report.database, "disconnected");
        assert_eq!(report.readiness, ReadinessState::NotReady);
        assert_eq!(report.service, "running");
    }
}
