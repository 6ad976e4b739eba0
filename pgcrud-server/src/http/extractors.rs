//! Custom Axum extractors
//!
//! Every rejection here is an [`ApiError`], so malformed input gets the same
//! JSON error body as any other failed request.

use std::sync::Arc;

use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request};
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;

use super::error::ApiError;
use super::server::AppState;
use crate::db::PgSession;
use crate::lifecycle::{Lifecycle, ReadinessState};
use crate::models::ValidationError;

/// Check readiness, then begin a session.
///
/// Handlers that read a body call this after the body is decoded and
/// validated, so no connection is held while a client uploads.
pub async fn open_session(lifecycle: &Lifecycle) -> Result<PgSession, ApiError> {
    let readiness = lifecycle.readiness().get();
    if readiness != ReadinessState::Ready {
        return Err(ApiError::NotReady { state: readiness });
    }

    Ok(lifecycle.acquire_session().await?)
}

/// A request-scoped database session, for handlers without a body.
///
/// Rejected with 503 before touching the pool unless the instance is ready.
/// Dropping it without committing rolls back and releases the connection,
/// which also covers handlers whose client disconnects mid-request.
pub struct Session(pub PgSession);

impl FromRequestParts<Arc<AppState>> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(
        _parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        open_session(&state.lifecycle).await.map(Self)
    }
}

/// Extract and validate a numeric id from path
pub struct ValidId(pub i64);

impl<S> FromRequestParts<S> for ValidId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let invalid = || {
            ApiError::Validation(ValidationError::InvalidFormat {
                field: "id",
                reason: "must be a positive integer",
            })
        };

        let Path(raw): Path<String> = Path::from_request_parts(parts, state)
            .await
            .map_err(|_| invalid())?;

        let id = raw
            .parse::<i64>()
            .ok()
            .filter(|id| *id > 0)
            .ok_or_else(invalid)?;

        Ok(Self(id))
    }
}

/// JSON body whose decode failures are 400 `validation_error`.
pub struct ValidJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Json::<T>::from_request(req, state)
            .await
            .map(|Json(value)| Self(value))
            .map_err(|rejection| malformed("request body", rejection.body_text()))
    }
}

/// Query string whose decode failures are 400 `validation_error`.
pub struct ValidQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ValidQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Query::<T>::from_request_parts(parts, state)
            .await
            .map(|Query(value)| Self(value))
            .map_err(|rejection| malformed("query string", rejection.body_text()))
    }
}

fn malformed(part: &'static str, reason: String) -> ApiError {
    ApiError::Validation(ValidationError::Malformed { part, reason })
}
