//! User endpoints

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::items::ItemResponse;
use crate::db::{scoped, ItemRepo, User, UserRepo};
use crate::http::error::ApiError;
use crate::http::extractors::{open_session, Session, ValidId, ValidJson, ValidQuery};
use crate::http::server::AppState;
use crate::models::{NewItem, NewUser, Window, WindowParams};

/// Create user request
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub name: String,
}

/// Create item request
#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    pub title: String,
    pub description: Option<String>,
}

/// User response
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            name: u.name,
            created_at: u.created_at.to_rfc3339(),
        }
    }
}

/// POST /users/ - create a user
///
/// The body is decoded and validated before a session is opened.
async fn create_user(
    State(state): State<Arc<AppState>>,
    ValidJson(req): ValidJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let new_user = NewUser::parse(&req.email, &req.name)?;
    let session = open_session(&state.lifecycle).await?;

    let user = scoped(session, |tx| {
        Box::pin(async move { Ok::<_, ApiError>(UserRepo::new(tx).create(&new_user).await?) })
    })
    .await?;

    tracing::info!(user_id = user.id, "user created");
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// GET /users/ - list users
async fn list_users(
    ValidQuery(params): ValidQuery<WindowParams>,
    Session(session): Session,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let window = Window::from(params);

    let users = scoped(session, |tx| {
        Box::pin(async move { Ok::<_, ApiError>(UserRepo::new(tx).list(window).await?) })
    })
    .await?;

    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// GET /users/{id} - get a single user
async fn get_user(
    ValidId(id): ValidId,
    Session(session): Session,
) -> Result<Json<UserResponse>, ApiError> {
    let user = scoped(session, |tx| {
        Box::pin(async move { Ok::<_, ApiError>(UserRepo::new(tx).get(id).await?) })
    })
    .await?;

    Ok(Json(UserResponse::from(user)))
}

/// POST /users/{id}/items/ - create an item owned by a user
async fn create_item_for_user(
    ValidId(owner_id): ValidId,
    State(state): State<Arc<AppState>>,
    ValidJson(req): ValidJson<CreateItemRequest>,
) -> Result<(StatusCode, Json<ItemResponse>), ApiError> {
    let new_item = NewItem::parse(&req.title, req.description.as_deref())?;
    let session = open_session(&state.lifecycle).await?;

    let item = scoped(session, |tx| {
        Box::pin(async move {
            Ok::<_, ApiError>(ItemRepo::new(tx).create_for_owner(owner_id, &new_item).await?)
        })
    })
    .await?;

    Ok((StatusCode::CREATED, Json(ItemResponse::from(item))))
}

/// User routes; each path answers with and without a trailing slash.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/", get(list_users).post(create_user))
        .route("/users/{id}", get(get_user))
        .route("/users/{id}/items", post(create_item_for_user))
        .route("/users/{id}/items/", post(create_item_for_user))
}
