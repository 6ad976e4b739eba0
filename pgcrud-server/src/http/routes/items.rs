//! Item endpoints

use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::db::{scoped, Item, ItemRepo};
use crate::http::error::ApiError;
use crate::http::extractors::{Session, ValidQuery};
use crate::http::server::AppState;
use crate::models::{Window, WindowParams};

/// Item response
#[derive(Debug, Serialize)]
pub struct ItemResponse {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub owner_id: i64,
    pub created_at: String,
}

impl From<Item> for ItemResponse {
    fn from(i: Item) -> Self {
        Self {
            id: i.id,
            title: i.title,
            description: i.description,
            owner_id: i.owner_id,
            created_at: i.created_at.to_rfc3339(),
        }
    }
}

/// GET /items/ - list items
async fn list_items(
    ValidQuery(params): ValidQuery<WindowParams>,
    Session(session): Session,
) -> Result<Json<Vec<ItemResponse>>, ApiError> {
    let window = Window::from(params);

    let items = scoped(session, |tx| {
        Box::pin(async move { Ok::<_, ApiError>(ItemRepo::new(tx).list(window).await?) })
    })
    .await?;

    Ok(Json(items.into_iter().map(ItemResponse::from).collect()))
}

/// Item routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/items", get(list_items))
        .route("/items/", get(list_items))
}
