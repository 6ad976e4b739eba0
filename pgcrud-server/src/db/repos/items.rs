//! Item repository

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection};

use super::{is_foreign_key_violation, DbError};
use crate::models::{NewItem, Window};

/// Item record from database
#[derive(Debug, Clone, FromRow)]
pub struct Item {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub owner_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Item repository
pub struct ItemRepo<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> ItemRepo<'c> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    /// Insert an item for `owner_id`. An unknown owner is
    /// [`DbError::NotFound`], detected by the foreign key.
    pub async fn create_for_owner(&mut self, owner_id: i64, new: &NewItem) -> Result<Item, DbError> {
        sqlx::query_as::<_, Item>(
            r#"
            INSERT INTO items (title, description, owner_id)
            VALUES ($1, $2, $3)
            RETURNING id, title, description, owner_id, created_at
            "#,
        )
        .bind(&new.title)
        .bind(new.description.as_deref())
        .bind(owner_id)
        .fetch_one(&mut *self.conn)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                DbError::NotFound {
                    resource: "user",
                    id: owner_id.to_string(),
                }
            } else {
                DbError::from(e)
            }
        })
    }

    /// List items ordered by id.
    pub async fn list(&mut self, window: Window) -> Result<Vec<Item>, DbError> {
        let items = sqlx::query_as::<_, Item>(
            r#"
            SELECT id, title, description, owner_id, created_at
            FROM items
            ORDER BY id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(i64::from(window.limit))
        .bind(i64::from(window.skip))
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(items)
    }
}
