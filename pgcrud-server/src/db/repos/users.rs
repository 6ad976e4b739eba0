//! User repository

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection};

use super::{is_unique_violation, DbError};
use crate::models::{NewUser, Window};

/// User record from database
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// User repository
pub struct UserRepo<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> UserRepo<'c> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    /// Insert a user. A taken email is a [`DbError::Conflict`]; the
    /// surrounding transaction is then unusable and must be rolled back.
    pub async fn create(&mut self, new: &NewUser) -> Result<User, DbError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, name)
            VALUES ($1, $2)
            RETURNING id, email, name, created_at
            "#,
        )
        .bind(new.email.as_str())
        .bind(new.name.as_str())
        .fetch_one(&mut *self.conn)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DbError::Conflict {
                    resource: "user",
                    field: "email",
                    value: new.email.as_str().to_owned(),
                }
            } else {
                DbError::from(e)
            }
        })
    }

    /// List users ordered by id.
    pub async fn list(&mut self, window: Window) -> Result<Vec<User>, DbError> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, name, created_at
            FROM users
            ORDER BY id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(i64::from(window.limit))
        .bind(i64::from(window.skip))
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(users)
    }

    pub async fn get(&mut self, id: i64) -> Result<User, DbError> {
        sqlx::query_as::<_, User>(
            "SELECT id, email, name, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?
        .ok_or_else(|| DbError::NotFound {
            resource: "user",
            id: id.to_string(),
        })
    }
}
