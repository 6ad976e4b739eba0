//! Schema materialization
//!
//! Every statement is `IF NOT EXISTS`, so running this on every startup is
//! safe. Instances starting together are serialized by a
//! transaction-scoped advisory lock.

use sqlx::PgPool;

use crate::error::SchemaError;

/// Advisory lock key ("pgcrud" in ASCII).
const SCHEMA_LOCK_KEY: i64 = 0x7067_6372_7564;

/// Named DDL statements, applied in order.
pub const STATEMENTS: &[(&str, &str)] = &[
    (
        "users",
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id BIGSERIAL PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "items",
        r#"
        CREATE TABLE IF NOT EXISTS items (
            id BIGSERIAL PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT,
            owner_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "idx_items_owner",
        "CREATE INDEX IF NOT EXISTS idx_items_owner ON items(owner_id)",
    ),
];

/// Create any missing tables and indexes in one transaction.
pub async fn materialize_schema(pool: &PgPool) -> Result<(), SchemaError> {
    tracing::info!("Materializing schema...");

    let mut tx = pool.begin().await?;

    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(SCHEMA_LOCK_KEY)
        .execute(&mut *tx)
        .await?;

    for &(statement, sql) in STATEMENTS {
        sqlx::query(sql)
            .execute(&mut *tx)
            .await
            .map_err(|source| SchemaError::Statement { statement, source })?;
        tracing::debug!(statement, "schema statement applied");
    }

    tx.commit().await?;

    tracing::info!(statements = STATEMENTS.len(), "Schema materialized");
    Ok(())
}
