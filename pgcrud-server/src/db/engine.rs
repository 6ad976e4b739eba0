//! Pooled engine
//!
//! Uses sqlx PgPool created lazily: building the engine does no I/O, the
//! first checkout dials. Server-side `statement_timeout` makes Postgres
//! cancel a runaway statement, so round-trips fail instead of hanging.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, PgPool};

use super::schema;
use super::session::{PgSession, SessionError, SessionHandle, SessionLedger};
use super::strategy::{strategy_for, ConnectStrategy};
use crate::config::ConnectionConfig;
use crate::error::{ConnectivityError, SchemaError};
use crate::lifecycle::Backend;

/// Extra time the probe allows on top of the pool's acquire timeout.
const PROBE_GRACE: Duration = Duration::from_secs(1);

const APPLICATION_NAME: &str = "pgcrud";

/// Process-wide pooled connection factory.
///
/// Cheap to clone; clones share the pool and the session ledger.
#[derive(Clone)]
pub struct EngineHandle {
    pool: PgPool,
    strategy: &'static str,
    ledger: SessionLedger,
    probe_timeout: Duration,
}

/// Build the engine for `config`.
pub fn create_engine(config: &ConnectionConfig) -> EngineHandle {
    let strategy = strategy_for(&config.target, config.ssl_mode);
    let options = connect_options(config, strategy.as_ref());

    let mut pool_options = PgPoolOptions::new()
        .max_connections(config.pool.max_connections)
        .acquire_timeout(config.pool.acquire_timeout);

    if !strategy.retains_idle_connections() {
        // Close on release so the next checkout dials through the connector.
        pool_options = pool_options
            .min_connections(0)
            .after_release(|_conn, _meta| Box::pin(async move { Ok(false) }));
    }

    tracing::info!(
        strategy = strategy.name(),
        target = %config.target,
        database = %config.database,
        max_connections = config.pool.max_connections,
        "Database engine created"
    );

    EngineHandle {
        pool: pool_options.connect_lazy_with(options),
        strategy: strategy.name(),
        ledger: SessionLedger::new(),
        probe_timeout: config.pool.acquire_timeout + PROBE_GRACE,
    }
}

/// Credentials and server settings, routed by `strategy`.
fn connect_options(config: &ConnectionConfig, strategy: &dyn ConnectStrategy) -> PgConnectOptions {
    let base = PgConnectOptions::new_without_pgpass()
        .username(&config.user)
        .password(config.password.expose())
        .database(&config.database)
        .application_name(APPLICATION_NAME)
        .options([
            ("statement_timeout", config.statement_timeout.as_millis().to_string()),
            ("lock_timeout", config.lock_timeout.as_millis().to_string()),
            ("jit", "off".to_string()),
        ]);

    let options = strategy.route(base);
    if config.echo {
        options
    } else {
        options.disable_statement_logging()
    }
}

impl EngineHandle {
    pub fn strategy(&self) -> &'static str {
        self.strategy
    }

    pub fn ledger(&self) -> &SessionLedger {
        &self.ledger
    }

    pub(crate) fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Begin a transaction and take a ledger lease.
    pub async fn acquire_session(&self) -> Result<PgSession, SessionError> {
        let tx = self.pool.begin().await.map_err(SessionError::Begin)?;
        Ok(SessionHandle::new(tx, self.ledger.lease()))
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl Backend for EngineHandle {
    async fn ping(&self) -> Result<(), ConnectivityError> {
        let probe = sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&self.pool);
        match tokio::time::timeout(self.probe_timeout, probe).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(ConnectivityError::Timeout(self.probe_timeout)),
        }
    }

    async fn materialize_schema(&self) -> Result<(), SchemaError> {
        schema::materialize_schema(&self.pool).await
    }
}
