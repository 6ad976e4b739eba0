//! Connection lifecycle
//!
//! Drives the database access path from configuration to readiness:
//!
//! 1. [`startup_sequence`] probes connectivity up to `max_attempts` times,
//!    sleeping [`RetryPolicy::delay_for`] between attempts
//! 2. on the first success the schema is materialized and the state becomes
//!    [`ReadinessState::Ready`]; otherwise it becomes `Failed`
//! 3. a failed instance heals through [`recheck`], driven by [`run_recovery`]
//!    and by the readiness endpoint
//!
//! The process never exits because the database is unreachable. The state
//! reports it instead.

pub mod readiness;
pub mod retry;

use async_trait::async_trait;
use tokio::task::JoinHandle;

use crate::config::{resolve_config, resolve_retry_policy, ConfigSource, ConnectionConfig};
use crate::db::{create_engine, EngineHandle, PgSession, SessionError, SessionLedger};
use crate::error::{ConnectivityError, SchemaError};

pub use readiness::{IllegalTransition, Readiness, ReadinessState};
pub use retry::RetryPolicy;

/// What the lifecycle needs from a database.
#[async_trait]
pub trait Backend: Send + Sync {
    /// One trivial round-trip.
    async fn ping(&self) -> Result<(), ConnectivityError>;

    /// Create any missing tables and indexes. Must be idempotent.
    async fn materialize_schema(&self) -> Result<(), SchemaError>;
}

/// Probe the backend once. Never fails; the cause is logged.
pub async fn verify_connectivity<B: Backend + ?Sized>(backend: &B) -> bool {
    match backend.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "database connectivity check failed");
            false
        }
    }
}

/// Bounded startup: probe with backoff, then materialize the schema.
///
/// Performs at most `policy.max_attempts` probes and returns the resulting
/// state.
pub async fn startup_sequence<B: Backend + ?Sized>(
    backend: &B,
    policy: &RetryPolicy,
    readiness: &Readiness,
) -> ReadinessState {
    for attempt in 1..=policy.max_attempts {
        tracing::info!(attempt, max_attempts = policy.max_attempts, "checking database connectivity");

        if verify_connectivity(backend).await {
            tracing::info!(attempt, "database reachable");
            return materialize_and_mark(backend, readiness).await;
        }

        if attempt < policy.max_attempts {
            let delay = policy.delay_for(attempt);
            tracing::warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                "database unreachable, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    tracing::error!(
        attempts = policy.max_attempts,
        "database unreachable after all attempts, marking instance failed"
    );
    mark(readiness, ReadinessState::Failed)
}

/// Try to heal a failed instance. A no-op in any other state.
///
/// Single-flight: while one recheck runs, concurrent callers get the current
/// state back without probing or touching the schema.
pub async fn recheck<B: Backend + ?Sized>(backend: &B, readiness: &Readiness) -> ReadinessState {
    if readiness.get() != ReadinessState::Failed {
        return readiness.get();
    }

    let Some(_recovering) = readiness.try_begin_recovery() else {
        tracing::debug!("recheck already in flight");
        return readiness.get();
    };

    let state = readiness.get();
    if state != ReadinessState::Failed || !verify_connectivity(backend).await {
        return readiness.get();
    }

    tracing::info!("database reachable again");
    materialize_and_mark(backend, readiness).await
}

/// Re-check every `interval` until the instance is no longer failed.
pub async fn run_recovery<B: Backend + ?Sized>(
    backend: &B,
    readiness: &Readiness,
    interval: std::time::Duration,
) {
    while readiness.get() == ReadinessState::Failed {
        tokio::time::sleep(interval).await;
        recheck(backend, readiness).await;
    }
}

async fn materialize_and_mark<B: Backend + ?Sized>(
    backend: &B,
    readiness: &Readiness,
) -> ReadinessState {
    match backend.materialize_schema().await {
        Ok(()) => {
            tracing::info!("schema ready");
            mark(readiness, ReadinessState::Ready)
        }
        Err(e) => {
            tracing::error!(error = %e, "schema materialization failed");
            mark(readiness, ReadinessState::Failed)
        }
    }
}

fn mark(readiness: &Readiness, next: ReadinessState) -> ReadinessState {
    if let Err(e) = readiness.transition(next) {
        tracing::warn!(error = %e, "ignoring readiness change");
    }
    readiness.get()
}

/// Owns the engine and the readiness state for one process.
///
/// Handlers reach the database only through [`Lifecycle::acquire_session`].
#[derive(Clone)]
pub struct Lifecycle {
    engine: EngineHandle,
    readiness: Readiness,
    policy: RetryPolicy,
}

impl Lifecycle {
    /// Build the engine (lazily, no I/O) from a resolved configuration.
    pub fn new(config: &ConnectionConfig, policy: RetryPolicy) -> Self {
        Self {
            engine: create_engine(config),
            readiness: Readiness::new(),
            policy,
        }
    }

    /// Resolve configuration from `source` and build the lifecycle.
    pub fn from_source<S: ConfigSource + ?Sized>(source: &S) -> crate::Result<Self> {
        let config = resolve_config(source)?;
        let policy = resolve_retry_policy(source)?;
        Ok(Self::new(&config, policy))
    }

    pub fn readiness(&self) -> &Readiness {
        &self.readiness
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Acquire/release counters for every session handed out.
    pub fn sessions(&self) -> &SessionLedger {
        self.engine.ledger()
    }

    pub(crate) fn backend(&self) -> &EngineHandle {
        &self.engine
    }

    pub async fn verify_connectivity(&self) -> bool {
        verify_connectivity(&self.engine).await
    }

    /// Run the bounded startup sequence in the current task.
    pub async fn startup(&self) -> ReadinessState {
        startup_sequence(&self.engine, &self.policy, &self.readiness).await
    }

    /// Run startup in the background, then keep healing if it failed.
    pub fn spawn_startup(&self) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let state = this.startup().await;
            if state == ReadinessState::Failed && !this.policy.recheck_interval.is_zero() {
                tracing::info!(
                    interval_secs = this.policy.recheck_interval.as_secs(),
                    "starting database recovery loop"
                );
                run_recovery(&this.engine, &this.readiness, this.policy.recheck_interval).await;
            }
        })
    }

    pub async fn recheck(&self) -> ReadinessState {
        recheck(&self.engine, &self.readiness).await
    }

    /// Scoped unit of work; see [`crate::db::session`].
    pub async fn acquire_session(&self) -> Result<PgSession, SessionError> {
        self.engine.acquire_session().await
    }

    /// Close the pool. Outstanding sessions finish first.
    pub async fn shutdown(&self) {
        self.engine.close().await;
        tracing::info!(
            outstanding_sessions = self.sessions().outstanding(),
            "database engine closed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Fails the first `failures` pings, then succeeds.
    #[derive(Default)]
    struct FakeBackend {
        failures: u32,
        schema_fails: bool,
        ping_delay: Duration,
        pings: AtomicU32,
        schema_runs: AtomicU32,
    }

    impl FakeBackend {
        fn failing(failures: u32) -> Self {
            Self {
                failures,
                ..Default::default()
            }
        }

        fn pings(&self) -> u32 {
            self.pings.load(Ordering::SeqCst)
        }

        fn schema_runs(&self) -> u32 {
            self.schema_runs.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Backend for FakeBackend {
        async fn ping(&self) -> Result<(), ConnectivityError> {
            let n = self.pings.fetch_add(1, Ordering::SeqCst) + 1;
            if !self.ping_delay.is_zero() {
                tokio::time::sleep(self.ping_delay).await;
            }
            if n <= self.failures {
                Err(ConnectivityError::Timeout(Duration::from_millis(1)))
            } else {
                Ok(())
            }
        }

        async fn materialize_schema(&self) -> Result<(), SchemaError> {
            self.schema_runs.fetch_add(1, Ordering::SeqCst);
            if self.schema_fails {
                Err(SchemaError::Transaction(sqlx::Error::PoolClosed))
            } else {
                Ok(())
            }
        }
    }

    /// Route lifecycle logs to the test harness; `RUST_LOG` narrows them.
    fn init_logs() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(1),
            recheck_interval: Duration::from_secs(5),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn always_failing_makes_exactly_n_attempts() {
        init_logs();
        for n in 1..=6 {
            let backend = FakeBackend::failing(u32::MAX);
            let readiness = Readiness::new();
            let started = tokio::time::Instant::now();

            let state = startup_sequence(&backend, &policy(n), &readiness).await;

            assert_eq!(state, ReadinessState::Failed);
            assert_eq!(backend.pings(), n);
            assert_eq!(backend.schema_runs(), 0);
            let elapsed = started.elapsed();
            let expected = policy(n).total_delay();
            assert!(elapsed >= expected, "slept {:?}, expected {:?}", elapsed, expected);
            assert!(elapsed < expected + Duration::from_millis(10));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let backend = FakeBackend::failing(2);
        let readiness = Readiness::new();

        let state = startup_sequence(&backend, &policy(5), &readiness).await;

        assert_eq!(state, ReadinessState::Ready);
        assert_eq!(backend.pings(), 3);
        assert_eq!(backend.schema_runs(), 1);
        assert!(readiness.is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn schema_failure_is_not_ready() {
        let backend = FakeBackend {
            schema_fails: true,
            ..Default::default()
        };
        let readiness = Readiness::new();

        let state = startup_sequence(&backend, &policy(3), &readiness).await;

        assert_eq!(state, ReadinessState::Failed);
        assert_eq!(backend.pings(), 1);
    }

    #[tokio::test]
    async fn recheck_heals_failed_instance() {
        let backend = FakeBackend::default();
        let readiness = Readiness::new();
        readiness.transition(ReadinessState::Failed).unwrap();

        assert_eq!(recheck(&backend, &readiness).await, ReadinessState::Ready);
        assert_eq!(backend.schema_runs(), 1);
    }

    #[tokio::test]
    async fn recheck_leaves_other_states_alone() {
        let backend = FakeBackend::default();
        let readiness = Readiness::new();

        assert_eq!(recheck(&backend, &readiness).await, ReadinessState::NotReady);
        readiness.transition(ReadinessState::Ready).unwrap();
        assert_eq!(recheck(&backend, &readiness).await, ReadinessState::Ready);
        assert_eq!(backend.pings(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_rechecks_run_schema_once() {
        init_logs();
        let backend = FakeBackend {
            ping_delay: Duration::from_millis(200),
            ..Default::default()
        };
        let readiness = Readiness::new();
        readiness.transition(ReadinessState::Failed).unwrap();

        let (first, second, third) = tokio::join!(
            recheck(&backend, &readiness),
            recheck(&backend, &readiness),
            recheck(&backend, &readiness),
        );

        assert_eq!(first, ReadinessState::Ready);
        assert_eq!(second, ReadinessState::Failed);
        assert_eq!(third, ReadinessState::Failed);
        assert_eq!(backend.pings(), 1);
        assert_eq!(backend.schema_runs(), 1);

        assert_eq!(recheck(&backend, &readiness).await, ReadinessState::Ready);
        assert_eq!(backend.pings(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn recovery_loop_stops_once_ready() {
        init_logs();
        let backend = FakeBackend::failing(3);
        let readiness = Readiness::new();

        let state = startup_sequence(&backend, &policy(1), &readiness).await;
        assert_eq!(state, ReadinessState::Failed);

        run_recovery(&backend, &readiness, Duration::from_secs(5)).await;

        assert!(readiness.is_ready());
        assert_eq!(backend.pings(), 4);
    }

    #[tokio::test]
    async fn startup_on_ready_instance_keeps_ready() {
        let backend = FakeBackend::failing(u32::MAX);
        let readiness = Readiness::new();
        readiness.transition(ReadinessState::Ready).unwrap();

        let state = startup_sequence(&backend, &policy(1), &readiness).await;

        assert_eq!(state, ReadinessState::Ready);
    }
}
