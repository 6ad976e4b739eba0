//! Per-request sessions
//!
//! A [`SessionHandle`] is one transaction plus a [`Lease`] on the engine's
//! [`SessionLedger`]. It is released exactly once, whichever way it ends:
//!
//! - [`SessionHandle::commit`] / [`SessionHandle::rollback`] consume it
//! - dropping it (early return, error, panic, cancelled request) rolls the
//!   transaction back and returns the connection to the pool
//!
//! [`scoped`] wraps a unit of work: commit on `Ok`, rollback on `Err`.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use sqlx::{PgConnection, Postgres, Transaction};
use thiserror::Error;

pub type PgTransaction = Transaction<'static, Postgres>;
pub type PgSession = SessionHandle<PgTransaction>;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to begin session: {0}")]
    Begin(#[source] sqlx::Error),

    #[error("failed to commit session: {0}")]
    Commit(#[source] sqlx::Error),

    #[error("failed to roll back session: {0}")]
    Rollback(#[source] sqlx::Error),
}

/// A transaction that can be finished explicitly.
#[async_trait]
pub trait Transactional: Send + Sized {
    async fn commit(self) -> Result<(), sqlx::Error>;
    async fn rollback(self) -> Result<(), sqlx::Error>;
}

#[async_trait]
impl Transactional for PgTransaction {
    async fn commit(self) -> Result<(), sqlx::Error> {
        Transaction::commit(self).await
    }

    async fn rollback(self) -> Result<(), sqlx::Error> {
        Transaction::rollback(self).await
    }
}

#[derive(Debug, Default)]
struct Counters {
    acquired: AtomicU64,
    released: AtomicU64,
}

/// Acquire/release counters shared by every session of one engine.
#[derive(Debug, Clone, Default)]
pub struct SessionLedger {
    counters: Arc<Counters>,
}

impl SessionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an acquisition. The returned lease records the release on drop.
    pub fn lease(&self) -> Lease {
        self.counters.acquired.fetch_add(1, Ordering::SeqCst);
        Lease {
            counters: Arc::clone(&self.counters),
        }
    }

    pub fn acquired(&self) -> u64 {
        self.counters.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> u64 {
        self.counters.released.load(Ordering::SeqCst)
    }

    /// Sessions currently checked out.
    pub fn outstanding(&self) -> u64 {
        self.acquired().saturating_sub(self.released())
    }
}

/// Proof of one acquisition. Dropping it counts the release.
#[derive(Debug)]
pub struct Lease {
    counters: Arc<Counters>,
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.counters.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// One request's unit of work.
pub struct SessionHandle<T: Transactional> {
    tx: T,
    lease: Lease,
}

impl<T: Transactional> SessionHandle<T> {
    pub fn new(tx: T, lease: Lease) -> Self {
        Self { tx, lease }
    }

    pub async fn commit(self) -> Result<(), SessionError> {
        let Self { tx, lease } = self;
        let result = tx.commit().await.map_err(SessionError::Commit);
        drop(lease);
        result
    }

    pub async fn rollback(self) -> Result<(), SessionError> {
        let Self { tx, lease } = self;
        let result = tx.rollback().await.map_err(SessionError::Rollback);
        drop(lease);
        result
    }
}

impl SessionHandle<PgTransaction> {
    /// Connection for running queries inside this session.
    pub fn conn(&mut self) -> &mut PgConnection {
        &mut self.tx
    }
}

impl<T: Transactional> Deref for SessionHandle<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.tx
    }
}

impl<T: Transactional> DerefMut for SessionHandle<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.tx
    }
}

/// Run `work` inside `session`: commit on `Ok`, roll back on `Err`.
///
/// A failed rollback is logged and the original error is returned.
pub async fn scoped<T, R, E, F>(session: SessionHandle<T>, work: F) -> Result<R, E>
where
    T: Transactional,
    E: From<SessionError>,
    F: for<'s> FnOnce(&'s mut T) -> BoxFuture<'s, Result<R, E>>,
{
    let mut session = session;
    match work(&mut session.tx).await {
        Ok(value) => {
            session.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = session.rollback().await {
                tracing::warn!(error = %rollback_err, "rollback after failed unit of work failed");
            }
            Err(err)
        }
    }
}
