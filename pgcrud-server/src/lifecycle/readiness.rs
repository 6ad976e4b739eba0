//! Readiness state machine
//!
//! Legal transitions: `NotReady -> Ready`, `NotReady -> Failed`,
//! `Failed -> Ready`. Staying in the same state is a no-op. Everything else
//! is rejected and leaves the state unchanged.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessState {
    #[default]
    NotReady,
    Ready,
    Failed,
}

impl ReadinessState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotReady => "not_ready",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: Self) -> bool {
        use ReadinessState::*;

        self == next || matches!((self, next), (NotReady, Ready) | (NotReady, Failed) | (Failed, Ready))
    }
}

impl fmt::Display for ReadinessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal readiness transition {from} -> {to}")]
pub struct IllegalTransition {
    pub from: ReadinessState,
    pub to: ReadinessState,
}

/// Shared, process-wide readiness.
///
/// Cloning shares the same state. The state lock is never held across
/// `.await`; the recovery guard is, and at most one holder exists.
#[derive(Debug, Clone, Default)]
pub struct Readiness {
    state: Arc<RwLock<ReadinessState>>,
    recovery: Arc<Mutex<()>>,
}

impl Readiness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> ReadinessState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_ready(&self) -> bool {
        self.get() == ReadinessState::Ready
    }

    /// Move to `next`, returning the previous state.
    pub fn transition(&self, next: ReadinessState) -> Result<ReadinessState, IllegalTransition> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let from = *state;
        if !from.can_transition_to(next) {
            return Err(IllegalTransition { from, to: next });
        }
        if from != next {
            tracing::info!(from = %from, to = %next, "readiness changed");
        }
        *state = next;
        Ok(from)
    }

    /// Claim the single recovery slot. `None` while another recovery runs.
    pub fn try_begin_recovery(&self) -> Option<MutexGuard<'_, ()>> {
        self.recovery.try_lock().ok()
    }
}
