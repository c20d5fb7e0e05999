//! Job store abstraction for scheduled entries.
//!
//! This module provides a trait-based store with a pluggable backend
//! (in-memory by default). The store owns the lifecycle of every entry
//! and enforces the monotonic state machine: no entry returns to
//! `Scheduled` after leaving it, and terminal states never change.

mod memory;

pub use memory::InMemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::job::JobSpec;
use crate::core::trigger::Trigger;
use crate::core::types::JobId;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested entry was not found.
    #[error("not found: {0}")]
    NotFound(JobId),

    /// An entry with this job id already exists.
    #[error("duplicate job: {0}")]
    DuplicateJob(JobId),

    /// The requested state change violates the monotonic ordering.
    #[error("invalid transition: {from:?} -> {to:?}")]
    InvalidTransition { from: EntryState, to: EntryState },

    /// Store lock was poisoned.
    #[error("store lock poisoned")]
    LockPoisoned,
}

/// Lifecycle state of a scheduled entry.
///
/// Transitions are monotonic: `Scheduled -> Firing -> Completed | Failed
/// | MisfireSkipped`. Cancellation removes the entry instead of adding a
/// state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryState {
    /// Waiting for its fire time.
    Scheduled,
    /// Popped by the dispatch loop; outcome pending.
    Firing,
    /// Handler ran and succeeded.
    Completed,
    /// Handler failed, or the entry misfired under `ErrorIfMissed`.
    Failed,
    /// Misfired under `SkipIfMissed`; handler never invoked.
    MisfireSkipped,
}

impl EntryState {
    /// Whether a transition to `next` is allowed.
    pub fn can_transition_to(self, next: EntryState) -> bool {
        use EntryState::*;
        matches!(
            (self, next),
            (Scheduled, Firing) | (Firing, Completed) | (Firing, Failed) | (Firing, MisfireSkipped)
        )
    }

    /// Whether this state is terminal.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            EntryState::Completed | EntryState::Failed | EntryState::MisfireSkipped
        )
    }
}

/// Why an entry ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryFailure {
    /// Fire time missed beyond the threshold under `ErrorIfMissed`.
    Misfired,
    /// The handler reported an error.
    Handler(String),
}

impl std::fmt::Display for EntryFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryFailure::Misfired => write!(f, "misfired"),
            EntryFailure::Handler(msg) => write!(f, "handler error: {}", msg),
        }
    }
}

/// A job spec, its trigger, and the current lifecycle state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledEntry {
    /// The job definition.
    pub spec: JobSpec,
    /// The time specification.
    pub trigger: Trigger,
    /// Current lifecycle state.
    pub state: EntryState,
    /// When the entry was created.
    pub created_at: DateTime<Utc>,
    /// Failure detail once state is `Failed`.
    pub failure: Option<EntryFailure>,
}

impl ScheduledEntry {
    /// Create a new entry in `Scheduled` state.
    pub fn new(spec: JobSpec, trigger: Trigger, created_at: DateTime<Utc>) -> Self {
        Self {
            spec,
            trigger,
            state: EntryState::Scheduled,
            created_at,
            failure: None,
        }
    }

    /// Get the job id.
    pub fn job_id(&self) -> &JobId {
        self.spec.job_id()
    }

    /// Get the fire time.
    pub fn fire_at(&self) -> DateTime<Utc> {
        self.trigger.fire_at()
    }
}

/// Store trait for scheduled entries.
///
/// All operations are atomic with respect to concurrent callers.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new entry. Fails with `DuplicateJob` if the id exists.
    async fn insert(&self, entry: ScheduledEntry) -> Result<(), StoreError>;

    /// Get a snapshot of an entry.
    async fn get(&self, id: &JobId) -> Result<ScheduledEntry, StoreError>;

    /// Advance an entry's state.
    ///
    /// Fails with `NotFound` if absent and `InvalidTransition` if the
    /// change violates the monotonic ordering.
    async fn update_state(&self, id: &JobId, next: EntryState) -> Result<(), StoreError>;

    /// Transition an entry to `Failed` and record why.
    async fn record_failure(&self, id: &JobId, failure: EntryFailure) -> Result<(), StoreError>;

    /// Remove an entry. Fails with `NotFound` if absent.
    async fn remove(&self, id: &JobId) -> Result<ScheduledEntry, StoreError>;

    /// List all entries, ordered by creation time.
    async fn list(&self) -> Result<Vec<ScheduledEntry>, StoreError>;

    /// Number of entries held.
    async fn len(&self) -> Result<usize, StoreError>;
}
