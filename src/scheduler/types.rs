//! Scheduler command, error, and state types.

use thiserror::Error;
use tokio::sync::oneshot;

use crate::core::job::JobSpec;
use crate::core::trigger::Trigger;
use crate::core::types::JobId;
use crate::store::{ScheduledEntry, StoreError};

/// Errors reported by the scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Fire time is not strictly in the future.
    #[error("invalid time: {0}")]
    InvalidTime(String),

    /// A job with this id is already scheduled.
    #[error("duplicate job: {0}")]
    DuplicateJob(JobId),

    /// The spec is malformed or unroutable.
    #[error("invalid spec: {0}")]
    InvalidSpec(String),

    /// No entry with this id.
    #[error("job not found: {0}")]
    NotFound(JobId),

    /// The entry left `Scheduled` and can no longer be cancelled.
    #[error("job already fired: {0}")]
    AlreadyFired(JobId),

    /// Store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Channel error.
    #[error("channel error: {0}")]
    ChannelError(String),
}

/// State of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Scheduler is running.
    Running,
    /// Scheduler is stopped.
    Stopped,
}

/// Commands sent from `SchedulerHandle` to the dispatch loop.
pub(crate) enum SchedulerCommand {
    /// Submit a job and trigger.
    Schedule {
        spec: JobSpec,
        trigger: Trigger,
        response: oneshot::Sender<Result<JobId, SchedulerError>>,
    },
    /// Cancel a scheduled entry.
    Cancel {
        job_id: JobId,
        response: oneshot::Sender<Result<(), SchedulerError>>,
    },
    /// Snapshot an entry.
    Get {
        job_id: JobId,
        response: oneshot::Sender<Result<ScheduledEntry, SchedulerError>>,
    },
    /// Shut the scheduler down.
    Shutdown { response: oneshot::Sender<()> },
}
