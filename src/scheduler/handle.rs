//! Scheduler handle.
//!
//! A cloneable handle that controls a running scheduler through its
//! command channel: schedule, cancel, inspect, shut down.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, RwLock};

use crate::core::job::JobSpec;
use crate::core::trigger::Trigger;
use crate::core::types::JobId;
use crate::store::ScheduledEntry;

use super::types::{SchedulerCommand, SchedulerError, SchedulerState};

/// Buffer size for the command channel between handle and scheduler.
pub(crate) const COMMAND_CHANNEL_BUFFER: usize = 32;

/// Handle for controlling the scheduler.
#[derive(Clone)]
pub struct SchedulerHandle {
    pub(crate) command_tx: mpsc::Sender<SchedulerCommand>,
    pub(crate) state: Arc<RwLock<SchedulerState>>,
}

impl SchedulerHandle {
    /// Helper to send a command that returns a result and wait for the response.
    async fn send_result_command<T>(
        &self,
        build_command: impl FnOnce(oneshot::Sender<Result<T, SchedulerError>>) -> SchedulerCommand,
        operation: &str,
    ) -> Result<T, SchedulerError>
    where
        T: Send + 'static,
    {
        let (response_tx, response_rx) = oneshot::channel();
        self.command_tx
            .send(build_command(response_tx))
            .await
            .map_err(|_| {
                SchedulerError::ChannelError(format!("failed to send {} command", operation))
            })?;

        response_rx.await.map_err(|_| {
            SchedulerError::ChannelError(format!("failed to receive {} response", operation))
        })?
    }

    /// Submit a job and its trigger.
    ///
    /// On success the entry is visible in the store with state
    /// `Scheduled` and armed in the trigger queue before this returns.
    /// No state is created on any error path.
    pub async fn schedule(
        &self,
        spec: JobSpec,
        trigger: Trigger,
    ) -> Result<JobId, SchedulerError> {
        self.send_result_command(
            |response| SchedulerCommand::Schedule {
                spec,
                trigger,
                response,
            },
            "schedule",
        )
        .await
    }

    /// Cancel a scheduled entry.
    ///
    /// Fails with `NotFound` if absent and `AlreadyFired` once the entry
    /// left the `Scheduled` state.
    pub async fn cancel(&self, job_id: impl Into<JobId>) -> Result<(), SchedulerError> {
        let job_id = job_id.into();
        self.send_result_command(
            |response| SchedulerCommand::Cancel { job_id, response },
            "cancel",
        )
        .await
    }

    /// Get a snapshot of an entry.
    pub async fn get(&self, job_id: impl Into<JobId>) -> Result<ScheduledEntry, SchedulerError> {
        let job_id = job_id.into();
        self.send_result_command(|response| SchedulerCommand::Get { job_id, response }, "get")
            .await
    }

    /// Shut the scheduler down, waiting for in-flight handlers.
    pub async fn shutdown(&self) -> Result<(), SchedulerError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.command_tx
            .send(SchedulerCommand::Shutdown {
                response: response_tx,
            })
            .await
            .map_err(|_| SchedulerError::ChannelError("failed to send shutdown command".into()))?;

        response_rx
            .await
            .map_err(|_| SchedulerError::ChannelError("failed to receive shutdown response".into()))
    }

    /// Get the current scheduler state.
    pub async fn state(&self) -> SchedulerState {
        *self.state.read().await
    }

    /// Check if the scheduler is running.
    pub async fn is_running(&self) -> bool {
        *self.state.read().await == SchedulerState::Running
    }
}
