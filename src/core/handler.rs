//! The job handler capability.
//!
//! A `JobHandler` performs the actual side effect of a job (for the email
//! use case, sending the mail). The scheduler depends only on this narrow
//! contract, never on the concrete transport. Handlers are registered on
//! the scheduler per job group; dispatch selects one by the spec's group.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

use super::types::JobId;

/// Errors reported by a job handler.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The side effect failed with a message.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// A transient error; the scheduler does not retry, re-submission is
    /// the caller's responsibility.
    #[error("transient error: {0}")]
    Transient(String),

    /// Generic error wrapper.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// The capability invoked at fire time.
///
/// Exactly one `execute` call is made per entry that is not skipped or
/// misfire-errored. Retries, if any, belong to the handler itself.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Perform the job's side effect.
    async fn execute(
        &self,
        job_id: &JobId,
        payload: &HashMap<String, String>,
    ) -> Result<(), HandlerError>;

    /// Payload keys this handler requires.
    ///
    /// `schedule` rejects a spec whose payload is missing any of these
    /// with `InvalidSpec`, before any state is created.
    fn required_keys(&self) -> &[&str] {
        &[]
    }
}
