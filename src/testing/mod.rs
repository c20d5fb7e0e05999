//! Test doubles shared by unit and integration tests.
//!
//! Exposed as a normal module so integration tests can drive the
//! scheduler with a controllable clock and observable handlers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::core::clock::Clock;
use crate::core::handler::{HandlerError, JobHandler};
use crate::core::types::JobId;

/// A clock that only moves when told to.
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Create a clock frozen at the current wall time.
    pub fn start_now() -> Self {
        Self::new(Utc::now())
    }

    /// Move the clock forward.
    pub fn advance(&self, delta: chrono::Duration) {
        let mut now = self.now.lock().expect("lock poisoned");
        *now += delta;
    }

    /// Set the clock to an absolute instant.
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.lock().expect("lock poisoned") = instant;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("lock poisoned")
    }
}

/// A handler that records every invocation it receives.
#[derive(Clone, Default)]
pub struct RecordingHandler {
    invocations: Arc<tokio::sync::Mutex<Vec<(JobId, HashMap<String, String>)>>>,
    required_keys: Vec<&'static str>,
    delay: Option<Duration>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare payload keys the handler requires.
    pub fn with_required_keys(mut self, keys: impl IntoIterator<Item = &'static str>) -> Self {
        self.required_keys = keys.into_iter().collect();
        self
    }

    /// Make every invocation take at least `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Snapshot of recorded invocations, in arrival order.
    pub async fn invocations(&self) -> Vec<(JobId, HashMap<String, String>)> {
        self.invocations.lock().await.clone()
    }

    pub async fn invocation_count(&self) -> usize {
        self.invocations.lock().await.len()
    }
}

#[async_trait]
impl JobHandler for RecordingHandler {
    async fn execute(
        &self,
        job_id: &JobId,
        payload: &HashMap<String, String>,
    ) -> Result<(), HandlerError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.invocations
            .lock()
            .await
            .push((job_id.clone(), payload.clone()));
        Ok(())
    }

    fn required_keys(&self) -> &[&str] {
        &self.required_keys
    }
}

/// A handler that always fails with a fixed message.
#[derive(Clone)]
pub struct FailingHandler {
    message: String,
}

impl FailingHandler {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl JobHandler for FailingHandler {
    async fn execute(
        &self,
        _job_id: &JobId,
        _payload: &HashMap<String, String>,
    ) -> Result<(), HandlerError> {
        Err(HandlerError::ExecutionFailed(self.message.clone()))
    }
}
