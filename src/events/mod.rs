//! Lifecycle events and event handling.
//!
//! The scheduler emits an event at each lifecycle step of an entry,
//! enabling observability without coupling the core to any sink.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::core::trigger::MisfirePolicy;
use crate::core::types::JobId;

/// Lifecycle events emitted by the scheduler.
#[derive(Debug, Clone)]
pub enum Event {
    /// An entry was accepted and is waiting for its fire time.
    EntryScheduled {
        job_id: JobId,
        fire_at: DateTime<Utc>,
    },

    /// An entry's handler is about to be invoked.
    EntryFired {
        job_id: JobId,
        /// How far past the fire time the dispatch loop observed it.
        lag: Duration,
    },

    /// The handler ran and succeeded.
    EntryCompleted { job_id: JobId, duration: Duration },

    /// The handler failed, or the entry misfired under `ErrorIfMissed`.
    EntryFailed { job_id: JobId, error: String },

    /// The fire time was missed beyond the threshold.
    EntryMisfired {
        job_id: JobId,
        policy: MisfirePolicy,
        lag: Duration,
    },

    /// A scheduled entry was cancelled before firing.
    EntryCancelled { job_id: JobId },
}

impl Event {
    /// Get the job id the event concerns.
    pub fn job_id(&self) -> &JobId {
        match self {
            Event::EntryScheduled { job_id, .. } => job_id,
            Event::EntryFired { job_id, .. } => job_id,
            Event::EntryCompleted { job_id, .. } => job_id,
            Event::EntryFailed { job_id, .. } => job_id,
            Event::EntryMisfired { job_id, .. } => job_id,
            Event::EntryCancelled { job_id } => job_id,
        }
    }
}

/// Handler for receiving lifecycle events.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle an event.
    async fn handle(&self, event: &Event);
}

/// Event bus for distributing events to registered handlers.
pub struct EventBus {
    handlers: RwLock<Vec<Arc<dyn EventHandler>>>,
}

impl EventBus {
    /// Create a new event bus with no handlers.
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// Register an event handler.
    pub async fn register(&self, handler: Arc<dyn EventHandler>) {
        let mut handlers = self.handlers.write().await;
        handlers.push(handler);
    }

    /// Emit an event to all registered handlers.
    pub async fn emit(&self, event: Event) {
        let handlers = self.handlers.read().await;
        for handler in handlers.iter() {
            handler.handle(&event).await;
        }
    }

    /// Get the number of registered handlers.
    pub async fn handler_count(&self) -> usize {
        self.handlers.read().await.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
