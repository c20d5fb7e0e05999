//! Scheduler: dispatch loop, handle, trigger queue.

pub mod engine;
pub mod handle;
pub mod queue;
pub mod types;

pub use engine::Scheduler;
pub use handle::SchedulerHandle;
pub use queue::TriggerQueue;
pub use types::{SchedulerError, SchedulerState};
