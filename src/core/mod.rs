//! Core types: job specs, triggers, the handler capability, and the
//! clock abstraction.

pub mod clock;
pub mod handler;
pub mod job;
pub mod trigger;
pub mod types;

pub use clock::{Clock, SystemClock};
pub use handler::{HandlerError, JobHandler};
pub use job::{JobSpec, JobSpecBuilder};
pub use trigger::{MisfirePolicy, Trigger, TriggerError};
pub use types::JobId;
