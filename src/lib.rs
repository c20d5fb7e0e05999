pub mod core;
pub mod events;
pub mod scheduler;
pub mod store;
pub mod testing;

pub use core::clock::{Clock, SystemClock};
pub use core::handler::{HandlerError, JobHandler};
pub use core::job::{JobSpec, JobSpecBuilder};
pub use core::trigger::{MisfirePolicy, Trigger, TriggerError};
pub use core::types::JobId;
pub use events::{Event, EventBus, EventHandler};
pub use scheduler::{Scheduler, SchedulerError, SchedulerHandle, SchedulerState};
pub use store::{EntryFailure, EntryState, InMemoryStore, JobStore, ScheduledEntry, StoreError};
