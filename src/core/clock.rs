//! Time source abstraction.
//!
//! The scheduler never calls `Utc::now()` directly; it reads time through
//! the `Clock` trait so tests can inject a controllable source (see
//! `testing::ManualClock`).

use chrono::{DateTime, Utc};

/// A source of the current time.
pub trait Clock: Send + Sync {
    /// Current instant in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// The wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
