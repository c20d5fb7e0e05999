//! Trigger definition: when a job fires and what happens if it is missed.
//!
//! A trigger references exactly one job and carries a single absolute
//! fire time. Timezone-naive input (a local date-time plus a zone) is
//! combined into one timezone-aware instant at construction; ambiguous
//! or nonexistent local times around DST transitions are rejected.

use chrono::offset::LocalResult;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::JobId;

/// Errors that can occur when constructing a trigger.
#[derive(Debug, Error)]
pub enum TriggerError {
    /// Local time falls on a DST fold and maps to two instants.
    #[error("ambiguous local time {0} in {1}")]
    AmbiguousLocalTime(NaiveDateTime, Tz),

    /// Local time falls in a DST gap and maps to no instant.
    #[error("nonexistent local time {0} in {1}")]
    NonexistentLocalTime(NaiveDateTime, Tz),
}

/// Policy applied when a trigger's fire time has passed by more than the
/// misfire threshold before the dispatch loop observed it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MisfirePolicy {
    /// Execute immediately anyway.
    #[default]
    FireNowIfMissed,
    /// Mark the entry skipped; never invoke the handler.
    SkipIfMissed,
    /// Mark the entry failed as misfired; never invoke the handler.
    ErrorIfMissed,
}

/// The time specification attached to a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    /// The job this trigger fires.
    job_id: JobId,
    /// Absolute fire time.
    fire_at: DateTime<Utc>,
    /// What to do when the fire time was missed.
    misfire_policy: MisfirePolicy,
}

impl Trigger {
    /// Create a trigger firing at an absolute UTC instant.
    ///
    /// The misfire policy defaults to `FireNowIfMissed`.
    pub fn at(job_id: impl Into<JobId>, fire_at: DateTime<Utc>) -> Self {
        Self {
            job_id: job_id.into(),
            fire_at,
            misfire_policy: MisfirePolicy::default(),
        }
    }

    /// Create a trigger from a local date-time and a timezone.
    ///
    /// The pair is resolved into a single UTC instant here, at submission
    /// time. Local times that are ambiguous (DST fold) or nonexistent
    /// (DST gap) are rejected.
    pub fn at_local(
        job_id: impl Into<JobId>,
        local: NaiveDateTime,
        tz: Tz,
    ) -> Result<Self, TriggerError> {
        let fire_at = match tz.from_local_datetime(&local) {
            LocalResult::Single(dt) => dt.with_timezone(&Utc),
            LocalResult::Ambiguous(_, _) => {
                return Err(TriggerError::AmbiguousLocalTime(local, tz));
            }
            LocalResult::None => return Err(TriggerError::NonexistentLocalTime(local, tz)),
        };
        Ok(Self::at(job_id, fire_at))
    }

    /// Set the misfire policy.
    pub fn with_misfire_policy(mut self, policy: MisfirePolicy) -> Self {
        self.misfire_policy = policy;
        self
    }

    /// Get the referenced job id.
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Get the fire time.
    pub fn fire_at(&self) -> DateTime<Utc> {
        self.fire_at
    }

    /// Get the misfire policy.
    pub fn misfire_policy(&self) -> MisfirePolicy {
        self.misfire_policy
    }
}
