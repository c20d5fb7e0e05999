//! Common test utilities shared across integration tests.

use chrono::{DateTime, Utc};
use fuze::{EntryState, JobSpec, ScheduledEntry, SchedulerHandle};
use std::time::Duration;

/// A job spec with the canonical email payload.
pub fn email_spec(id: &str) -> JobSpec {
    JobSpec::builder("email")
        .job_id(id)
        .payload_entry("email", "a@b.com")
        .payload_entry("subject", "hi")
        .payload_entry("body", "there")
        .build()
}

/// An instant `ms` milliseconds from the current wall time.
pub fn in_ms(ms: i64) -> DateTime<Utc> {
    Utc::now() + chrono::Duration::milliseconds(ms)
}

/// Wait for an entry to reach an expected state, polling the scheduler.
///
/// This is more reliable than fixed sleeps since dispatch timing can vary.
/// Polls every 10ms and times out after the specified duration.
///
/// # Panics
///
/// Panics if the timeout is reached before the entry reaches the expected state.
pub async fn wait_for_state(
    handle: &SchedulerHandle,
    job_id: &str,
    expected: EntryState,
    timeout: Duration,
) -> ScheduledEntry {
    let start = tokio::time::Instant::now();
    loop {
        let entry = handle.get(job_id).await.unwrap();
        if entry.state == expected {
            return entry;
        }
        if start.elapsed() > timeout {
            panic!(
                "Timeout waiting for job {} to reach {:?}, current state: {:?}",
                job_id, expected, entry.state
            );
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
