//! Misfire policy tests.
//!
//! A manual clock makes lag reproducible: schedule an entry a moment
//! ahead, then jump the clock far past the fire time so the dispatch
//! loop observes the entry well beyond the misfire threshold.

use async_trait::async_trait;
use fuze::testing::{ManualClock, RecordingHandler};
use fuze::{
    Clock, EntryFailure, EntryState, Event, EventBus, EventHandler, InMemoryStore, MisfirePolicy,
    Scheduler, SchedulerHandle, Trigger,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::common::{email_spec, wait_for_state};

/// Records misfire and failure events for assertions.
struct MisfireEvents {
    misfired: Mutex<Vec<(String, MisfirePolicy)>>,
    failed: Mutex<Vec<(String, String)>>,
}

impl MisfireEvents {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            misfired: Mutex::new(Vec::new()),
            failed: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl EventHandler for MisfireEvents {
    async fn handle(&self, event: &Event) {
        match event {
            Event::EntryMisfired { job_id, policy, .. } => {
                self.misfired
                    .lock()
                    .await
                    .push((job_id.as_str().to_string(), *policy));
            }
            Event::EntryFailed { job_id, error } => {
                self.failed
                    .lock()
                    .await
                    .push((job_id.as_str().to_string(), error.clone()));
            }
            _ => {}
        }
    }
}

/// Scheduler with a manual clock, a 60s misfire threshold, and event recording.
async fn misfire_setup(
    recorder: RecordingHandler,
) -> (ManualClock, Arc<MisfireEvents>, SchedulerHandle, JoinHandle<()>) {
    let clock = ManualClock::start_now();
    let events = MisfireEvents::new();
    let event_bus = EventBus::new();
    event_bus.register(events.clone()).await;

    let scheduler = Scheduler::new(InMemoryStore::new())
        .with_clock(Arc::new(clock.clone()))
        .with_event_bus(event_bus)
        .with_misfire_threshold(Duration::from_secs(60))
        .register_handler("email", recorder);
    let (handle, task) = scheduler.start();
    (clock, events, handle, task)
}

/// Schedule 100ms ahead of the manual clock, then jump it 10 minutes.
async fn schedule_and_miss(handle: &SchedulerHandle, clock: &ManualClock, policy: MisfirePolicy) {
    let fire_at = clock.now() + chrono::Duration::milliseconds(100);
    let trigger = Trigger::at("missed", fire_at).with_misfire_policy(policy);
    handle.schedule(email_spec("missed"), trigger).await.unwrap();
    clock.advance(chrono::Duration::minutes(10));
}

#[tokio::test]
async fn test_fire_now_policy_runs_handler_late() {
    let recorder = RecordingHandler::new();
    let (clock, events, handle, task) = misfire_setup(recorder.clone()).await;

    schedule_and_miss(&handle, &clock, MisfirePolicy::FireNowIfMissed).await;

    let entry =
        wait_for_state(&handle, "missed", EntryState::Completed, Duration::from_secs(2)).await;
    assert!(entry.failure.is_none());
    assert_eq!(recorder.invocation_count().await, 1);

    let misfired = events.misfired.lock().await.clone();
    assert_eq!(misfired.len(), 1);
    assert_eq!(misfired[0].1, MisfirePolicy::FireNowIfMissed);

    handle.shutdown().await.unwrap();
    let _ = task.await;
}

#[tokio::test]
async fn test_skip_policy_drops_entry_without_running() {
    let recorder = RecordingHandler::new();
    let (clock, events, handle, task) = misfire_setup(recorder.clone()).await;

    schedule_and_miss(&handle, &clock, MisfirePolicy::SkipIfMissed).await;

    let entry = wait_for_state(
        &handle,
        "missed",
        EntryState::MisfireSkipped,
        Duration::from_secs(2),
    )
    .await;
    assert!(entry.failure.is_none());
    assert_eq!(recorder.invocation_count().await, 0);
    assert_eq!(events.misfired.lock().await.len(), 1);
    assert!(events.failed.lock().await.is_empty());

    handle.shutdown().await.unwrap();
    let _ = task.await;
}

#[tokio::test]
async fn test_error_policy_fails_entry_without_running() {
    let recorder = RecordingHandler::new();
    let (clock, events, handle, task) = misfire_setup(recorder.clone()).await;

    schedule_and_miss(&handle, &clock, MisfirePolicy::ErrorIfMissed).await;

    let entry =
        wait_for_state(&handle, "missed", EntryState::Failed, Duration::from_secs(2)).await;
    assert!(matches!(entry.failure, Some(EntryFailure::Misfired)));
    assert_eq!(recorder.invocation_count().await, 0);

    assert_eq!(events.misfired.lock().await.len(), 1);
    let failed = events.failed.lock().await.clone();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].0, "missed");

    handle.shutdown().await.unwrap();
    let _ = task.await;
}

#[tokio::test]
async fn test_lag_within_threshold_is_not_a_misfire() {
    let recorder = RecordingHandler::new();
    let (clock, events, handle, task) = misfire_setup(recorder.clone()).await;

    // Jump only a few seconds past the fire time: under the 60s threshold.
    let fire_at = clock.now() + chrono::Duration::milliseconds(100);
    let trigger = Trigger::at("ontime", fire_at).with_misfire_policy(MisfirePolicy::SkipIfMissed);
    handle.schedule(email_spec("ontime"), trigger).await.unwrap();
    clock.advance(chrono::Duration::seconds(5));

    wait_for_state(&handle, "ontime", EntryState::Completed, Duration::from_secs(2)).await;
    assert_eq!(recorder.invocation_count().await, 1);
    assert!(events.misfired.lock().await.is_empty());

    handle.shutdown().await.unwrap();
    let _ = task.await;
}
