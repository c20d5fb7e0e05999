//! Cancellation tests.
//!
//! Cancelling a scheduled entry removes it entirely; once an entry has
//! left the `Scheduled` state it can no longer be cancelled.

use async_trait::async_trait;
use fuze::testing::RecordingHandler;
use fuze::{
    EntryState, Event, EventBus, EventHandler, InMemoryStore, JobStore, Scheduler, SchedulerError,
    Trigger,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::common::{email_spec, in_ms, wait_for_state};

struct CancelCounter {
    count: AtomicU32,
}

#[async_trait]
impl EventHandler for CancelCounter {
    async fn handle(&self, event: &Event) {
        if matches!(event, Event::EntryCancelled { .. }) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[tokio::test]
async fn test_cancel_scheduled_entry_removes_it() {
    let counter = Arc::new(CancelCounter {
        count: AtomicU32::new(0),
    });
    let event_bus = EventBus::new();
    event_bus.register(counter.clone()).await;

    let recorder = RecordingHandler::new();
    let store = Arc::new(InMemoryStore::new());
    let scheduler = Scheduler::with_store(Arc::clone(&store))
        .with_event_bus(event_bus)
        .register_handler("email", recorder.clone());
    let (handle, task) = scheduler.start();

    handle
        .schedule(email_spec("j1"), Trigger::at("j1", in_ms(150)))
        .await
        .unwrap();
    handle.cancel("j1").await.unwrap();

    // Gone from the store, and the fire time passes without a call.
    assert!(matches!(
        handle.get("j1").await,
        Err(SchedulerError::NotFound(_))
    ));
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(recorder.invocation_count().await, 0);
    assert_eq!(store.len().await.unwrap(), 0);
    assert_eq!(counter.count.load(Ordering::SeqCst), 1);

    handle.shutdown().await.unwrap();
    let _ = task.await;
}

#[tokio::test]
async fn test_cancel_unknown_job_not_found() {
    let scheduler =
        Scheduler::new(InMemoryStore::new()).register_handler("email", RecordingHandler::new());
    let (handle, task) = scheduler.start();

    let result = handle.cancel("ghost").await;
    assert!(matches!(result, Err(SchedulerError::NotFound(_))));

    handle.shutdown().await.unwrap();
    let _ = task.await;
}

#[tokio::test]
async fn test_cancel_completed_entry_fails() {
    let scheduler =
        Scheduler::new(InMemoryStore::new()).register_handler("email", RecordingHandler::new());
    let (handle, task) = scheduler.start();

    handle
        .schedule(email_spec("j1"), Trigger::at("j1", in_ms(40)))
        .await
        .unwrap();
    wait_for_state(&handle, "j1", EntryState::Completed, Duration::from_secs(2)).await;

    let result = handle.cancel("j1").await;
    assert!(matches!(result, Err(SchedulerError::AlreadyFired(_))));

    // The terminal entry is untouched by the failed cancel.
    let entry = handle.get("j1").await.unwrap();
    assert_eq!(entry.state, EntryState::Completed);

    handle.shutdown().await.unwrap();
    let _ = task.await;
}

#[tokio::test]
async fn test_second_cancel_reports_not_found() {
    let scheduler =
        Scheduler::new(InMemoryStore::new()).register_handler("email", RecordingHandler::new());
    let (handle, task) = scheduler.start();

    handle
        .schedule(email_spec("j1"), Trigger::at("j1", in_ms(60_000)))
        .await
        .unwrap();
    handle.cancel("j1").await.unwrap();

    let result = handle.cancel("j1").await;
    assert!(matches!(result, Err(SchedulerError::NotFound(_))));

    handle.shutdown().await.unwrap();
    let _ = task.await;
}

#[tokio::test]
async fn test_cancelled_id_can_be_rescheduled() {
    let recorder = RecordingHandler::new();
    let scheduler = Scheduler::new(InMemoryStore::new()).register_handler("email", recorder.clone());
    let (handle, task) = scheduler.start();

    handle
        .schedule(email_spec("reuse"), Trigger::at("reuse", in_ms(60_000)))
        .await
        .unwrap();
    handle.cancel("reuse").await.unwrap();

    // The id is free again after cancellation.
    handle
        .schedule(email_spec("reuse"), Trigger::at("reuse", in_ms(40)))
        .await
        .unwrap();
    wait_for_state(&handle, "reuse", EntryState::Completed, Duration::from_secs(2)).await;
    assert_eq!(recorder.invocation_count().await, 1);

    handle.shutdown().await.unwrap();
    let _ = task.await;
}
