//! Dispatch ordering tests.
//!
//! Entries fire in fire-time order; equal fire times dispatch in
//! submission order. The pool is pinned to a single worker so the
//! invocation log reflects dispatch order exactly.

use fuze::testing::RecordingHandler;
use fuze::{EntryState, InMemoryStore, JobSpec, Scheduler, Trigger};
use std::time::Duration;

use crate::common::{email_spec, in_ms, wait_for_state};

#[tokio::test]
async fn test_entries_fire_in_time_order() {
    let recorder = RecordingHandler::new();
    let scheduler = Scheduler::new(InMemoryStore::new())
        .with_max_in_flight(1)
        .register_handler("email", recorder.clone());
    let (handle, task) = scheduler.start();

    // Submitted out of order on purpose.
    handle
        .schedule(email_spec("t3"), Trigger::at("t3", in_ms(180)))
        .await
        .unwrap();
    handle
        .schedule(email_spec("t1"), Trigger::at("t1", in_ms(60)))
        .await
        .unwrap();
    handle
        .schedule(email_spec("t2"), Trigger::at("t2", in_ms(120)))
        .await
        .unwrap();

    wait_for_state(&handle, "t3", EntryState::Completed, Duration::from_secs(2)).await;

    let order: Vec<String> = recorder
        .invocations()
        .await
        .iter()
        .map(|(id, _)| id.as_str().to_string())
        .collect();
    assert_eq!(order, ["t1", "t2", "t3"]);

    handle.shutdown().await.unwrap();
    let _ = task.await;
}

#[tokio::test]
async fn test_equal_fire_times_dispatch_in_submission_order() {
    let recorder = RecordingHandler::new();
    let scheduler = Scheduler::new(InMemoryStore::new())
        .with_max_in_flight(1)
        .register_handler("email", recorder.clone());
    let (handle, task) = scheduler.start();

    let fire_at = in_ms(80);
    for id in ["first", "second", "third"] {
        handle
            .schedule(email_spec(id), Trigger::at(id, fire_at))
            .await
            .unwrap();
    }

    wait_for_state(&handle, "third", EntryState::Completed, Duration::from_secs(2)).await;

    let order: Vec<String> = recorder
        .invocations()
        .await
        .iter()
        .map(|(id, _)| id.as_str().to_string())
        .collect();
    assert_eq!(order, ["first", "second", "third"]);

    handle.shutdown().await.unwrap();
    let _ = task.await;
}

#[tokio::test]
async fn test_entries_route_to_their_group_handler() {
    let mail_recorder = RecordingHandler::new();
    let report_recorder = RecordingHandler::new();
    let scheduler = Scheduler::new(InMemoryStore::new())
        .register_handler("email", mail_recorder.clone())
        .register_handler("reports", report_recorder.clone());
    let (handle, task) = scheduler.start();

    handle
        .schedule(email_spec("mail"), Trigger::at("mail", in_ms(40)))
        .await
        .unwrap();

    let report = JobSpec::builder("reports")
        .job_id("weekly")
        .payload_entry("period", "2026-W35")
        .build();
    handle
        .schedule(report, Trigger::at("weekly", in_ms(40)))
        .await
        .unwrap();

    wait_for_state(&handle, "mail", EntryState::Completed, Duration::from_secs(2)).await;
    wait_for_state(&handle, "weekly", EntryState::Completed, Duration::from_secs(2)).await;

    assert_eq!(mail_recorder.invocation_count().await, 1);
    assert_eq!(report_recorder.invocation_count().await, 1);
    let report_invocations = report_recorder.invocations().await;
    assert_eq!(report_invocations[0].0.as_str(), "weekly");
    assert_eq!(report_invocations[0].1.get("period").unwrap(), "2026-W35");

    handle.shutdown().await.unwrap();
    let _ = task.await;
}

#[tokio::test]
async fn test_each_entry_fires_exactly_once() {
    let recorder = RecordingHandler::new();
    let scheduler = Scheduler::new(InMemoryStore::new()).register_handler("email", recorder.clone());
    let (handle, task) = scheduler.start();

    for id in ["a", "b", "c", "d"] {
        handle
            .schedule(email_spec(id), Trigger::at(id, in_ms(50)))
            .await
            .unwrap();
    }

    for id in ["a", "b", "c", "d"] {
        wait_for_state(&handle, id, EntryState::Completed, Duration::from_secs(2)).await;
    }
    // Give any stray re-dispatch a chance to show up.
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(recorder.invocation_count().await, 4);

    handle.shutdown().await.unwrap();
    let _ = task.await;
}
