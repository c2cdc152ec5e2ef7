//! QA tests for per-session exclusion.

use station_core::ai::NarrativeBackend;
use station_core::testing::{GatedBackend, TestHarness};
use station_core::{BusyPolicy, EngineConfig, EngineError};
use std::sync::Arc;
use std::time::Duration;

fn gated_harness(policy: BusyPolicy) -> (Arc<TestHarness>, Arc<GatedBackend>) {
    let gate = Arc::new(GatedBackend::new("The gate opens."));
    let harness = TestHarness::with_backends(
        EngineConfig::new().with_busy_policy(policy),
        vec![("claude", gate.clone() as Arc<dyn NarrativeBackend>)],
    );
    (Arc::new(harness), gate)
}

#[tokio::test]
async fn test_reject_policy_refuses_busy_session() {
    let (harness, gate) = gated_harness(BusyPolicy::Reject);
    let session = harness.start().await;

    let running = {
        let harness = harness.clone();
        tokio::spawn(async move { harness.engine.process_command(session, "look").await })
    };
    gate.entered().await;

    assert!(matches!(
        harness.engine.process_command(session, "east").await,
        Err(EngineError::SessionBusy(id)) if id == session
    ));
    assert!(matches!(
        harness.engine.save(session, "mid-command").await,
        Err(EngineError::SessionBusy(_))
    ));

    gate.release();
    let response = running.await.unwrap().unwrap();
    assert_eq!(response.narrative, "The gate opens.");
    assert_eq!(response.snapshot.turn_count, 2);
    assert_eq!(response.snapshot.room, "airlock");
}

#[tokio::test]
async fn test_queue_policy_serializes_commands() {
    let (harness, gate) = gated_harness(BusyPolicy::Queue);
    let session = harness.start().await;

    let first = {
        let harness = harness.clone();
        tokio::spawn(async move { harness.engine.process_command(session, "look").await })
    };
    gate.entered().await;

    let second = {
        let harness = harness.clone();
        tokio::spawn(async move { harness.engine.process_command(session, "east").await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!second.is_finished());

    gate.release();
    let first = first.await.unwrap().unwrap();
    let second = second.await.unwrap().unwrap();

    assert_eq!(first.snapshot.turn_count, 2);
    assert_eq!(first.snapshot.room, "airlock");
    assert_eq!(second.snapshot.turn_count, 4);
    assert_eq!(second.snapshot.room, "corridor");
}

#[tokio::test]
async fn test_distinct_sessions_do_not_block_each_other() {
    let (harness, gate) = gated_harness(BusyPolicy::Reject);
    let busy = harness.start().await;
    let free = harness.start().await;

    let running = {
        let harness = harness.clone();
        tokio::spawn(async move { harness.engine.process_command(busy, "look").await })
    };
    gate.entered().await;

    let moved = harness.engine.process_command(free, "east").await.unwrap();
    assert_eq!(moved.snapshot.room, "corridor");

    gate.release();
    running.await.unwrap().unwrap();
}
