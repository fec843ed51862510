use serde_json::json;
use vessel_core::{BusConfig, BusError, EventBus, FailurePolicy, StoreError};
use vessel_testing::counter::{self, Counter, DELAY};
use vessel_testing::{ChangeRecorder, RecordingListener};

#[tokio::test(start_paused = true)]
async fn dispatched_increase_lands_after_delay() {
    let store = counter::store();
    let recorder = ChangeRecorder::attach(&store);

    store.dispatch("increase", 0).unwrap();
    assert_eq!(store.snapshot(), Counter { count: 0 });
    assert!(recorder.changes().is_empty());

    tokio::time::sleep(DELAY + DELAY / 10).await;
    assert_eq!(store.snapshot(), Counter { count: 1 });
    assert_eq!(recorder.mutations(), vec!["setCount"]);
    assert_eq!(store.getters().unwrap().get("doubled").unwrap(), json!(2));
}

#[tokio::test]
async fn commit_then_getter_reflects_new_state() {
    let store = counter::store();
    store.commit("setCount", 5).unwrap();
    assert_eq!(store.getters().unwrap().get("doubled").unwrap(), json!(10));
}

#[tokio::test]
async fn unknown_names_leave_recorder_empty() {
    let store = counter::store();
    let recorder = ChangeRecorder::attach(&store);

    assert!(matches!(
        store.commit("reset", 0),
        Err(StoreError::UnknownMutation { .. })
    ));
    assert!(matches!(
        store.dispatch("reset", 0),
        Err(StoreError::UnknownAction { .. })
    ));
    assert!(recorder.changes().is_empty());
    assert_eq!(store.snapshot(), Counter::default());
}

#[test]
fn recording_listener_sees_ordered_and_duplicate_deliveries() {
    let bus = EventBus::<String>::new();
    let first = RecordingListener::new();
    let second = RecordingListener::new();
    first.attach(&bus, "x");
    second.attach(&bus, "x");
    first.attach(&bus, "x");

    assert_eq!(bus.emit("x", &"v".to_string()).unwrap(), 3);
    assert_eq!(first.received(), vec!["v", "v"]);
    assert_eq!(second.count(), 1);

    assert_eq!(bus.emit("never-registered", &"v".to_string()).unwrap(), 0);
}

#[test]
fn failing_listener_policies() {
    for (policy, expect_later_listener) in
        [(FailurePolicy::Abort, 0), (FailurePolicy::Isolate, 1)]
    {
        let bus = EventBus::<i32>::with_config(BusConfig {
            failure_policy: policy,
        });
        let later = RecordingListener::new();
        bus.on("x", |_| anyhow::bail!("listener blew up"));
        later.attach(&bus, "x");

        let err = bus.emit("x", &1).unwrap_err();
        match policy {
            FailurePolicy::Abort => {
                assert!(matches!(err, BusError::ListenerFailed { index: 0, .. }))
            }
            FailurePolicy::Isolate => assert!(matches!(err, BusError::ListenersFailed { .. })),
        }
        assert_eq!(later.count(), expect_later_listener);
    }
}
