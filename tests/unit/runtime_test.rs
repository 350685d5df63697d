//! Tests for the runtime adapters and API surface

use std::sync::Arc;
use std::time::Duration;

use grid_hub::config::{NodeConfig, SlotClassConfig, Timeout};
use grid_hub::core::{
    capabilities, Capabilities, Hub, HubError, HubOptions, MaxConcurrency, RequestStatus,
    SessionRequest, Spawn, WorkerRegistration,
};
use grid_hub::runtime::{
    end_session, health, hub_status, new_session, new_session_async, register_node,
    request_status, NewSessionPayload, TokioSpawner,
};
use serde_json::json;

fn firefox() -> Capabilities {
    capabilities([("browserName", "firefox")])
}

fn node() -> NodeConfig {
    NodeConfig {
        id: "node-1".into(),
        slot_classes: vec![SlotClassConfig {
            capabilities: firefox(),
            max_instances: MaxConcurrency::Bounded(1),
        }],
        max_session: MaxConcurrency::Bounded(1),
        request_timeout_ms: None,
        session_timeout_ms: Timeout::Disabled,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tokio_spawner_spawn() {
    let spawner = TokioSpawner::new(tokio::runtime::Handle::current());

    let (tx, rx) = tokio::sync::oneshot::channel();
    spawner.spawn(async move {
        tx.send(123).unwrap();
    });

    let result = rx.await.expect("oneshot result");
    assert_eq!(result, 123);
}

#[test]
fn test_tokio_spawner_requires_runtime() {
    assert!(matches!(TokioSpawner::current(), Err(HubError::Config(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_maintenance_loop_times_out_requests() {
    let hub = Arc::new(Hub::new(HubOptions {
        new_session_wait_timeout: Timeout::After(Duration::from_millis(20)),
        ..HubOptions::default()
    }));
    let id = hub.submit(SessionRequest::new(firefox())).unwrap();
    hub.spawn_maintenance(&TokioSpawner::current().unwrap(), Duration::from_millis(10));

    let outcome = hub.wait_for_assignment_async(id, Some(Duration::from_secs(5))).await;
    assert_eq!(outcome, Err(HubError::TimedOut(id)));
    assert_eq!(hub.request_status(id), Some(RequestStatus::TimedOut));
}

#[test]
fn test_register_node_and_new_session() {
    let hub = Hub::default();
    register_node(&hub, &node()).unwrap();
    assert!(matches!(
        register_node(&hub, &node()),
        Err(HubError::DuplicateWorker(_))
    ));

    let mut desired = firefox();
    desired.insert("_important".into(), json!(true));
    let response = new_session(
        &hub,
        NewSessionPayload {
            desired_capabilities: desired,
        },
        Some(Duration::from_secs(1)),
    )
    .unwrap();
    assert_eq!(response.worker_id.as_str(), "node-1");
    assert_eq!(response.slot_class, 0);

    let status = request_status(&hub, response.request_id);
    assert!(matches!(status.status, Some(RequestStatus::Assigned(_))));

    let snapshot = hub_status(&hub);
    assert_eq!(snapshot.policy, "fifo");
    assert_eq!(snapshot.active, 1);
    assert_eq!(snapshot.sessions[0].session_id, response.session_id);

    end_session(&hub, response.session_id).unwrap();
    assert!(matches!(
        end_session(&hub, response.session_id),
        Err(HubError::UnknownSession(_))
    ));
    let h = health(&hub);
    assert!(h.ok);
    assert_eq!((h.pending, h.active), (0, 0));
}

#[test]
fn test_register_invalid_node() {
    let hub = Hub::default();
    let mut bad = node();
    bad.slot_classes.clear();
    assert!(matches!(
        register_node(&hub, &bad),
        Err(HubError::InvalidRegistration(_))
    ));
    assert!(hub.workers().is_empty());
}

#[test]
fn test_new_session_wait_elapses() {
    let hub = Hub::default();
    let payload = NewSessionPayload {
        desired_capabilities: firefox(),
    };
    assert_eq!(
        new_session(&hub, payload, Some(Duration::from_millis(20))),
        Err(HubError::WaitElapsed)
    );
    // the request stays queued after the caller gives up
    assert_eq!(hub.pending_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_new_session_async_waits_for_capacity() {
    let hub = Arc::new(Hub::default());
    let waiter = {
        let hub = Arc::clone(&hub);
        tokio::spawn(async move {
            let payload = NewSessionPayload {
                desired_capabilities: firefox(),
            };
            new_session_async(&hub, payload, Some(Duration::from_secs(5))).await
        })
    };
    assert!(hub.wait_until_async(Some(Duration::from_secs(5)), |c| c.pending == 1).await);

    hub.register_worker(WorkerRegistration::new("late").with_slot_class(firefox(), MaxConcurrency::Unbounded))
        .unwrap();
    let response = waiter.await.unwrap().unwrap();
    assert_eq!(response.worker_id.as_str(), "late");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_subscribe_observes_changes() {
    let hub = Hub::default();
    let mut rx = hub.subscribe();
    let before = *rx.borrow_and_update();
    hub.submit(SessionRequest::new(firefox())).unwrap();
    tokio::time::timeout(Duration::from_secs(1), rx.changed())
        .await
        .unwrap()
        .unwrap();
    assert!(*rx.borrow() > before);
}
