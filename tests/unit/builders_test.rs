//! Tests for hub builders

use std::sync::Arc;

use grid_hub::builders::{build_hub, build_hub_with};
use grid_hub::config::{HubConfig, NodeConfig, PolicyConfig, SlotClassConfig, Timeout};
use grid_hub::core::{
    capabilities, AuditAction, AuditEvent, AuditSink, HubError, MaxConcurrency, SessionRequest,
};
use parking_lot::Mutex;

fn config() -> HubConfig {
    HubConfig {
        priority: PolicyConfig::ImportantFirst {
            flag: "_important".into(),
        },
        nodes: vec![NodeConfig {
            id: "node-1".into(),
            slot_classes: vec![SlotClassConfig {
                capabilities: capabilities([("browserName", "firefox")]),
                max_instances: MaxConcurrency::Bounded(2),
            }],
            max_session: MaxConcurrency::Bounded(2),
            request_timeout_ms: None,
            session_timeout_ms: Timeout::Disabled,
        }],
        ..HubConfig::default()
    }
}

#[test]
fn test_build_hub_registers_nodes() {
    let hub = build_hub(&config()).unwrap();
    assert_eq!(hub.policy_name(), "important_first");
    assert_eq!(hub.workers().len(), 1);
    assert_eq!(hub.workers()[0].id().as_str(), "node-1");

    hub.submit(SessionRequest::new(capabilities([("browserName", "firefox")])))
        .unwrap();
    assert_eq!(hub.active_count(), 1);
}

#[test]
fn test_build_hub_rejects_invalid_config() {
    let cfg = HubConfig {
        outcome_retention: 0,
        ..config()
    };
    assert!(matches!(build_hub(&cfg), Err(HubError::Config(_))));
}

#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<AuditEvent>>>);

impl AuditSink for Recorder {
    fn record(&mut self, event: AuditEvent) {
        self.0.lock().push(event);
    }
}

#[test]
fn test_build_hub_with_audit() {
    let recorder = Recorder::default();
    let sink = recorder.clone();
    let hub = build_hub_with(&config(), move |_| Some(Box::new(sink) as Box<dyn AuditSink>)).unwrap();
    drop(hub);

    let events = recorder.0.lock();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action, AuditAction::Register);
    assert_eq!(events[0].subject, "node-1");
}
