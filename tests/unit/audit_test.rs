//! Tests for audit sinks

use grid_hub::core::{build_audit_event, AuditAction, AuditSink, InMemoryAuditSink, TracingAuditSink};

#[test]
fn test_in_memory_audit_sink_bounded() {
    let mut sink = InMemoryAuditSink::new(2);
    for i in 0..3 {
        sink.record(build_audit_event(
            format!("evt-{i}"),
            format!("req-{i}"),
            None,
            AuditAction::Submit,
            None,
        ));
    }
    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].event_id, "evt-1");
    assert_eq!(events[1].event_id, "evt-2");
}

#[test]
fn test_in_memory_audit_sink_zero_capacity() {
    let mut sink = InMemoryAuditSink::new(0);
    sink.record(build_audit_event("e", "s", None, AuditAction::Policy, None));
    assert!(sink.events().is_empty());
}

#[test]
fn test_build_audit_event() {
    let event = build_audit_event(
        "evt-1",
        "session-1",
        Some("node-1".into()),
        AuditAction::Terminate,
        Some("idle timeout".into()),
    );
    assert_eq!(event.subject, "session-1");
    assert_eq!(event.worker.as_deref(), Some("node-1"));
    assert_eq!(event.action, AuditAction::Terminate);
    assert!(event.created_at_ms > 0);
}

#[test]
fn test_audit_action_serialization() {
    assert_eq!(AuditAction::Unregister.to_string(), "unregister");
    let json = serde_json::to_string(&AuditAction::Assign).unwrap();
    assert_eq!(json, "\"assign\"");
}

#[test]
fn test_tracing_sink_accepts_events() {
    let mut sink = TracingAuditSink;
    sink.record(build_audit_event("e", "s", None, AuditAction::Register, None));
}
