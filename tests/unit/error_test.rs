//! Tests for error types

use grid_hub::core::{HubError, RequestId, SessionId, WorkerId};

#[test]
fn test_error_display() {
    let session = SessionId::new();
    let err = HubError::UnknownSession(session);
    assert_eq!(err.to_string(), format!("unknown session: {session}"));

    let err = HubError::CapacityExceeded {
        worker: WorkerId::new("node-1"),
        slot_class: 2,
    };
    assert_eq!(
        err.to_string(),
        "capacity accounting violated on worker node-1 slot class 2"
    );

    assert_eq!(
        HubError::NoCapabilityMatch.to_string(),
        "no registered worker can satisfy the requested capabilities"
    );
}

#[test]
fn test_error_equality() {
    let id = RequestId::new();
    assert_eq!(HubError::Discarded(id), HubError::Discarded(id));
    assert_ne!(HubError::Discarded(id), HubError::TimedOut(id));
    assert_ne!(HubError::Discarded(id), HubError::Discarded(RequestId::new()));
}

#[test]
fn test_error_into_anyhow() {
    fn lookup() -> grid_hub::core::AppResult<()> {
        Err(HubError::UnknownWorker(WorkerId::new("gone")))?;
        Ok(())
    }
    let err = lookup().unwrap_err();
    assert_eq!(
        err.downcast_ref::<HubError>(),
        Some(&HubError::UnknownWorker(WorkerId::new("gone")))
    );
}
