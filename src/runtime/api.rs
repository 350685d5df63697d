//! Transport-facing request/response models.
//!
//! An outer HTTP or RPC layer deserializes into these types and calls the
//! functions below; the hub itself stays transport-agnostic.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::NodeConfig;
use crate::core::{
    Capabilities, Hub, HubError, HubStatus, RequestId, RequestStatus, SessionId, SessionRequest, WorkerId,
};

/// New-session call as received from a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSessionPayload {
    /// Desired capabilities; keys starting with `_` are scheduling
    /// attributes.
    pub desired_capabilities: Capabilities,
}

/// Where the client should connect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSessionResponse {
    /// The fulfilled request.
    pub request_id: RequestId,
    /// Session handle for later termination.
    pub session_id: SessionId,
    /// Worker to connect to.
    pub worker_id: WorkerId,
    /// Slot class on that worker.
    pub slot_class: usize,
}

/// Request status response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestStatusResponse {
    /// Request identifier.
    pub request_id: RequestId,
    /// Current status, `None` if unknown or evicted.
    pub status: Option<RequestStatus>,
}

/// Health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    /// Healthy flag.
    pub ok: bool,
    /// Pending requests.
    pub pending: usize,
    /// Active sessions.
    pub active: usize,
}

fn respond(request_id: RequestId, assignment: crate::core::Assignment) -> NewSessionResponse {
    NewSessionResponse {
        request_id,
        session_id: assignment.session_id,
        worker_id: assignment.worker_id,
        slot_class: assignment.slot_class,
    }
}

/// Submit a new-session call and block until it is assigned, dropped, or
/// `wait` elapses.
pub fn new_session(hub: &Hub, payload: NewSessionPayload, wait: Option<Duration>) -> Result<NewSessionResponse, HubError> {
    let request_id = hub.submit(SessionRequest::from_desired(payload.desired_capabilities))?;
    let assignment = hub.wait_for_assignment(request_id, wait)?;
    Ok(respond(request_id, assignment))
}

/// Async form of [`new_session`].
#[cfg(feature = "tokio-runtime")]
pub async fn new_session_async(
    hub: &Hub,
    payload: NewSessionPayload,
    wait: Option<Duration>,
) -> Result<NewSessionResponse, HubError> {
    let request_id = hub.submit(SessionRequest::from_desired(payload.desired_capabilities))?;
    let assignment = hub.wait_for_assignment_async(request_id, wait).await?;
    Ok(respond(request_id, assignment))
}

/// Register a node announced over the registration channel.
pub fn register_node(hub: &Hub, node: &NodeConfig) -> Result<(), HubError> {
    node.validate().map_err(HubError::InvalidRegistration)?;
    hub.register_worker(node.to_registration())
}

/// Session-ended signal from the session proxy.
pub fn end_session(hub: &Hub, session_id: SessionId) -> Result<(), HubError> {
    hub.terminate(session_id).map(|_| ())
}

/// Look up a request.
pub fn request_status(hub: &Hub, request_id: RequestId) -> RequestStatusResponse {
    RequestStatusResponse {
        request_id,
        status: hub.request_status(request_id),
    }
}

/// Console snapshot.
pub fn hub_status(hub: &Hub) -> HubStatus {
    hub.status()
}

/// Return a health payload.
pub fn health(hub: &Hub) -> Health {
    let counts = hub.counts();
    Health {
        ok: hub.check_invariants().is_ok(),
        pending: counts.pending,
        active: counts.active,
    }
}
