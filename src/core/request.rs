//! Session requests, identifiers, and request lifecycle states.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::core::capability::Capabilities;
use crate::core::slot_pool::WorkerId;

/// Prefix marking a desired-capability key as a scheduling attribute rather
/// than something a worker has to offer.
pub const ATTRIBUTE_PREFIX: char = '_';

/// Identifier of a session request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generate a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier of an active session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A request for a new automation session.
///
/// Built by the caller and handed to [`crate::core::Hub::submit`]; the hub
/// stamps the submission time and arrival sequence under its lock and never
/// mutates them afterwards. Both stamps are ignored on input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRequest {
    id: RequestId,
    capabilities: Capabilities,
    attributes: Capabilities,
    #[serde(skip_deserializing)]
    pub(crate) submitted_at_ms: u128,
    #[serde(skip_deserializing)]
    pub(crate) sequence: u64,
}

impl SessionRequest {
    /// Request a session on any slot offering `capabilities`.
    pub fn new(capabilities: Capabilities) -> Self {
        Self {
            id: RequestId::new(),
            capabilities,
            attributes: Capabilities::new(),
            submitted_at_ms: 0,
            sequence: 0,
        }
    }

    /// Split a raw desired-capability map: keys starting with `_` become
    /// attributes (visible to priority policies, ignored by matching).
    pub fn from_desired(desired: Capabilities) -> Self {
        let (attributes, capabilities): (Capabilities, Capabilities) = desired
            .into_iter()
            .partition(|(key, _)| key.starts_with(ATTRIBUTE_PREFIX));
        Self {
            attributes,
            ..Self::new(capabilities)
        }
    }

    /// Attach an extra attribute consumed by priority policies.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Request identifier.
    pub const fn id(&self) -> RequestId {
        self.id
    }

    /// Capabilities a slot must offer.
    pub const fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Extra attributes for priority policies.
    pub const fn attributes(&self) -> &Capabilities {
        &self.attributes
    }

    /// Look up a single attribute.
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Submission time in milliseconds since epoch; 0 until submitted.
    pub const fn submitted_at_ms(&self) -> u128 {
        self.submitted_at_ms
    }

    /// Arrival order stamped by the hub; 0 until submitted.
    pub const fn sequence(&self) -> u64 {
        self.sequence
    }
}

/// Binding of a fulfilled request to a worker slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    /// Session created for the request.
    pub session_id: SessionId,
    /// The fulfilled request.
    pub request_id: RequestId,
    /// Worker to connect to.
    pub worker_id: WorkerId,
    /// Index of the slot class on that worker.
    pub slot_class: usize,
    /// Assignment time in milliseconds since epoch.
    pub assigned_at_ms: u128,
}

/// Lifecycle of a request as observed by its submitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum RequestStatus {
    /// Waiting in the queue for a compatible free slot.
    Pending,
    /// Running on a worker slot.
    Assigned(Assignment),
    /// Ran on a worker slot; the session has since ended.
    Terminated(Assignment),
    /// Removed from the queue by an operator without being assigned.
    Discarded,
    /// Removed from the queue by the admission timeout.
    TimedOut,
}

impl RequestStatus {
    /// `true` once the status can no longer change.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminated(_) | Self::Discarded | Self::TimedOut)
    }
}
