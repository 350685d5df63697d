//! Core scheduling abstractions and capacity accounting.

pub mod audit;
pub mod capability;
pub mod error;
pub mod hub;
pub mod policy;
pub mod registry;
pub mod request;
pub mod slot_pool;

pub use audit::{
    build_audit_event, AuditAction, AuditEvent, AuditSink, InMemoryAuditSink, TracingAuditSink,
};
pub use capability::{capabilities, matches, Capabilities, CapabilityMatcher, DefaultMatcher};
pub use error::{AppResult, HubError};
pub use hub::{Hub, HubCounts, HubOptions, HubStatus, Spawn};
pub use policy::{
    is_truthy, rank, Fifo, FnPolicy, ImportantFirst, NumericPriority, PriorityPolicy,
    DEFAULT_IMPORTANT_FLAG,
};
pub use registry::{ActiveSession, SessionRegistry};
pub use request::{Assignment, RequestId, RequestStatus, SessionId, SessionRequest};
pub use slot_pool::{
    MaxConcurrency, SlotClass, SlotClassSpec, SlotPool, SlotRef, Worker, WorkerId,
    WorkerRegistration,
};
