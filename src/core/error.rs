//! Error types for hub operations.

use thiserror::Error;

use crate::core::request::{RequestId, SessionId};
use crate::core::slot_pool::WorkerId;

/// Errors produced by hub components.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HubError {
    /// Terminate or touch of a session the registry does not hold.
    #[error("unknown session: {0}")]
    UnknownSession(SessionId),
    /// Request id was never submitted, or its outcome has been evicted.
    #[error("unknown request: {0}")]
    UnknownRequest(RequestId),
    /// A request with this id was already submitted.
    #[error("request already submitted: {0}")]
    DuplicateRequest(RequestId),
    /// Request has already left the pending queue.
    #[error("request {0} is no longer pending")]
    NotPending(RequestId),
    /// Worker id is not registered.
    #[error("unknown worker: {0}")]
    UnknownWorker(WorkerId),
    /// Worker id is already registered.
    #[error("worker already registered: {0}")]
    DuplicateWorker(WorkerId),
    /// Registration payload failed validation.
    #[error("invalid registration: {0}")]
    InvalidRegistration(String),
    /// No registered slot class could ever satisfy the requested capabilities.
    #[error("no registered worker can satisfy the requested capabilities")]
    NoCapabilityMatch,
    /// Capacity accounting would go below zero or above the limit.
    #[error("capacity accounting violated on worker {worker} slot class {slot_class}")]
    CapacityExceeded {
        /// Worker owning the slot class.
        worker: WorkerId,
        /// Index of the slot class within the worker.
        slot_class: usize,
    },
    /// Request was discarded by the admission timeout.
    #[error("request {0} timed out waiting for a free slot")]
    TimedOut(RequestId),
    /// Request was discarded by an operator (queue clear or cancel).
    #[error("request {0} was discarded")]
    Discarded(RequestId),
    /// A caller-side wait elapsed before the request left the pending state.
    #[error("wait elapsed before the request was assigned")]
    WaitElapsed,
    /// Configuration was rejected.
    #[error("config error: {0}")]
    Config(String),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
