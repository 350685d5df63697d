//! Active-session bookkeeping.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::request::{Assignment, SessionId, SessionRequest};
use crate::core::slot_pool::{SlotRef, WorkerId};
use crate::core::HubError;

/// A request that has been bound to a worker slot and is running.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveSession {
    /// Session identifier handed to the submitter.
    pub id: SessionId,
    /// The fulfilled request.
    pub request: SessionRequest,
    /// Slot class the session occupies.
    pub slot: SlotRef,
    /// Assignment time in milliseconds since epoch.
    pub started_at_ms: u128,
    /// Last reported activity in milliseconds since epoch.
    pub last_activity_ms: u128,
}

impl ActiveSession {
    /// The submitter-facing view of this session.
    pub fn assignment(&self) -> Assignment {
        Assignment {
            session_id: self.id,
            request_id: self.request.id(),
            worker_id: self.slot.worker.clone(),
            slot_class: self.slot.slot_class,
            assigned_at_ms: self.started_at_ms,
        }
    }
}

/// Sessions currently holding capacity.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<SessionId, ActiveSession>,
}

impl SessionRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new session for `request` on `slot`. Capacity must already
    /// be reserved.
    pub fn activate(&mut self, request: SessionRequest, slot: SlotRef, now_ms: u128) -> Assignment {
        let session = ActiveSession {
            id: SessionId::new(),
            request,
            slot,
            started_at_ms: now_ms,
            last_activity_ms: now_ms,
        };
        let assignment = session.assignment();
        self.sessions.insert(session.id, session);
        assignment
    }

    /// Remove a session. The caller releases its capacity.
    pub fn terminate(&mut self, id: SessionId) -> Result<ActiveSession, HubError> {
        self.sessions.remove(&id).ok_or(HubError::UnknownSession(id))
    }

    /// Record activity on a session.
    pub fn touch(&mut self, id: SessionId, now_ms: u128) -> Result<(), HubError> {
        let session = self.sessions.get_mut(&id).ok_or(HubError::UnknownSession(id))?;
        session.last_activity_ms = session.last_activity_ms.max(now_ms);
        Ok(())
    }

    /// Look up a session.
    pub fn get(&self, id: SessionId) -> Option<&ActiveSession> {
        self.sessions.get(&id)
    }

    /// Number of active sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// `true` when nothing is running.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Sessions ordered by the arrival of their requests.
    pub fn list(&self) -> Vec<ActiveSession> {
        let mut sessions: Vec<ActiveSession> = self.sessions.values().cloned().collect();
        sessions.sort_by_key(|s| s.request.sequence());
        sessions
    }

    /// Ids of sessions running on `worker`.
    pub fn on_worker(&self, worker: &WorkerId) -> Vec<SessionId> {
        self.sessions
            .values()
            .filter(|s| &s.slot.worker == worker)
            .map(|s| s.id)
            .collect()
    }

    /// Sessions whose inactivity exceeds the bound returned by `timeout_for`.
    pub fn idle<F>(&self, now_ms: u128, mut timeout_for: F) -> Vec<SessionId>
    where
        F: FnMut(&WorkerId) -> crate::config::Timeout,
    {
        self.sessions
            .values()
            .filter(|s| timeout_for(&s.slot.worker).has_elapsed(s.last_activity_ms, now_ms))
            .map(|s| s.id)
            .collect()
    }
}
