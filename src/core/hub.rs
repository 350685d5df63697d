//! The hub: pending queue, dispatcher, and session bookkeeping behind one
//! lock.
//!
//! Every mutating call (submit, terminate, policy change, clear, cancel,
//! worker registration, timeout sweeps) enters the same `parking_lot::Mutex`,
//! updates the pending queue, slot pool and session registry together, runs a
//! dispatch pass, and then wakes waiters through a `Condvar` (blocking
//! callers) and a `tokio::sync::watch` channel (async callers).
//!
//! A dispatch pass ranks the whole pending queue from scratch with the
//! current [`PriorityPolicy`], walks it best-first, and binds every request
//! that finds a compatible free slot. Nothing inside the lock blocks.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Timeout;
use crate::core::audit::{build_audit_event, AuditAction, AuditSink};
use crate::core::capability::{Capabilities, CapabilityMatcher, DefaultMatcher};
use crate::core::policy::{rank, Fifo, PriorityPolicy};
use crate::core::registry::{ActiveSession, SessionRegistry};
use crate::core::request::{Assignment, RequestId, RequestStatus, SessionId, SessionRequest};
use crate::core::slot_pool::{SlotPool, SlotRef, Worker, WorkerId, WorkerRegistration};
use crate::core::HubError;
use crate::util::clock::now_ms;

/// Abstraction for spawning background work on a runtime.
pub trait Spawn {
    /// Spawn an async task that returns a future.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static;
}

/// Hub-wide admission settings.
#[derive(Debug, Clone)]
pub struct HubOptions {
    /// How long a request may wait for a slot before it is timed out.
    pub new_session_wait_timeout: Timeout,
    /// Refuse submissions that no registered slot class could ever serve.
    pub reject_unsatisfiable: bool,
    /// Finished request outcomes kept for late status queries. Duplicate
    /// submission detection does not depend on it.
    pub outcome_retention: usize,
}

impl Default for HubOptions {
    fn default() -> Self {
        Self {
            new_session_wait_timeout: Timeout::Disabled,
            reject_unsatisfiable: false,
            outcome_retention: 1024,
        }
    }
}

/// Pending and active counts, read atomically together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubCounts {
    /// Requests waiting for a slot.
    pub pending: usize,
    /// Sessions holding a slot.
    pub active: usize,
}

/// Serializable snapshot for operator consoles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubStatus {
    /// Name of the installed priority policy.
    pub policy: String,
    /// Requests waiting for a slot.
    pub pending: usize,
    /// Sessions holding a slot.
    pub active: usize,
    /// Registered workers with live counters.
    pub workers: Vec<Worker>,
    /// Active sessions in arrival order.
    pub sessions: Vec<Assignment>,
}

struct HubState {
    /// Pending requests in arrival order.
    pending: Vec<SessionRequest>,
    pool: SlotPool,
    sessions: SessionRegistry,
    policy: Arc<dyn PriorityPolicy>,
    outcomes: HashMap<RequestId, RequestStatus>,
    /// Every id ever accepted, kept past outcome eviction.
    submitted: HashSet<RequestId>,
    /// Terminal outcomes in eviction order.
    retired: VecDeque<RequestId>,
    next_sequence: u64,
    generation: u64,
}

impl HubState {
    fn counts(&self) -> HubCounts {
        HubCounts {
            pending: self.pending.len(),
            active: self.sessions.len(),
        }
    }

    fn retire(&mut self, id: RequestId, status: RequestStatus, retention: usize) {
        self.outcomes.insert(id, status);
        self.retired.push_back(id);
        while self.retired.len() > retention {
            if let Some(old) = self.retired.pop_front() {
                self.outcomes.remove(&old);
            }
        }
    }

    fn resolve(&self, id: RequestId) -> Result<Option<Assignment>, HubError> {
        match self.outcomes.get(&id) {
            None => Err(HubError::UnknownRequest(id)),
            Some(RequestStatus::Pending) => Ok(None),
            Some(RequestStatus::Assigned(a) | RequestStatus::Terminated(a)) => Ok(Some(a.clone())),
            Some(RequestStatus::Discarded) => Err(HubError::Discarded(id)),
            Some(RequestStatus::TimedOut) => Err(HubError::TimedOut(id)),
        }
    }
}

/// Priority-aware admission and dispatch scheduler for a grid of workers.
///
/// Construct one per grid and share it behind an `Arc`; independent hubs do
/// not interact.
pub struct Hub {
    options: HubOptions,
    state: Mutex<HubState>,
    /// Signaled after every state change.
    changed: Condvar,
    matcher: Arc<dyn CapabilityMatcher>,
    audit: Option<Mutex<Box<dyn AuditSink>>>,
    #[cfg(feature = "tokio-runtime")]
    events: tokio::sync::watch::Sender<u64>,
}

impl fmt::Debug for Hub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts = self.counts();
        f.debug_struct("Hub")
            .field("options", &self.options)
            .field("pending", &counts.pending)
            .field("active", &counts.active)
            .finish_non_exhaustive()
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new(HubOptions::default())
    }
}

impl Hub {
    /// Create an empty hub with FIFO ordering and exact capability matching.
    pub fn new(options: HubOptions) -> Self {
        Self {
            options,
            state: Mutex::new(HubState {
                pending: Vec::new(),
                pool: SlotPool::new(),
                sessions: SessionRegistry::new(),
                policy: Arc::new(Fifo),
                outcomes: HashMap::new(),
                submitted: HashSet::new(),
                retired: VecDeque::new(),
                next_sequence: 0,
                generation: 0,
            }),
            changed: Condvar::new(),
            matcher: Arc::new(DefaultMatcher),
            audit: None,
            #[cfg(feature = "tokio-runtime")]
            events: tokio::sync::watch::channel(0).0,
        }
    }

    /// Start with `policy` installed.
    #[must_use]
    pub fn with_policy(mut self, policy: Arc<dyn PriorityPolicy>) -> Self {
        self.state.get_mut().policy = policy;
        self
    }

    /// Replace the capability matcher.
    #[must_use]
    pub fn with_matcher(mut self, matcher: Arc<dyn CapabilityMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    /// Attach an audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Box<dyn AuditSink>) -> Self {
        self.audit = Some(Mutex::new(audit));
        self
    }

    /// Admission settings in effect.
    pub const fn options(&self) -> &HubOptions {
        &self.options
    }

    // ------------------------------------------------------------------
    // Workers
    // ------------------------------------------------------------------

    /// Add a worker and dispatch onto its slots.
    pub fn register_worker(&self, registration: WorkerRegistration) -> Result<(), HubError> {
        let mut guard = self.state.lock();
        let id = registration.id.clone();
        let classes = registration.slot_classes.len();
        guard.pool.register(registration)?;
        tracing::info!(worker = %id, slot_classes = classes, "worker registered");
        self.audit(&id, Some(&id), AuditAction::Register, Some(format!("{classes} slot classes")));
        self.dispatch(&mut guard);
        self.publish(guard);
        Ok(())
    }

    /// Remove a worker. Its sessions are terminated and returned; pending
    /// requests stay pending.
    pub fn unregister_worker(&self, id: &WorkerId) -> Result<Vec<ActiveSession>, HubError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if state.pool.worker(id).is_none() {
            return Err(HubError::UnknownWorker(id.clone()));
        }
        let ended: Vec<ActiveSession> = state
            .sessions
            .on_worker(id)
            .into_iter()
            .filter_map(|session| self.end_session(state, session, "worker removed").ok())
            .collect();
        state.pool.unregister(id)?;
        tracing::info!(worker = %id, sessions_ended = ended.len(), "worker unregistered");
        self.audit(id, Some(id), AuditAction::Unregister, None);
        self.dispatch(state);
        self.publish(guard);
        Ok(ended)
    }

    // ------------------------------------------------------------------
    // Requests and sessions
    // ------------------------------------------------------------------

    /// Queue a request and run a dispatch pass. The request may already be
    /// assigned when this returns.
    pub fn submit(&self, mut request: SessionRequest) -> Result<RequestId, HubError> {
        let mut guard = self.state.lock();
        let id = request.id();
        if guard.submitted.contains(&id) {
            return Err(HubError::DuplicateRequest(id));
        }
        if self.options.reject_unsatisfiable
            && !guard
                .pool
                .could_ever_match(self.matcher.as_ref(), request.capabilities())
        {
            tracing::warn!(request = %id, "request rejected: no worker offers the requested capabilities");
            self.audit(id, None, AuditAction::Reject, None);
            return Err(HubError::NoCapabilityMatch);
        }

        guard.next_sequence += 1;
        request.sequence = guard.next_sequence;
        request.submitted_at_ms = now_ms();
        guard.submitted.insert(id);
        guard.outcomes.insert(id, RequestStatus::Pending);
        tracing::debug!(request = %id, sequence = request.sequence, "request queued");
        self.audit(id, None, AuditAction::Submit, None);
        guard.pending.push(request);

        self.dispatch(&mut guard);
        self.publish(guard);
        Ok(id)
    }

    /// End a session, release its slot, and dispatch onto the freed
    /// capacity. A second call for the same id reports
    /// [`HubError::UnknownSession`] and changes nothing.
    pub fn terminate(&self, session_id: SessionId) -> Result<ActiveSession, HubError> {
        let mut guard = self.state.lock();
        let session = self.end_session(&mut guard, session_id, "terminated")?;
        self.dispatch(&mut guard);
        self.publish(guard);
        Ok(session)
    }

    /// Record activity on a session, resetting its idle clock.
    pub fn touch(&self, session_id: SessionId) -> Result<(), HubError> {
        self.state.lock().sessions.touch(session_id, now_ms())
    }

    /// Discard one pending request.
    pub fn cancel(&self, request_id: RequestId) -> Result<(), HubError> {
        let mut guard = self.state.lock();
        let Some(idx) = guard.pending.iter().position(|r| r.id() == request_id) else {
            return Err(if guard.outcomes.contains_key(&request_id) {
                HubError::NotPending(request_id)
            } else {
                HubError::UnknownRequest(request_id)
            });
        };
        guard.pending.remove(idx);
        let retention = self.options.outcome_retention;
        guard.retire(request_id, RequestStatus::Discarded, retention);
        tracing::info!(request = %request_id, "pending request cancelled");
        self.audit(request_id, None, AuditAction::Cancel, None);
        self.publish(guard);
        Ok(())
    }

    /// Discard every pending request. Active sessions are untouched.
    /// Returns how many requests were discarded.
    pub fn clear_pending(&self) -> usize {
        let mut guard = self.state.lock();
        let cleared = std::mem::take(&mut guard.pending);
        let retention = self.options.outcome_retention;
        for request in &cleared {
            guard.retire(request.id(), RequestStatus::Discarded, retention);
            self.audit(request.id(), None, AuditAction::Discard, None);
        }
        tracing::info!(discarded = cleared.len(), "pending queue cleared");
        self.dispatch(&mut guard);
        self.publish(guard);
        cleared.len()
    }

    /// Install a new priority policy. It applies from the next dispatch pass
    /// on (run immediately); active sessions are not affected.
    pub fn set_policy(&self, policy: Arc<dyn PriorityPolicy>) {
        let mut guard = self.state.lock();
        tracing::info!(from = guard.policy.name(), to = policy.name(), "priority policy replaced");
        self.audit(policy.name(), None, AuditAction::Policy, None);
        guard.policy = policy;
        self.dispatch(&mut guard);
        self.publish(guard);
    }

    /// Name of the installed policy.
    pub fn policy_name(&self) -> String {
        self.state.lock().policy.name().to_string()
    }

    // ------------------------------------------------------------------
    // Timeout sweeps
    // ------------------------------------------------------------------

    /// Time out pending requests that have waited past their admission
    /// bound. Returns the ids that were discarded.
    ///
    /// A request's bound comes from the workers that could serve it: if any
    /// of them disabled the timeout the request never expires, otherwise the
    /// longest announced bound applies; with no announcements the hub
    /// default is used.
    pub fn expire_pending(&self, now_ms: u128) -> Vec<RequestId> {
        let mut guard = self.state.lock();
        if guard.pending.is_empty() {
            return Vec::new();
        }
        let state = &mut *guard;
        let default = self.options.new_session_wait_timeout;
        let mut expired = Vec::new();
        for request in std::mem::take(&mut state.pending) {
            let bound = effective_timeout(&state.pool, self.matcher.as_ref(), request.capabilities(), default);
            if bound.has_elapsed(request.submitted_at_ms(), now_ms) {
                expired.push(request.id());
            } else {
                state.pending.push(request);
            }
        }
        if expired.is_empty() {
            return expired;
        }
        let retention = self.options.outcome_retention;
        for id in &expired {
            state.retire(*id, RequestStatus::TimedOut, retention);
            tracing::warn!(request = %id, "request timed out waiting for a slot");
            self.audit(id, None, AuditAction::Timeout, None);
        }
        self.dispatch(state);
        self.publish(guard);
        expired
    }

    /// Terminate sessions idle longer than their worker's session timeout.
    pub fn reap_idle(&self, now_ms: u128) -> Vec<ActiveSession> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let idle = {
            let pool = &state.pool;
            state.sessions.idle(now_ms, |worker| {
                pool.worker(worker).map_or(Timeout::Disabled, Worker::session_timeout)
            })
        };
        if idle.is_empty() {
            return Vec::new();
        }
        let reaped: Vec<ActiveSession> = idle
            .into_iter()
            .filter_map(|id| self.end_session(state, id, "idle timeout").ok())
            .collect();
        tracing::warn!(reaped = reaped.len(), "idle sessions terminated");
        self.dispatch(state);
        self.publish(guard);
        reaped
    }

    /// Run the admission-timeout sweep and idle reaping every `interval`
    /// until the hub is dropped.
    #[cfg(feature = "tokio-runtime")]
    pub fn spawn_maintenance<S: Spawn>(self: &Arc<Self>, spawner: &S, interval: Duration) {
        let hub = Arc::downgrade(self);
        spawner.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(hub) = hub.upgrade() else {
                    tracing::debug!("hub dropped, maintenance loop exiting");
                    break;
                };
                let now = now_ms();
                hub.expire_pending(now);
                hub.reap_idle(now);
            }
        });
    }

    // ------------------------------------------------------------------
    // Read-only views
    // ------------------------------------------------------------------

    /// Requests waiting for a slot.
    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Sessions holding a slot.
    pub fn active_count(&self) -> usize {
        self.state.lock().sessions.len()
    }

    /// Both counts from the same instant.
    pub fn counts(&self) -> HubCounts {
        self.state.lock().counts()
    }

    /// Active sessions in arrival order.
    pub fn active_sessions(&self) -> Vec<ActiveSession> {
        self.state.lock().sessions.list()
    }

    /// Pending requests ranked by the current policy, best first.
    pub fn pending_requests(&self) -> Vec<SessionRequest> {
        let state = self.state.lock();
        rank(state.policy.as_ref(), &state.pending)
            .into_iter()
            .map(|idx| state.pending[idx].clone())
            .collect()
    }

    /// Where a request currently is. `None` for unknown ids and for finished
    /// requests whose outcome has been evicted.
    pub fn request_status(&self, id: RequestId) -> Option<RequestStatus> {
        self.state.lock().outcomes.get(&id).cloned()
    }

    /// Registered workers with live counters.
    pub fn workers(&self) -> Vec<Worker> {
        self.state.lock().pool.workers().to_vec()
    }

    /// Snapshot for operator consoles.
    pub fn status(&self) -> HubStatus {
        let state = self.state.lock();
        HubStatus {
            policy: state.policy.name().to_string(),
            pending: state.pending.len(),
            active: state.sessions.len(),
            workers: state.pool.workers().to_vec(),
            sessions: state.sessions.list().iter().map(ActiveSession::assignment).collect(),
        }
    }

    /// Verify capacity accounting: `used <= max` everywhere, and the number
    /// of occupied slots equals the number of active sessions.
    pub fn check_invariants(&self) -> Result<(), HubError> {
        let state = self.state.lock();
        state.pool.check_invariants()?;
        let occupied: usize = state.pool.workers().iter().map(|w| w.used() as usize).sum();
        if occupied != state.sessions.len() {
            return Err(HubError::CapacityExceeded {
                worker: WorkerId::new("*"),
                slot_class: usize::MAX,
            });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Waiting
    // ------------------------------------------------------------------

    /// Block until `request_id` leaves the pending state.
    ///
    /// Returns the assignment, [`HubError::Discarded`] or
    /// [`HubError::TimedOut`] if the request was dropped, or
    /// [`HubError::WaitElapsed`] when `timeout` passes first. `None` waits
    /// forever.
    pub fn wait_for_assignment(&self, request_id: RequestId, timeout: Option<Duration>) -> Result<Assignment, HubError> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.state.lock();
        loop {
            if let Some(assignment) = state.resolve(request_id)? {
                return Ok(assignment);
            }
            match deadline {
                Some(deadline) => {
                    if self.changed.wait_until(&mut state, deadline).timed_out() {
                        return state.resolve(request_id)?.ok_or(HubError::WaitElapsed);
                    }
                }
                None => self.changed.wait(&mut state),
            }
        }
    }

    /// Block until `predicate` holds for the pending/active counts. Returns
    /// `false` if `timeout` passes first.
    pub fn wait_until<F>(&self, timeout: Option<Duration>, mut predicate: F) -> bool
    where
        F: FnMut(HubCounts) -> bool,
    {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.state.lock();
        loop {
            if predicate(state.counts()) {
                return true;
            }
            match deadline {
                Some(deadline) => {
                    if self.changed.wait_until(&mut state, deadline).timed_out() {
                        return predicate(state.counts());
                    }
                }
                None => self.changed.wait(&mut state),
            }
        }
    }

    /// Receiver that observes a new value after every state change.
    #[cfg(feature = "tokio-runtime")]
    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<u64> {
        self.events.subscribe()
    }

    /// Async form of [`Hub::wait_for_assignment`].
    #[cfg(feature = "tokio-runtime")]
    pub async fn wait_for_assignment_async(
        &self,
        request_id: RequestId,
        timeout: Option<Duration>,
    ) -> Result<Assignment, HubError> {
        let mut rx = self.events.subscribe();
        let wait = async {
            loop {
                rx.borrow_and_update();
                let resolved = self.state.lock().resolve(request_id);
                match resolved {
                    Ok(Some(assignment)) => return Ok(assignment),
                    Err(err) => return Err(err),
                    Ok(None) => {}
                }
                if rx.changed().await.is_err() {
                    return Err(HubError::WaitElapsed);
                }
            }
        };
        match timeout {
            Some(t) => tokio::time::timeout(t, wait)
                .await
                .unwrap_or(Err(HubError::WaitElapsed)),
            None => wait.await,
        }
    }

    /// Async form of [`Hub::wait_until`].
    #[cfg(feature = "tokio-runtime")]
    pub async fn wait_until_async<F>(&self, timeout: Option<Duration>, mut predicate: F) -> bool
    where
        F: FnMut(HubCounts) -> bool,
    {
        let mut rx = self.events.subscribe();
        let wait = async {
            loop {
                rx.borrow_and_update();
                let counts = self.counts();
                if predicate(counts) {
                    return true;
                }
                if rx.changed().await.is_err() {
                    return false;
                }
            }
        };
        match timeout {
            Some(t) => tokio::time::timeout(t, wait).await.unwrap_or(false),
            None => wait.await,
        }
    }

    // ------------------------------------------------------------------
    // Internals (caller holds the state lock)
    // ------------------------------------------------------------------

    /// One dispatch pass. Returns the number of requests assigned.
    fn dispatch(&self, state: &mut HubState) -> usize {
        if state.pending.is_empty() || !state.pool.has_free_capacity() {
            return 0;
        }

        let order = rank(state.policy.as_ref(), &state.pending);
        let mut picks: Vec<Option<(usize, SlotRef)>> = vec![None; state.pending.len()];
        let mut assigned = 0usize;
        for (position, idx) in order.into_iter().enumerate() {
            if !state.pool.has_free_capacity() {
                break;
            }
            let Some(slot) = state
                .pool
                .find_slot(self.matcher.as_ref(), state.pending[idx].capabilities())
            else {
                continue;
            };
            if !state.pool.try_reserve(&slot) {
                invariant_breach(&HubError::CapacityExceeded {
                    worker: slot.worker,
                    slot_class: slot.slot_class,
                });
                continue;
            }
            picks[idx] = Some((position, slot));
            assigned += 1;
        }
        if assigned == 0 {
            return 0;
        }

        let now = now_ms();
        let mut matched = Vec::with_capacity(assigned);
        for (request, pick) in std::mem::take(&mut state.pending).into_iter().zip(picks) {
            match pick {
                Some((position, slot)) => matched.push((position, request, slot)),
                None => state.pending.push(request),
            }
        }
        matched.sort_by_key(|(position, _, _)| *position);

        for (_, request, slot) in matched {
            let request_id = request.id();
            let assignment = state.sessions.activate(request, slot, now);
            tracing::info!(
                request = %request_id,
                session = %assignment.session_id,
                worker = %assignment.worker_id,
                slot_class = assignment.slot_class,
                "request assigned"
            );
            self.audit(
                request_id,
                Some(&assignment.worker_id),
                AuditAction::Assign,
                Some(assignment.session_id.to_string()),
            );
            state.outcomes.insert(request_id, RequestStatus::Assigned(assignment));
        }
        tracing::debug!(
            assigned,
            pending = state.pending.len(),
            active = state.sessions.len(),
            policy = state.policy.name(),
            "dispatch pass complete"
        );
        assigned
    }

    fn end_session(&self, state: &mut HubState, session_id: SessionId, reason: &str) -> Result<ActiveSession, HubError> {
        let session = state.sessions.terminate(session_id)?;
        if let Err(err) = state.pool.release(&session.slot) {
            invariant_breach(&err);
        }
        tracing::info!(
            session = %session_id,
            request = %session.request.id(),
            worker = %session.slot.worker,
            reason,
            "session ended"
        );
        self.audit(
            session_id,
            Some(&session.slot.worker),
            AuditAction::Terminate,
            Some(reason.to_string()),
        );
        let retention = self.options.outcome_retention;
        state.retire(
            session.request.id(),
            RequestStatus::Terminated(session.assignment()),
            retention,
        );
        Ok(session)
    }

    /// Release the lock and wake every waiter.
    fn publish(&self, mut state: MutexGuard<'_, HubState>) {
        state.generation = state.generation.wrapping_add(1);
        let generation = state.generation;
        drop(state);
        self.changed.notify_all();
        #[cfg(feature = "tokio-runtime")]
        self.events.send_replace(generation);
        #[cfg(not(feature = "tokio-runtime"))]
        let _ = generation;
    }

    fn audit(&self, subject: impl fmt::Display, worker: Option<&WorkerId>, action: AuditAction, detail: Option<String>) {
        if let Some(sink) = &self.audit {
            let subject = subject.to_string();
            let event_id = format!("{action}-{}", Uuid::new_v4());
            sink.lock().record(build_audit_event(
                event_id,
                subject,
                worker.map(ToString::to_string),
                action,
                detail,
            ));
        }
    }
}

/// Admission bound for a request given the workers that could serve it.
fn effective_timeout(
    pool: &SlotPool,
    matcher: &dyn CapabilityMatcher,
    requested: &Capabilities,
    default: Timeout,
) -> Timeout {
    let mut bound: Option<Duration> = None;
    for worker in pool.workers().iter().filter(|w| w.could_serve(matcher, requested)) {
        match worker.request_timeout() {
            Some(Timeout::Disabled) => return Timeout::Disabled,
            Some(Timeout::After(d)) => bound = Some(bound.map_or(d, |b| b.max(d))),
            None => {}
        }
    }
    bound.map_or(default, Timeout::After)
}

/// Capacity accounting went wrong: this is a locking bug, never a runtime
/// condition. Loud in debug builds, logged in release.
fn invariant_breach(err: &HubError) {
    tracing::error!(error = %err, "capacity invariant breached");
    if cfg!(debug_assertions) {
        panic!("capacity invariant breached: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::capability::capabilities;
    use crate::core::slot_pool::MaxConcurrency;

    fn firefox() -> Capabilities {
        capabilities([("browserName", "firefox")])
    }

    fn single_slot_hub() -> Hub {
        let hub = Hub::default();
        hub.register_worker(
            WorkerRegistration::new("node-1")
                .with_slot_class(firefox(), MaxConcurrency::Bounded(1))
                .with_max_concurrent(MaxConcurrency::Bounded(1)),
        )
        .unwrap();
        hub
    }

    #[test]
    fn test_submit_assigns_immediately_when_free() {
        let hub = single_slot_hub();
        let id = hub.submit(SessionRequest::new(firefox())).unwrap();
        assert!(matches!(hub.request_status(id), Some(RequestStatus::Assigned(_))));
        assert_eq!(hub.counts(), HubCounts { pending: 0, active: 1 });
    }

    #[test]
    fn test_terminate_dispatches_next() {
        let hub = single_slot_hub();
        let first = hub.submit(SessionRequest::new(firefox())).unwrap();
        let second = hub.submit(SessionRequest::new(firefox())).unwrap();
        assert_eq!(hub.pending_count(), 1);

        let session = hub.wait_for_assignment(first, None).unwrap().session_id;
        hub.terminate(session).unwrap();
        assert!(matches!(hub.request_status(first), Some(RequestStatus::Terminated(_))));
        assert!(matches!(hub.request_status(second), Some(RequestStatus::Assigned(_))));
        hub.check_invariants().unwrap();
    }

    #[test]
    fn test_duplicate_submission_rejected() {
        let hub = single_slot_hub();
        let request = SessionRequest::new(firefox());
        hub.submit(request.clone()).unwrap();
        assert_eq!(
            hub.submit(request.clone()).unwrap_err(),
            HubError::DuplicateRequest(request.id())
        );
    }

    #[test]
    fn test_duplicate_rejected_after_outcome_eviction() {
        let hub = Hub::new(HubOptions {
            outcome_retention: 1,
            ..HubOptions::default()
        });
        let first = SessionRequest::new(firefox());
        let a = hub.submit(first.clone()).unwrap();
        hub.cancel(a).unwrap();
        let b = hub.submit(SessionRequest::new(firefox())).unwrap();
        hub.cancel(b).unwrap();
        assert_eq!(hub.request_status(a), None);

        assert_eq!(hub.submit(first).unwrap_err(), HubError::DuplicateRequest(a));
        assert_eq!(hub.pending_count(), 0);
    }

    #[test]
    fn test_submit_stamps_time_and_sequence() {
        let hub = Hub::default();
        let request = SessionRequest::new(firefox());
        assert_eq!(request.submitted_at_ms(), 0);
        let before = now_ms();
        hub.submit(request).unwrap();
        hub.submit(SessionRequest::new(firefox())).unwrap();
        let pending = hub.pending_requests();
        assert!(pending[0].submitted_at_ms() >= before);
        assert_eq!(pending[0].sequence(), 1);
        assert_eq!(pending[1].sequence(), 2);
    }

    #[test]
    fn test_outcome_retention_evicts_oldest() {
        let hub = Hub::new(HubOptions {
            outcome_retention: 1,
            ..HubOptions::default()
        });
        let a = hub.submit(SessionRequest::new(firefox())).unwrap();
        let b = hub.submit(SessionRequest::new(firefox())).unwrap();
        hub.cancel(a).unwrap();
        hub.cancel(b).unwrap();
        assert_eq!(hub.request_status(a), None);
        assert_eq!(hub.request_status(b), Some(RequestStatus::Discarded));
    }

    #[test]
    fn test_effective_timeout_prefers_disabled() {
        let mut pool = SlotPool::new();
        pool.register(
            WorkerRegistration::new("a")
                .with_slot_class(firefox(), MaxConcurrency::Bounded(1))
                .with_request_timeout(Timeout::After(Duration::from_secs(5))),
        )
        .unwrap();
        let default = Timeout::After(Duration::from_secs(1));
        assert_eq!(
            effective_timeout(&pool, &DefaultMatcher, &firefox(), default),
            Timeout::After(Duration::from_secs(5))
        );
        pool.register(
            WorkerRegistration::new("b")
                .with_slot_class(firefox(), MaxConcurrency::Bounded(1))
                .with_request_timeout(Timeout::Disabled),
        )
        .unwrap();
        assert_eq!(
            effective_timeout(&pool, &DefaultMatcher, &firefox(), default),
            Timeout::Disabled
        );
        let chrome = capabilities([("browserName", "chrome")]);
        assert_eq!(effective_timeout(&pool, &DefaultMatcher, &chrome, default), default);
    }
}
