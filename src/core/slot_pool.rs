//! Worker registration and per-slot-class capacity accounting.
//!
//! Capacity lives here and nowhere else: `used` counters are authoritative
//! and are never recomputed from the session registry. The pool is only
//! mutated by the hub while it holds its state lock, so a check followed by
//! a reservation cannot race with another dispatch pass.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::Timeout;
use crate::core::capability::{Capabilities, CapabilityMatcher};
use crate::core::HubError;

/// Identifier a worker registers under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(String);

impl WorkerId {
    /// Wrap a worker name.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for WorkerId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for WorkerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Concurrency limit. Serialized as an integer; negative means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum MaxConcurrency {
    /// At most this many concurrent sessions.
    Bounded(u32),
    /// No cap.
    Unbounded,
}

impl MaxConcurrency {
    /// `true` if one more session fits next to `used`.
    pub const fn has_room(self, used: u32) -> bool {
        match self {
            Self::Bounded(max) => used < max,
            Self::Unbounded => true,
        }
    }

    /// Fraction of the limit in use; unbounded limits report no load.
    pub fn load(self, used: u32) -> f64 {
        match self {
            Self::Bounded(0) | Self::Unbounded => 0.0,
            Self::Bounded(max) => f64::from(used) / f64::from(max),
        }
    }

    /// `true` if `used` is within the limit.
    pub const fn admits(self, used: u32) -> bool {
        match self {
            Self::Bounded(max) => used <= max,
            Self::Unbounded => true,
        }
    }
}

impl Default for MaxConcurrency {
    fn default() -> Self {
        Self::Unbounded
    }
}

impl From<i64> for MaxConcurrency {
    fn from(v: i64) -> Self {
        if v < 0 {
            Self::Unbounded
        } else {
            Self::Bounded(u32::try_from(v).unwrap_or(u32::MAX))
        }
    }
}

impl From<MaxConcurrency> for i64 {
    fn from(m: MaxConcurrency) -> Self {
        match m {
            MaxConcurrency::Bounded(max) => Self::from(max),
            MaxConcurrency::Unbounded => -1,
        }
    }
}

/// One kind of slot a worker offers: capabilities plus a concurrency limit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotClass {
    capabilities: Capabilities,
    max: MaxConcurrency,
    used: u32,
}

impl SlotClass {
    /// Capabilities offered by this slot class.
    pub const fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Concurrency limit of this slot class.
    pub const fn max(&self) -> MaxConcurrency {
        self.max
    }

    /// Sessions currently occupying this slot class.
    pub const fn used(&self) -> u32 {
        self.used
    }
}

/// Slot class as announced in a registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotClassSpec {
    /// Capabilities the slot offers.
    pub capabilities: Capabilities,
    /// How many sessions of this class may run at once.
    pub max_instances: MaxConcurrency,
}

/// What a worker announces when it joins the grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRegistration {
    /// Worker identity.
    pub id: WorkerId,
    /// Slot classes, in the worker's preference order.
    pub slot_classes: Vec<SlotClassSpec>,
    /// Cap on concurrent sessions across all slot classes.
    pub max_concurrent: MaxConcurrency,
    /// Admission timeout for requests this worker could serve; `None`
    /// inherits the hub default.
    pub request_timeout: Option<Timeout>,
    /// Inactivity bound for sessions running on this worker.
    pub session_timeout: Timeout,
}

impl WorkerRegistration {
    /// Start a registration with no slot classes and no limits.
    pub fn new(id: impl Into<WorkerId>) -> Self {
        Self {
            id: id.into(),
            slot_classes: Vec::new(),
            max_concurrent: MaxConcurrency::Unbounded,
            request_timeout: None,
            session_timeout: Timeout::Disabled,
        }
    }

    /// Add a slot class.
    #[must_use]
    pub fn with_slot_class(mut self, capabilities: Capabilities, max_instances: MaxConcurrency) -> Self {
        self.slot_classes.push(SlotClassSpec {
            capabilities,
            max_instances,
        });
        self
    }

    /// Set the worker-wide concurrency cap.
    #[must_use]
    pub const fn with_max_concurrent(mut self, max: MaxConcurrency) -> Self {
        self.max_concurrent = max;
        self
    }

    /// Set the admission timeout for requests this worker could serve.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Timeout) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Set the session inactivity bound.
    #[must_use]
    pub const fn with_session_timeout(mut self, timeout: Timeout) -> Self {
        self.session_timeout = timeout;
        self
    }

    /// Reject registrations that could never host a session.
    pub fn validate(&self) -> Result<(), HubError> {
        if self.id.as_str().trim().is_empty() {
            return Err(HubError::InvalidRegistration("worker id must not be empty".into()));
        }
        if self.slot_classes.is_empty() {
            return Err(HubError::InvalidRegistration(format!(
                "worker `{}` announced no slot classes",
                self.id
            )));
        }
        if self.max_concurrent == MaxConcurrency::Bounded(0) {
            return Err(HubError::InvalidRegistration(format!(
                "worker `{}` max_concurrent must be at least 1",
                self.id
            )));
        }
        if let Some(idx) = self
            .slot_classes
            .iter()
            .position(|s| s.max_instances == MaxConcurrency::Bounded(0))
        {
            return Err(HubError::InvalidRegistration(format!(
                "worker `{}` slot class {idx} max_instances must be at least 1",
                self.id
            )));
        }
        Ok(())
    }
}

/// A registered worker with live capacity counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    id: WorkerId,
    slot_classes: Vec<SlotClass>,
    max_concurrent: MaxConcurrency,
    used: u32,
    request_timeout: Option<Timeout>,
    session_timeout: Timeout,
}

impl Worker {
    fn from_registration(reg: WorkerRegistration) -> Self {
        Self {
            id: reg.id,
            slot_classes: reg
                .slot_classes
                .into_iter()
                .map(|class| SlotClass {
                    capabilities: class.capabilities,
                    max: class.max_instances,
                    used: 0,
                })
                .collect(),
            max_concurrent: reg.max_concurrent,
            used: 0,
            request_timeout: reg.request_timeout,
            session_timeout: reg.session_timeout,
        }
    }

    /// Worker identity.
    pub const fn id(&self) -> &WorkerId {
        &self.id
    }

    /// Slot classes in declaration order.
    pub fn slot_classes(&self) -> &[SlotClass] {
        &self.slot_classes
    }

    /// Worker-wide concurrency cap.
    pub const fn max_concurrent(&self) -> MaxConcurrency {
        self.max_concurrent
    }

    /// Sessions running on this worker across all slot classes.
    pub const fn used(&self) -> u32 {
        self.used
    }

    /// Admission timeout override, if the worker announced one.
    pub const fn request_timeout(&self) -> Option<Timeout> {
        self.request_timeout
    }

    /// Session inactivity bound.
    pub const fn session_timeout(&self) -> Timeout {
        self.session_timeout
    }

    /// Could any slot class of this worker ever host `requested`?
    pub fn could_serve(&self, matcher: &dyn CapabilityMatcher, requested: &Capabilities) -> bool {
        self.slot_classes
            .iter()
            .any(|slot| matcher.matches(requested, &slot.capabilities))
    }

    fn has_room(&self) -> bool {
        self.max_concurrent.has_room(self.used)
    }

    fn free_slot_for(&self, matcher: &dyn CapabilityMatcher, requested: &Capabilities) -> Option<usize> {
        if !self.has_room() {
            return None;
        }
        self.slot_classes
            .iter()
            .position(|slot| slot.max.has_room(slot.used) && matcher.matches(requested, &slot.capabilities))
    }
}

/// Location of one slot class: worker plus class index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotRef {
    /// Owning worker.
    pub worker: WorkerId,
    /// Index into the worker's slot classes.
    pub slot_class: usize,
}

/// All registered workers, in registration order.
#[derive(Debug, Default)]
pub struct SlotPool {
    workers: Vec<Worker>,
}

impl SlotPool {
    /// Empty pool.
    pub const fn new() -> Self {
        Self { workers: Vec::new() }
    }

    /// Add a worker. Ids must be unique.
    pub fn register(&mut self, registration: WorkerRegistration) -> Result<(), HubError> {
        registration.validate()?;
        if self.worker(&registration.id).is_some() {
            return Err(HubError::DuplicateWorker(registration.id));
        }
        self.workers.push(Worker::from_registration(registration));
        Ok(())
    }

    /// Remove a worker and return its final state.
    pub fn unregister(&mut self, id: &WorkerId) -> Result<Worker, HubError> {
        let idx = self
            .workers
            .iter()
            .position(|w| &w.id == id)
            .ok_or_else(|| HubError::UnknownWorker(id.clone()))?;
        Ok(self.workers.remove(idx))
    }

    /// Look up a worker.
    pub fn worker(&self, id: &WorkerId) -> Option<&Worker> {
        self.workers.iter().find(|w| &w.id == id)
    }

    /// All workers in registration order.
    pub fn workers(&self) -> &[Worker] {
        &self.workers
    }

    /// `true` if at least one slot anywhere could take another session.
    pub fn has_free_capacity(&self) -> bool {
        self.workers
            .iter()
            .any(|w| w.has_room() && w.slot_classes.iter().any(|s| s.max.has_room(s.used)))
    }

    /// Could any registered slot class ever host `requested`?
    pub fn could_ever_match(&self, matcher: &dyn CapabilityMatcher, requested: &Capabilities) -> bool {
        self.workers.iter().any(|w| w.could_serve(matcher, requested))
    }

    /// Pick a free slot class matching `requested`.
    ///
    /// The least-loaded worker wins, ties going to the earliest registered;
    /// within a worker the first matching class in declaration order.
    pub fn find_slot(&self, matcher: &dyn CapabilityMatcher, requested: &Capabilities) -> Option<SlotRef> {
        let mut best: Option<(f64, &Worker, usize)> = None;
        for worker in &self.workers {
            let Some(class) = worker.free_slot_for(matcher, requested) else {
                continue;
            };
            let load = worker.max_concurrent.load(worker.used);
            if best.is_none_or(|(best_load, _, _)| load < best_load) {
                best = Some((load, worker, class));
            }
        }
        best.map(|(_, worker, slot_class)| SlotRef {
            worker: worker.id.clone(),
            slot_class,
        })
    }

    /// Take one unit of capacity on `slot` if both the class and the worker
    /// have room.
    pub fn try_reserve(&mut self, slot: &SlotRef) -> bool {
        let Some(worker) = self.workers.iter_mut().find(|w| w.id == slot.worker) else {
            return false;
        };
        if !worker.max_concurrent.has_room(worker.used) {
            return false;
        }
        let Some(class) = worker.slot_classes.get_mut(slot.slot_class) else {
            return false;
        };
        if !class.max.has_room(class.used) {
            return false;
        }
        class.used += 1;
        worker.used += 1;
        true
    }

    /// Give back one unit of capacity on `slot`.
    ///
    /// Releasing an idle slot is an accounting bug and is reported as
    /// [`HubError::CapacityExceeded`] without touching the counters.
    pub fn release(&mut self, slot: &SlotRef) -> Result<(), HubError> {
        let worker = self
            .workers
            .iter_mut()
            .find(|w| w.id == slot.worker)
            .ok_or_else(|| HubError::UnknownWorker(slot.worker.clone()))?;
        let breach = || HubError::CapacityExceeded {
            worker: slot.worker.clone(),
            slot_class: slot.slot_class,
        };
        let class = worker.slot_classes.get_mut(slot.slot_class).ok_or_else(breach)?;
        if class.used == 0 || worker.used == 0 {
            return Err(breach());
        }
        class.used -= 1;
        worker.used -= 1;
        Ok(())
    }

    /// Verify `used <= max` for every class and worker, and that worker
    /// totals equal the sum of their classes.
    pub fn check_invariants(&self) -> Result<(), HubError> {
        for worker in &self.workers {
            let mut total = 0u32;
            for (idx, class) in worker.slot_classes.iter().enumerate() {
                if !class.max.admits(class.used) {
                    return Err(HubError::CapacityExceeded {
                        worker: worker.id.clone(),
                        slot_class: idx,
                    });
                }
                total += class.used;
            }
            if total != worker.used || !worker.max_concurrent.admits(worker.used) {
                return Err(HubError::CapacityExceeded {
                    worker: worker.id.clone(),
                    slot_class: usize::MAX,
                });
            }
        }
        Ok(())
    }
}
