//! Priority policies: pluggable total orders over pending requests.
//!
//! A policy only answers "does `a` go before `b`". The dispatcher ranks the
//! pending queue with a stable sort over arrival order, so requests a policy
//! treats as equal are always served first-submitted first.
//!
//! Policies must behave as a total order (reflexive, antisymmetric,
//! transitive). This is not validated; a policy that breaks the contract
//! produces an unspecified ranking.

use std::cmp::Ordering;
use std::fmt;

use serde_json::Value;

use crate::core::request::SessionRequest;

/// Attribute consulted by [`ImportantFirst`] unless configured otherwise.
pub const DEFAULT_IMPORTANT_FLAG: &str = "_important";

/// Pluggable comparator used to rank pending requests.
pub trait PriorityPolicy: Send + Sync {
    /// `Less` means `a` is served before `b`.
    fn compare(&self, a: &SessionRequest, b: &SessionRequest) -> Ordering;

    /// Short label for logs and status output.
    fn name(&self) -> &str {
        "custom"
    }
}

/// First-in-first-out by the arrival sequence the hub stamps at submission.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fifo;

impl PriorityPolicy for Fifo {
    fn compare(&self, a: &SessionRequest, b: &SessionRequest) -> Ordering {
        a.sequence().cmp(&b.sequence())
    }

    fn name(&self) -> &str {
        "fifo"
    }
}

/// Two tiers: requests whose flag attribute is truthy go first. Requests
/// within a tier compare equal.
#[derive(Debug, Clone)]
pub struct ImportantFirst {
    flag: String,
}

impl ImportantFirst {
    /// Use `flag` as the marker attribute.
    pub fn new(flag: impl Into<String>) -> Self {
        Self { flag: flag.into() }
    }

    /// The attribute this policy reads.
    pub fn flag(&self) -> &str {
        &self.flag
    }

    fn is_important(&self, request: &SessionRequest) -> bool {
        request.attribute(&self.flag).is_some_and(is_truthy)
    }
}

impl Default for ImportantFirst {
    fn default() -> Self {
        Self::new(DEFAULT_IMPORTANT_FLAG)
    }
}

impl PriorityPolicy for ImportantFirst {
    fn compare(&self, a: &SessionRequest, b: &SessionRequest) -> Ordering {
        // true sorts before false
        self.is_important(b).cmp(&self.is_important(a))
    }

    fn name(&self) -> &str {
        "important_first"
    }
}

/// Higher numeric attribute first; absent or non-numeric values count as 0.
#[derive(Debug, Clone)]
pub struct NumericPriority {
    attribute: String,
}

impl NumericPriority {
    /// Rank by the numeric value of `attribute`.
    pub fn new(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
        }
    }

    fn level(&self, request: &SessionRequest) -> f64 {
        match request.attribute(&self.attribute) {
            Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
            Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
            _ => 0.0,
        }
    }
}

impl PriorityPolicy for NumericPriority {
    fn compare(&self, a: &SessionRequest, b: &SessionRequest) -> Ordering {
        self.level(b).total_cmp(&self.level(a))
    }

    fn name(&self) -> &str {
        "numeric"
    }
}

/// Adapter turning a closure into a policy.
pub struct FnPolicy<F> {
    name: String,
    compare: F,
}

impl<F> FnPolicy<F>
where
    F: Fn(&SessionRequest, &SessionRequest) -> Ordering + Send + Sync,
{
    /// Wrap `compare` under the label `name`.
    pub fn new(name: impl Into<String>, compare: F) -> Self {
        Self {
            name: name.into(),
            compare,
        }
    }
}

impl<F> fmt::Debug for FnPolicy<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnPolicy").field("name", &self.name).finish()
    }
}

impl<F> PriorityPolicy for FnPolicy<F>
where
    F: Fn(&SessionRequest, &SessionRequest) -> Ordering + Send + Sync,
{
    fn compare(&self, a: &SessionRequest, b: &SessionRequest) -> Ordering {
        (self.compare)(a, b)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Truthiness for flag attributes: `true`, or the string `"true"` in any
/// case. Surrounding whitespace makes a string falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// Rank `pending` (held in arrival order) and return indices, best first.
///
/// Uses a stable sort so ties keep arrival order.
pub fn rank(policy: &dyn PriorityPolicy, pending: &[SessionRequest]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..pending.len()).collect();
    order.sort_by(|&a, &b| policy.compare(&pending[a], &pending[b]));
    order
}
