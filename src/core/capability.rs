//! Capability sets and request-to-slot matching.

use std::collections::BTreeMap;

use serde_json::Value;

/// Mapping of capability name to required (request side) or offered (slot
/// side) value.
pub type Capabilities = BTreeMap<String, Value>;

/// Decides whether a slot's advertised capabilities satisfy a request.
///
/// Implementations must be pure: the dispatcher calls them while holding the
/// hub lock and may call them many times per pass.
pub trait CapabilityMatcher: Send + Sync {
    /// Returns `true` when `offered` satisfies every entry of `requested`.
    fn matches(&self, requested: &Capabilities, offered: &Capabilities) -> bool;
}

/// Exact key/value matcher used by default.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultMatcher;

impl CapabilityMatcher for DefaultMatcher {
    fn matches(&self, requested: &Capabilities, offered: &Capabilities) -> bool {
        matches(requested, offered)
    }
}

/// Every requested key must be offered with an equal value. Extra offered
/// keys are ignored and an empty request matches any slot.
pub fn matches(requested: &Capabilities, offered: &Capabilities) -> bool {
    requested
        .iter()
        .all(|(key, value)| offered.get(key) == Some(value))
}

/// Build a capability set from `(name, value)` pairs.
///
/// ```
/// use grid_hub::core::capability::capabilities;
///
/// let ff = capabilities([("browserName", "firefox"), ("platform", "LINUX")]);
/// assert_eq!(ff.len(), 2);
/// ```
pub fn capabilities<I, K, V>(pairs: I) -> Capabilities
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
