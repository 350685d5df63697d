//! Configuration models for the hub, its nodes, and timeouts.

pub mod hub;
pub mod timeout;

pub use hub::{HubConfig, NodeConfig, PolicyConfig, SlotClassConfig, CONFIG_ENV_VAR};
pub use timeout::Timeout;
