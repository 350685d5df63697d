//! Builders to construct a hub from configuration.

pub mod hub_builder;

pub use hub_builder::{build_hub, build_hub_with};
