//! Build a hub from configuration.

use crate::config::HubConfig;
use crate::core::{AuditSink, Hub, HubError};

/// Build a hub from configuration and register the configured nodes.
pub fn build_hub(cfg: &HubConfig) -> Result<Hub, HubError> {
    build_hub_with(cfg, |_| None)
}

/// Like [`build_hub`], with an audit sink supplied by `audit_factory`.
pub fn build_hub_with<FA>(cfg: &HubConfig, audit_factory: FA) -> Result<Hub, HubError>
where
    FA: FnOnce(&HubConfig) -> Option<Box<dyn AuditSink>>,
{
    cfg.validate()
        .map_err(|e| HubError::Config(format!("config invalid: {e}")))?;

    let mut hub = Hub::new(cfg.options()).with_policy(cfg.priority.build());
    if let Some(sink) = audit_factory(cfg) {
        hub = hub.with_audit(sink);
    }
    for node in &cfg.nodes {
        hub.register_worker(node.to_registration())?;
    }
    tracing::info!(
        nodes = cfg.nodes.len(),
        policy = %hub.policy_name(),
        "hub built from config"
    );
    Ok(hub)
}
