//! Tests for configuration validation

use std::time::Duration;

use grid_hub::config::{HubConfig, NodeConfig, PolicyConfig, SlotClassConfig, Timeout};
use grid_hub::core::{capabilities, MaxConcurrency};
use serde_json::json;

fn firefox_node(id: &str) -> NodeConfig {
    NodeConfig {
        id: id.to_string(),
        slot_classes: vec![SlotClassConfig {
            capabilities: capabilities([("browserName", "firefox")]),
            max_instances: MaxConcurrency::Bounded(1),
        }],
        max_session: MaxConcurrency::Bounded(1),
        request_timeout_ms: None,
        session_timeout_ms: Timeout::Disabled,
    }
}

#[test]
fn test_hub_config_validation() {
    let cfg = HubConfig {
        nodes: vec![firefox_node("node-1")],
        ..HubConfig::default()
    };
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_hub_config_invalid_retention() {
    let cfg = HubConfig {
        outcome_retention: 0,
        ..HubConfig::default()
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn test_hub_config_invalid_interval() {
    let cfg = HubConfig {
        maintenance_interval_ms: 0,
        ..HubConfig::default()
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn test_hub_config_duplicate_node() {
    let cfg = HubConfig {
        nodes: vec![firefox_node("node-1"), firefox_node("node-1")],
        ..HubConfig::default()
    };
    let err = cfg.validate().unwrap_err();
    assert!(err.contains("declared twice"));
}

#[test]
fn test_node_without_slot_classes_is_invalid() {
    let mut node = firefox_node("node-1");
    node.slot_classes.clear();
    assert!(node.validate().is_err());
}

#[test]
fn test_timeout_sentinel_in_json() {
    let raw = json!({
        "new_session_wait_timeout_ms": 30000,
        "priority": { "kind": "important_first" },
        "nodes": [{
            "id": "node-1",
            "slot_classes": [{
                "capabilities": { "browserName": "firefox" },
                "max_instances": -1
            }],
            "max_session": 5,
            "request_timeout_ms": -1,
            "session_timeout_ms": -1
        }]
    });
    let cfg = HubConfig::from_json_str(&raw.to_string()).unwrap();
    assert_eq!(
        cfg.new_session_wait_timeout_ms,
        Timeout::After(Duration::from_secs(30))
    );
    assert_eq!(
        cfg.priority,
        PolicyConfig::ImportantFirst {
            flag: "_important".into()
        }
    );
    let node = &cfg.nodes[0];
    assert_eq!(node.slot_classes[0].max_instances, MaxConcurrency::Unbounded);
    assert_eq!(node.request_timeout_ms, Some(Timeout::Disabled));
    assert!(node.session_timeout_ms.is_disabled());

    let reg = node.to_registration();
    assert_eq!(reg.request_timeout, Some(Timeout::Disabled));
    assert_eq!(reg.max_concurrent, MaxConcurrency::Bounded(5));
}

#[test]
fn test_parse_error_is_reported() {
    let err = HubConfig::from_json_str("{ not json").unwrap_err();
    assert!(err.starts_with("parse error"));
}

#[test]
fn test_from_file_missing() {
    let err = HubConfig::from_file("/definitely/not/here.json").unwrap_err();
    assert!(format!("{err:#}").contains("reading hub config"));
}

#[test]
fn test_from_file_roundtrip() {
    let path = std::env::temp_dir().join(format!("grid-hub-{}.json", std::process::id()));
    let cfg = HubConfig {
        priority: PolicyConfig::Numeric {
            attribute: "_priority".into(),
        },
        nodes: vec![firefox_node("node-1")],
        ..HubConfig::default()
    };
    std::fs::write(&path, serde_json::to_string(&cfg).unwrap()).unwrap();
    let loaded = HubConfig::from_file(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(loaded.priority, cfg.priority);
    assert_eq!(loaded.nodes.len(), 1);
}

#[test]
fn test_policy_config_builds_named_policy() {
    assert_eq!(PolicyConfig::Fifo.build().name(), "fifo");
    let important = PolicyConfig::ImportantFirst {
        flag: "_important".into(),
    };
    assert_eq!(important.build().name(), "important_first");
}

#[test]
fn test_options_follow_config() {
    let cfg = HubConfig {
        new_session_wait_timeout_ms: Timeout::from_millis(250),
        reject_unsatisfiable: true,
        outcome_retention: 8,
        ..HubConfig::default()
    };
    let options = cfg.options();
    assert_eq!(
        options.new_session_wait_timeout,
        Timeout::After(Duration::from_millis(250))
    );
    assert!(options.reject_unsatisfiable);
    assert_eq!(options.outcome_retention, 8);
}
