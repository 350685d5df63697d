//! Hub and node configuration structures.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::config::Timeout;
use crate::core::{
    AppResult, Capabilities, Fifo, HubOptions, ImportantFirst, MaxConcurrency, NumericPriority,
    PriorityPolicy, WorkerRegistration, DEFAULT_IMPORTANT_FLAG,
};

/// Environment variable holding either inline JSON or a path to a JSON file.
pub const CONFIG_ENV_VAR: &str = "GRID_HUB_CONFIG";

/// Priority policy selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum PolicyConfig {
    /// Arrival order.
    #[default]
    Fifo,
    /// Requests carrying a truthy `flag` attribute first.
    ImportantFirst {
        /// Attribute name.
        #[serde(default = "default_flag")]
        flag: String,
    },
    /// Higher numeric `attribute` first.
    Numeric {
        /// Attribute name.
        attribute: String,
    },
}

fn default_flag() -> String {
    DEFAULT_IMPORTANT_FLAG.to_string()
}

impl PolicyConfig {
    /// Instantiate the configured policy.
    pub fn build(&self) -> Arc<dyn PriorityPolicy> {
        match self {
            Self::Fifo => Arc::new(Fifo),
            Self::ImportantFirst { flag } => Arc::new(ImportantFirst::new(flag.clone())),
            Self::Numeric { attribute } => Arc::new(NumericPriority::new(attribute.clone())),
        }
    }
}

/// One slot class of a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotClassConfig {
    /// Offered capabilities.
    pub capabilities: Capabilities,
    /// Concurrent sessions of this class; `-1` for unbounded.
    pub max_instances: MaxConcurrency,
}

/// A node registered at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Node identity.
    pub id: String,
    /// Slot classes in preference order.
    pub slot_classes: Vec<SlotClassConfig>,
    /// Concurrent sessions across all classes; `-1` for unbounded.
    #[serde(default)]
    pub max_session: MaxConcurrency,
    /// Admission timeout override in ms; `-1` never times out requests this
    /// node could serve. Omit to inherit the hub default.
    #[serde(default)]
    pub request_timeout_ms: Option<Timeout>,
    /// Session inactivity bound in ms; `-1` disables.
    #[serde(default)]
    pub session_timeout_ms: Timeout,
}

impl NodeConfig {
    /// Validate node values.
    pub fn validate(&self) -> Result<(), String> {
        self.to_registration().validate().map_err(|e| e.to_string())
    }

    /// Registration announced to the hub for this node.
    pub fn to_registration(&self) -> WorkerRegistration {
        let mut reg = WorkerRegistration::new(self.id.as_str())
            .with_max_concurrent(self.max_session)
            .with_session_timeout(self.session_timeout_ms);
        if let Some(timeout) = self.request_timeout_ms {
            reg = reg.with_request_timeout(timeout);
        }
        for class in &self.slot_classes {
            reg = reg.with_slot_class(class.capabilities.clone(), class.max_instances);
        }
        reg
    }
}

/// Root hub configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Admission timeout in ms; `-1` keeps requests pending forever.
    #[serde(default)]
    pub new_session_wait_timeout_ms: Timeout,
    /// Refuse submissions no registered node could ever serve.
    #[serde(default)]
    pub reject_unsatisfiable: bool,
    /// Finished request outcomes kept for status queries.
    #[serde(default = "default_outcome_retention")]
    pub outcome_retention: usize,
    /// Interval of the timeout sweep in ms.
    #[serde(default = "default_maintenance_interval_ms")]
    pub maintenance_interval_ms: u64,
    /// Priority policy.
    #[serde(default)]
    pub priority: PolicyConfig,
    /// Nodes registered at startup.
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,
}

const fn default_outcome_retention() -> usize {
    1024
}

const fn default_maintenance_interval_ms() -> u64 {
    5_000
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            new_session_wait_timeout_ms: Timeout::Disabled,
            reject_unsatisfiable: false,
            outcome_retention: default_outcome_retention(),
            maintenance_interval_ms: default_maintenance_interval_ms(),
            priority: PolicyConfig::Fifo,
            nodes: Vec::new(),
        }
    }
}

impl HubConfig {
    /// Validate hub values and every node.
    pub fn validate(&self) -> Result<(), String> {
        if self.outcome_retention == 0 {
            return Err("outcome_retention must be greater than 0".into());
        }
        if self.maintenance_interval_ms == 0 {
            return Err("maintenance_interval_ms must be greater than 0".into());
        }
        if let PolicyConfig::ImportantFirst { flag } | PolicyConfig::Numeric { attribute: flag } = &self.priority {
            if flag.trim().is_empty() {
                return Err("priority attribute must not be empty".into());
            }
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            node.validate()
                .map_err(|e| format!("node #{idx} (`{}`) invalid: {e}", node.id))?;
            if self.nodes[..idx].iter().any(|n| n.id == node.id) {
                return Err(format!("node id `{}` is declared twice", node.id));
            }
        }
        Ok(())
    }

    /// Parse hub configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read and validate a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading hub config {}", path.display()))?;
        Self::from_json_str(&raw)
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("loading hub config {}", path.display()))
    }

    /// Load from [`CONFIG_ENV_VAR`] after reading a `.env` file if present.
    /// The variable may hold inline JSON or a file path; when unset the
    /// defaults are used.
    pub fn from_env() -> AppResult<Self> {
        if let Err(err) = dotenvy::dotenv() {
            if !err.not_found() {
                return Err(anyhow::Error::new(err).context("reading .env"));
            }
        }
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(value) if value.trim_start().starts_with('{') => Self::from_json_str(&value)
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("parsing {CONFIG_ENV_VAR}")),
            Ok(path) => Self::from_file(path),
            Err(std::env::VarError::NotPresent) => {
                tracing::debug!("{CONFIG_ENV_VAR} not set, using default hub config");
                Ok(Self::default())
            }
            Err(err) => Err(anyhow::Error::new(err).context(format!("reading {CONFIG_ENV_VAR}"))),
        }
    }

    /// Admission settings for [`crate::core::Hub::new`].
    pub const fn options(&self) -> HubOptions {
        HubOptions {
            new_session_wait_timeout: self.new_session_wait_timeout_ms,
            reject_unsatisfiable: self.reject_unsatisfiable,
            outcome_retention: self.outcome_retention,
        }
    }
}
