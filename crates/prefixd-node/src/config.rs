//! TOML-based configuration for the prefix manager.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use prefixd_core::constants::DEFAULT_AREA;
use prefixd_core::{
    ForwardingAlgorithm, ForwardingType, IpPrefix, KeyScope, PrefixEntry, PrefixType,
};
use prefixd_table::publish::{DEFAULT_KEY_TTL, DEFAULT_MAX_THROTTLE, DEFAULT_THROTTLE, MIN_KEY_TTL};

use crate::error::NodeError;

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub node: NodeSection,
    #[serde(default)]
    pub prefix_manager: PrefixManagerSection,
    #[serde(default)]
    pub logging: LoggingSection,
    #[serde(default)]
    pub originated_prefixes: Vec<OriginatedPrefixEntry>,
}

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, NodeError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NodeError::Config(format!("failed to read config file: {e}")))?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(format!("failed to parse config: {e}")))
    }
}

/// The `[node]` section.
#[derive(Debug, Deserialize)]
pub struct NodeSection {
    #[serde(default = "default_node_name")]
    pub name: String,
    #[serde(default = "default_area")]
    pub area: String,
    /// Custom storage directory path. Defaults to `~/.prefixd/storage`.
    pub storage_path: Option<String>,
    /// Whether to persist prefixes across restarts. Default: true.
    #[serde(default = "default_enable_storage")]
    pub enable_storage: bool,
}

fn default_node_name() -> String {
    "node".to_string()
}

fn default_area() -> String {
    DEFAULT_AREA.to_string()
}

fn default_enable_storage() -> bool {
    true
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            name: default_node_name(),
            area: default_area(),
            storage_path: None,
            enable_storage: default_enable_storage(),
        }
    }
}

/// The `[prefix_manager]` section.
#[derive(Debug, Deserialize)]
pub struct PrefixManagerSection {
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,
    #[serde(default = "default_max_throttle_ms")]
    pub max_throttle_ms: u64,
    /// Delay before the first publication after start. 0 disables.
    #[serde(default)]
    pub hold_time_ms: u64,
    #[serde(default = "default_key_ttl_ms")]
    pub key_ttl_ms: u64,
    #[serde(default = "default_enable_perf_measurement")]
    pub enable_perf_measurement: bool,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_throttle_ms() -> u64 {
    millis(DEFAULT_THROTTLE)
}

fn default_max_throttle_ms() -> u64 {
    millis(DEFAULT_MAX_THROTTLE)
}

fn default_key_ttl_ms() -> u64 {
    millis(DEFAULT_KEY_TTL)
}

fn default_enable_perf_measurement() -> bool {
    true
}

fn default_queue_capacity() -> usize {
    1024
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl Default for PrefixManagerSection {
    fn default() -> Self {
        Self {
            throttle_ms: default_throttle_ms(),
            max_throttle_ms: default_max_throttle_ms(),
            hold_time_ms: 0,
            key_ttl_ms: default_key_ttl_ms(),
            enable_perf_measurement: default_enable_perf_measurement(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// The `[logging]` section.
#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// A `[[originated_prefixes]]` entry, advertised at startup as `CONFIG`.
#[derive(Debug, Clone, Deserialize)]
pub struct OriginatedPrefixEntry {
    pub prefix: String,
    pub forwarding_type: Option<String>,
    pub forwarding_algorithm: Option<String>,
}

impl OriginatedPrefixEntry {
    /// Convert to an ephemeral `CONFIG` entry; config is re-read every boot.
    pub fn to_entry(&self) -> Result<PrefixEntry, NodeError> {
        let prefix: IpPrefix = self
            .prefix
            .parse()
            .map_err(|e| {
                NodeError::Config(format!("invalid originated prefix '{}': {e}", self.prefix))
            })?;
        let forwarding_type = match &self.forwarding_type {
            Some(s) => s.parse::<ForwardingType>().map_err(NodeError::Config)?,
            None => ForwardingType::default(),
        };
        let forwarding_algorithm = match &self.forwarding_algorithm {
            Some(s) => s.parse::<ForwardingAlgorithm>().map_err(NodeError::Config)?,
            None => ForwardingAlgorithm::default(),
        };
        Ok(PrefixEntry::new(prefix, PrefixType::Config)
            .with_ephemeral(true)
            .with_forwarding(forwarding_type, forwarding_algorithm))
    }
}

/// Validated runtime settings of the prefix manager.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub node_name: String,
    pub area: String,
    pub throttle: Duration,
    pub max_throttle: Duration,
    pub hold_time: Duration,
    pub key_ttl: Duration,
    pub enable_perf_measurement: bool,
    pub queue_capacity: usize,
    pub originated: Vec<PrefixEntry>,
}

impl ManagerConfig {
    /// Defaults for the given node identity.
    pub fn new(node_name: impl Into<String>, area: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
            area: area.into(),
            throttle: DEFAULT_THROTTLE,
            max_throttle: DEFAULT_MAX_THROTTLE,
            hold_time: Duration::ZERO,
            key_ttl: DEFAULT_KEY_TTL,
            enable_perf_measurement: true,
            queue_capacity: default_queue_capacity(),
            originated: Vec::new(),
        }
    }

    /// Derive and validate from a loaded [`NodeConfig`].
    pub fn from_node_config(config: &NodeConfig) -> Result<Self, NodeError> {
        let pm = &config.prefix_manager;
        let originated = config
            .originated_prefixes
            .iter()
            .map(OriginatedPrefixEntry::to_entry)
            .collect::<Result<Vec<_>, _>>()?;
        let manager = Self {
            node_name: config.node.name.clone(),
            area: config.node.area.clone(),
            throttle: Duration::from_millis(pm.throttle_ms),
            max_throttle: Duration::from_millis(pm.max_throttle_ms),
            hold_time: Duration::from_millis(pm.hold_time_ms),
            key_ttl: Duration::from_millis(pm.key_ttl_ms),
            enable_perf_measurement: pm.enable_perf_measurement,
            queue_capacity: pm.queue_capacity,
            originated,
        };
        manager.validate()?;
        Ok(manager)
    }

    #[must_use]
    pub fn with_throttle(mut self, throttle: Duration, max_throttle: Duration) -> Self {
        self.throttle = throttle;
        self.max_throttle = max_throttle;
        self
    }

    #[must_use]
    pub fn with_hold_time(mut self, hold_time: Duration) -> Self {
        self.hold_time = hold_time;
        self
    }

    #[must_use]
    pub fn with_key_ttl(mut self, key_ttl: Duration) -> Self {
        self.key_ttl = key_ttl;
        self
    }

    #[must_use]
    pub fn with_perf_measurement(mut self, enabled: bool) -> Self {
        self.enable_perf_measurement = enabled;
        self
    }

    #[must_use]
    pub fn with_originated(mut self, originated: Vec<PrefixEntry>) -> Self {
        self.originated = originated;
        self
    }

    pub fn validate(&self) -> Result<(), NodeError> {
        if self.node_name.is_empty() {
            return Err(NodeError::Config("node name must not be empty".into()));
        }
        if self.node_name.contains(':') || self.area.contains(':') {
            return Err(NodeError::Config(format!(
                "node name and area must not contain ':' (got '{}', '{}')",
                self.node_name, self.area
            )));
        }
        if self.area.is_empty() {
            return Err(NodeError::Config("area must not be empty".into()));
        }
        if self.max_throttle < self.throttle {
            return Err(NodeError::Config(format!(
                "max throttle {:?} is below throttle {:?}",
                self.max_throttle, self.throttle
            )));
        }
        if self.key_ttl < MIN_KEY_TTL {
            return Err(NodeError::Config(format!(
                "key TTL {:?} is below the minimum {MIN_KEY_TTL:?}",
                self.key_ttl
            )));
        }
        if self.queue_capacity == 0 {
            return Err(NodeError::Config("queue capacity must be positive".into()));
        }
        Ok(())
    }

    /// Key naming scope for this node's publications.
    pub fn key_scope(&self) -> Result<KeyScope, NodeError> {
        Ok(KeyScope::new(self.node_name.clone(), self.area.clone())?)
    }
}
