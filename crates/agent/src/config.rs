//! Agent configuration

use anyhow::Result;
use serde::Deserialize;

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Node name from the orchestrator's downward API
    #[serde(default = "default_node_name")]
    pub node_name: String,

    /// Tick interval in milliseconds
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Root of the proc filesystem
    #[serde(default = "default_proc_root")]
    pub proc_root: String,

    /// Root of the cgroup hierarchy
    #[serde(default = "default_cgroup_root")]
    pub cgroup_root: String,

    /// Root of the sysfs network class directory
    #[serde(default = "default_sysfs_net_root")]
    pub sysfs_net_root: String,

    /// Sample channel buffer size
    #[serde(default = "default_sample_buffer")]
    pub sample_buffer: usize,
}

fn default_node_name() -> String {
    std::env::var("NODE_NAME").unwrap_or_else(|_| "unknown".to_string())
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_proc_root() -> String {
    "/proc".to_string()
}

fn default_cgroup_root() -> String {
    "/sys/fs/cgroup".to_string()
}

fn default_sysfs_net_root() -> String {
    "/sys/class/net".to_string()
}

fn default_sample_buffer() -> usize {
    1024
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            node_name: default_node_name(),
            tick_interval_ms: default_tick_interval_ms(),
            proc_root: default_proc_root(),
            cgroup_root: default_cgroup_root(),
            sysfs_net_root: default_sysfs_net_root(),
            sample_buffer: default_sample_buffer(),
        }
    }
}

impl AgentConfig {
    /// Load configuration from environment variables (AGENT_ prefix)
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("AGENT"))
            .build()?;

        Ok(config.try_deserialize().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.tick_interval_ms, 1000);
        assert_eq!(config.proc_root, "/proc");
        assert_eq!(config.cgroup_root, "/sys/fs/cgroup");
        assert_eq!(config.sample_buffer, 1024);
        assert!(!config.node_name.is_empty());
    }
}
