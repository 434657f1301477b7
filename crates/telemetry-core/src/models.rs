//! Core data models for the telemetry derivation layer
//!
//! Raw input types mirror the container runtime's stats JSON payload
//! (snake_case field names map 1:1), so a snapshot source can feed the
//! calculators with `serde_json` output directly. Output types carry
//! the derived per-tick signals; suppressed values (first observation,
//! counter reset, unreadable source) are `None` and skipped during
//! serialization.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Cumulative CPU usage counters from one sample, all in nanoseconds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CpuUsage {
    #[serde(default)]
    pub total_usage: u64,
    #[serde(default)]
    pub usage_in_kernelmode: u64,
    #[serde(default)]
    pub usage_in_usermode: u64,
    /// Per-core cumulative usage. The runtime omits this on some
    /// platforms; an empty array fails the CPU family for the tick.
    #[serde(default)]
    pub percpu_usage: Vec<u64>,
}

/// One CPU sample: container counters plus the host-wide counter
/// observed at the same instant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CpuSample {
    #[serde(default)]
    pub cpu_usage: CpuUsage,
    #[serde(default)]
    pub system_cpu_usage: u64,
}

/// Memory counters from one sample.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryStats {
    /// Current usage in bytes. Required; absence fails the memory family.
    pub usage: Option<u64>,
    /// Configured limit in bytes. Zero or absent means no cap is set.
    pub limit: Option<u64>,
    /// Detailed sub-stats (`total_inactive_anon`, `total_inactive_file`, ...).
    #[serde(default)]
    pub stats: HashMap<String, u64>,
}

/// Cumulative network counters for one interface.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct NetworkCounters {
    #[serde(default)]
    pub rx_bytes: u64,
    #[serde(default)]
    pub tx_bytes: u64,
    #[serde(default)]
    pub rx_errors: u64,
    #[serde(default)]
    pub tx_errors: u64,
}

/// One raw container stats snapshot, as shipped by the runtime's stats
/// API: the current CPU sample and the immediately preceding one arrive
/// together in a matched pair.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerStats {
    #[serde(default)]
    pub cpu_stats: CpuSample,
    /// The preceding CPU sample embedded in the same payload. Only
    /// valid for the intra-snapshot CPU percentage; cross-tick rates
    /// use the calculator's own retained state instead.
    #[serde(default)]
    pub precpu_stats: CpuSample,
    #[serde(default)]
    pub memory_stats: MemoryStats,
    #[serde(default)]
    pub networks: HashMap<String, NetworkCounters>,
}

impl MemoryStats {
    /// Look up an optional sub-stat, defaulting to 0 when absent.
    pub fn sub_stat(&self, name: &str) -> u64 {
        self.stats.get(name).copied().unwrap_or(0)
    }
}

/// CPU usage rates for one tick, in seconds of CPU time consumed per
/// sampling interval. `None` means the signal is suppressed this tick.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CpuUsageRates {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kernel: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<f64>,
    pub cores: Vec<Option<f64>>,
}

/// Per-interface network rates for one tick (raw counts per interval).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct NetworkRates {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rx_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rx_errors: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_errors: Option<u64>,
}

/// Derived CPU signals for one entity and tick.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CpuMetrics {
    /// Percentage of host CPU consumed, normalized so one fully-busy
    /// core contributes 100 (a 4-core container can reach 400).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
    pub usage: CpuUsageRates,
}

/// Derived memory signals for one entity and tick.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryMetrics {
    pub usage: u64,
    pub limit: u64,
    pub percentage: f64,
    /// Usage minus reclaimable inactive page categories, clamped at 0.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_set: Option<u64>,
}

/// Derived per-tick signals for one container.
///
/// A metric family is `None` when its required raw fields were missing
/// for the tick; the other families still emit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerMetrics {
    pub container_id: String,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<CpuMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemoryMetrics>,
    pub networks: HashMap<String, NetworkRates>,
}

/// Derived per-tick signals for the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostMetrics {
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<CpuMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemoryMetrics>,
    pub networks: HashMap<String, NetworkRates>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_runtime_stats_payload() {
        let payload = r#"{
            "cpu_stats": {
                "cpu_usage": {
                    "total_usage": 150,
                    "usage_in_kernelmode": 40,
                    "usage_in_usermode": 110,
                    "percpu_usage": [40, 40, 35, 35]
                },
                "system_cpu_usage": 1100
            },
            "precpu_stats": {
                "cpu_usage": { "total_usage": 100 },
                "system_cpu_usage": 1000
            },
            "memory_stats": {
                "usage": 5000000,
                "limit": 10000000,
                "stats": {
                    "total_inactive_anon": 2000000,
                    "total_inactive_file": 1000000
                }
            },
            "networks": {
                "eth0": { "rx_bytes": 1000, "tx_bytes": 500, "rx_errors": 0, "tx_errors": 1 }
            }
        }"#;

        let stats: ContainerStats = serde_json::from_str(payload).unwrap();
        assert_eq!(stats.cpu_stats.cpu_usage.total_usage, 150);
        assert_eq!(stats.cpu_stats.cpu_usage.percpu_usage.len(), 4);
        assert_eq!(stats.precpu_stats.system_cpu_usage, 1000);
        assert_eq!(stats.memory_stats.usage, Some(5_000_000));
        assert_eq!(stats.memory_stats.sub_stat("total_inactive_anon"), 2_000_000);
        assert_eq!(stats.networks["eth0"].tx_errors, 1);
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let stats: ContainerStats = serde_json::from_str("{}").unwrap();
        assert!(stats.cpu_stats.cpu_usage.percpu_usage.is_empty());
        assert_eq!(stats.memory_stats.usage, None);
        assert_eq!(stats.memory_stats.sub_stat("total_inactive_file"), 0);
        assert!(stats.networks.is_empty());
    }

    #[test]
    fn test_suppressed_rates_skipped_in_serialization() {
        let rates = NetworkRates {
            rx_bytes: Some(10),
            tx_bytes: None,
            rx_errors: None,
            tx_errors: None,
        };
        let json = serde_json::to_value(rates).unwrap();
        assert_eq!(json.as_object().unwrap().len(), 1);
        assert_eq!(json["rx_bytes"], 10);
    }
}
