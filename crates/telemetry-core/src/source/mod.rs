//! Host counter sources
//!
//! This module abstracts the OS-level counter reads the host calculator
//! depends on: scheduler tick counters, physical memory gauges, and
//! (when available) cgroup-style cumulative CPU counters plus
//! per-interface network counters read from pseudo-files. Each
//! capability is independently optional and detected at startup.

mod linux;


pub use linux::LinuxCounterSource;

use crate::models::NetworkCounters;
use anyhow::Result;
use async_trait::async_trait;

/// Instantaneous host memory gauge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostMemory {
    pub total_bytes: u64,
    pub free_bytes: u64,
}

impl HostMemory {
    pub fn used_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.free_bytes)
    }
}

/// Cumulative scheduler tick counters for one core, in USER_HZ jiffies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoreTicks {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
}

impl CoreTicks {
    /// Ticks spent doing work on behalf of processes.
    pub fn busy(&self) -> u64 {
        self.user + self.system
    }

    /// All ticks accounted for this core.
    pub fn total(&self) -> u64 {
        self.user
            + self.nice
            + self.system
            + self.idle
            + self.iowait
            + self.irq
            + self.softirq
            + self.steal
    }
}

/// Cumulative cgroup CPU counters, all in nanoseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CgroupCpu {
    pub total_ns: u64,
    pub kernel_ns: u64,
    pub user_ns: u64,
    pub percpu_ns: Vec<u64>,
}

/// Read-only access to host-level counters.
///
/// Implementations are expected to be cheap to share (`Arc`) and to
/// fail per read: an unreadable file surfaces as an `Err` for that one
/// call and must not poison other reads.
#[async_trait]
pub trait HostCounterSource: Send + Sync {
    /// Total and free physical memory.
    async fn memory(&self) -> Result<HostMemory>;

    /// Per-core cumulative scheduler tick counters.
    async fn cpu_ticks(&self) -> Result<Vec<CoreTicks>>;

    /// Whether cgroup aggregate CPU counters are readable on this host.
    async fn supports_cgroup_cpu(&self) -> bool;

    /// Cgroup aggregate CPU counters (nanoseconds).
    async fn cgroup_cpu(&self) -> Result<CgroupCpu>;

    /// Whether a host-wide memory stat file is readable.
    async fn supports_cgroup_memory(&self) -> bool;

    /// Host-wide memory sub-stats (inactive_anon, inactive_file, ...).
    async fn memory_stat(&self) -> Result<std::collections::HashMap<String, u64>>;

    /// Names of host network interfaces worth monitoring.
    async fn interfaces(&self) -> Result<Vec<String>>;

    /// Cumulative counters for one interface.
    async fn network_counters(&self, interface: &str) -> Result<NetworkCounters>;
}

/// Virtual and bridge interfaces carry container-internal traffic that
/// the host signals must not double-count.
const EXCLUDED_INTERFACE_PREFIXES: &[&str] = &["veth", "docker", "br-", "virbr"];

/// Whether a host interface should be monitored, by name pattern.
pub fn is_monitored_interface(name: &str) -> bool {
    if name == "lo" {
        return false;
    }
    !EXCLUDED_INTERFACE_PREFIXES
        .iter()
        .any(|prefix| name.starts_with(prefix))
}
