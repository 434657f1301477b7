//! Linux pseudo-file counter source
//!
//! Reads host counters from the standard Linux pseudo-filesystems:
//! - `/proc/stat` for per-core scheduler tick counters
//! - `/proc/meminfo` for the physical memory gauge
//! - the cgroup cpuacct/memory controllers for aggregate CPU counters
//!   (nanoseconds) and the host-wide memory stat file
//! - `/sys/class/net/<iface>/statistics` for network counters
//!
//! All root paths are configurable so tests can point the source at a
//! mock tree.

use super::{
    is_monitored_interface, CgroupCpu, CoreTicks, HostCounterSource, HostMemory,
};
use crate::models::NetworkCounters;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Counter source backed by procfs, cgroupfs and sysfs.
pub struct LinuxCounterSource {
    proc_root: PathBuf,
    cgroup_root: PathBuf,
    sysfs_net_root: PathBuf,
}

impl Default for LinuxCounterSource {
    fn default() -> Self {
        Self::new("/proc", "/sys/fs/cgroup", "/sys/class/net")
    }
}

impl LinuxCounterSource {
    /// Create a source with explicit root paths (for testing).
    pub fn new(
        proc_root: impl Into<PathBuf>,
        cgroup_root: impl Into<PathBuf>,
        sysfs_net_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            proc_root: proc_root.into(),
            cgroup_root: cgroup_root.into(),
            sysfs_net_root: sysfs_net_root.into(),
        }
    }

    /// Parse `/proc/stat` contents into per-core tick counters.
    ///
    /// The aggregate `cpu ` line is skipped; only `cpuN` lines count.
    pub fn parse_stat(content: &str) -> Vec<CoreTicks> {
        let mut cores = Vec::new();

        for line in content.lines() {
            let mut parts = line.split_whitespace();
            let label = match parts.next() {
                Some(l) => l,
                None => continue,
            };

            if !label.starts_with("cpu") || label == "cpu" {
                continue;
            }

            let mut fields = [0u64; 8];
            for slot in fields.iter_mut() {
                *slot = parts
                    .next()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(0);
            }

            cores.push(CoreTicks {
                user: fields[0],
                nice: fields[1],
                system: fields[2],
                idle: fields[3],
                iowait: fields[4],
                irq: fields[5],
                softirq: fields[6],
                steal: fields[7],
            });
        }

        cores
    }

    /// Parse `/proc/meminfo` contents into a memory gauge.
    ///
    /// Values are reported in kB and converted to bytes.
    pub fn parse_meminfo(content: &str) -> Result<HostMemory> {
        let mut total_kb = None;
        let mut free_kb = None;

        for line in content.lines() {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() >= 2 {
                match parts[0] {
                    "MemTotal:" => total_kb = parts[1].parse::<u64>().ok(),
                    "MemFree:" => free_kb = parts[1].parse::<u64>().ok(),
                    _ => {}
                }
            }
        }

        match (total_kb, free_kb) {
            (Some(total), Some(free)) => Ok(HostMemory {
                total_bytes: total * 1024,
                free_bytes: free * 1024,
            }),
            _ => anyhow::bail!("meminfo missing MemTotal or MemFree"),
        }
    }

    /// Parse a space/newline separated list of integers
    /// (`cpuacct.usage_percpu` format).
    pub fn parse_counter_list(content: &str) -> Vec<u64> {
        content
            .split_whitespace()
            .filter_map(|v| v.parse().ok())
            .collect()
    }

    /// Parse a `key value` stat file (`memory.stat` format).
    pub fn parse_stat_map(content: &str) -> HashMap<String, u64> {
        let mut stats = HashMap::new();

        for line in content.lines() {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() >= 2 {
                if let Ok(value) = parts[1].parse::<u64>() {
                    stats.insert(parts[0].to_string(), value);
                }
            }
        }

        stats
    }

    /// Read a single integer from a counter file.
    async fn read_counter(&self, path: &Path) -> Result<u64> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        content
            .trim()
            .parse()
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    fn cpuacct_path(&self, file: &str) -> PathBuf {
        self.cgroup_root.join("cpuacct").join(file)
    }
}

#[async_trait]
impl HostCounterSource for LinuxCounterSource {
    async fn memory(&self) -> Result<HostMemory> {
        let path = self.proc_root.join("meminfo");
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse_meminfo(&content)
    }

    async fn cpu_ticks(&self) -> Result<Vec<CoreTicks>> {
        let path = self.proc_root.join("stat");
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let cores = Self::parse_stat(&content);
        if cores.is_empty() {
            anyhow::bail!("no per-core entries in {}", path.display());
        }
        Ok(cores)
    }

    async fn supports_cgroup_cpu(&self) -> bool {
        fs::metadata(self.cpuacct_path("cpuacct.usage")).await.is_ok()
    }

    async fn cgroup_cpu(&self) -> Result<CgroupCpu> {
        let total_ns = self.read_counter(&self.cpuacct_path("cpuacct.usage")).await?;
        let kernel_ns = self
            .read_counter(&self.cpuacct_path("cpuacct.usage_sys"))
            .await?;
        let user_ns = self
            .read_counter(&self.cpuacct_path("cpuacct.usage_user"))
            .await?;

        let percpu_path = self.cpuacct_path("cpuacct.usage_percpu");
        let percpu_content = fs::read_to_string(&percpu_path)
            .await
            .with_context(|| format!("Failed to read {}", percpu_path.display()))?;
        let percpu_ns = Self::parse_counter_list(&percpu_content);

        Ok(CgroupCpu {
            total_ns,
            kernel_ns,
            user_ns,
            percpu_ns,
        })
    }

    async fn supports_cgroup_memory(&self) -> bool {
        fs::metadata(self.cgroup_root.join("memory").join("memory.stat"))
            .await
            .is_ok()
    }

    async fn memory_stat(&self) -> Result<HashMap<String, u64>> {
        let path = self.cgroup_root.join("memory").join("memory.stat");
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Self::parse_stat_map(&content))
    }

    async fn interfaces(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.sysfs_net_root)
            .await
            .with_context(|| format!("Failed to list {}", self.sysfs_net_root.display()))?;

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if is_monitored_interface(&name) {
                names.push(name);
            }
        }

        names.sort();
        Ok(names)
    }

    async fn network_counters(&self, interface: &str) -> Result<NetworkCounters> {
        let stats_dir = self
            .sysfs_net_root
            .join(interface)
            .join("statistics");

        Ok(NetworkCounters {
            rx_bytes: self.read_counter(&stats_dir.join("rx_bytes")).await?,
            tx_bytes: self.read_counter(&stats_dir.join("tx_bytes")).await?,
            rx_errors: self.read_counter(&stats_dir.join("rx_errors")).await?,
            tx_errors: self.read_counter(&stats_dir.join("tx_errors")).await?,
        })
    }
}
