//! Container metrics calculator
//!
//! Consumes one raw stats snapshot per tick for a single container and
//! derives CPU percentage, memory signals, and cross-tick usage rates.
//! The CPU percentage uses the matched current/previous pair the
//! runtime embeds in every snapshot; everything rate-shaped uses the
//! calculator's own retained previous counters instead.

use super::{memory_percent, observe_cores, working_set, InterfaceTrackers};
use crate::error::MetricsError;
use crate::models::{
    ContainerMetrics, ContainerStats, CpuMetrics, CpuUsageRates, MemoryMetrics, NetworkRates,
};
use crate::rate::{CounterTracker, NANOS_PER_SEC};
use std::collections::HashMap;
use tracing::warn;

/// Stateful calculator for one container.
///
/// One instance per tracked container; drop it when the container
/// stops. Retained state is replaced exactly once per tick, after all
/// rate computations for that tick have read the old baseline.
pub struct ContainerCalculator {
    container_id: String,
    cpu_total: CounterTracker,
    cpu_kernel: CounterTracker,
    cpu_user: CounterTracker,
    cores: Vec<CounterTracker>,
    networks: HashMap<String, InterfaceTrackers>,
}

impl ContainerCalculator {
    pub fn new(container_id: impl Into<String>) -> Self {
        Self {
            container_id: container_id.into(),
            cpu_total: CounterTracker::new(),
            cpu_kernel: CounterTracker::new(),
            cpu_user: CounterTracker::new(),
            cores: Vec::new(),
            networks: HashMap::new(),
        }
    }

    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    /// CPU percentage from the embedded current/previous pair.
    ///
    /// Defined as 0.0 (not an error) when either delta is non-positive:
    /// that is the documented cold-start and steady-state behavior.
    /// One fully-busy core contributes 100, so an N-core container can
    /// reach N*100.
    pub fn cpu_percent(stats: &ContainerStats) -> f64 {
        let current = &stats.cpu_stats;
        let previous = &stats.precpu_stats;

        if current.cpu_usage.total_usage <= previous.cpu_usage.total_usage
            || current.system_cpu_usage <= previous.system_cpu_usage
        {
            return 0.0;
        }

        let total_delta =
            (current.cpu_usage.total_usage - previous.cpu_usage.total_usage) as f64;
        let system_delta = (current.system_cpu_usage - previous.system_cpu_usage) as f64;
        let num_cores = current.cpu_usage.percpu_usage.len() as f64;

        (total_delta / system_delta) * num_cores * 100.0
    }

    /// Derive all signals for one tick.
    ///
    /// A metric family with missing required fields is logged and
    /// omitted; the other families still emit. Nothing here can fail
    /// the whole tick.
    pub fn tick(&mut self, stats: &ContainerStats) -> ContainerMetrics {
        let timestamp = chrono::Utc::now().timestamp();

        let cpu = match self.cpu_family(stats) {
            Ok(metrics) => Some(metrics),
            Err(e) => {
                warn!(
                    container_id = %self.container_id,
                    error = %e,
                    "CPU family skipped for this tick"
                );
                None
            }
        };

        let memory = match Self::memory_family(stats) {
            Ok(metrics) => Some(metrics),
            Err(e) => {
                warn!(
                    container_id = %self.container_id,
                    error = %e,
                    "Memory family skipped for this tick"
                );
                None
            }
        };

        let networks = self.network_rates(stats);

        ContainerMetrics {
            container_id: self.container_id.clone(),
            timestamp,
            cpu,
            memory,
            networks,
        }
    }

    /// CPU percentage plus cross-tick usage rates in seconds of CPU
    /// time per interval (nanosecond counters / 1e9).
    fn cpu_family(&mut self, stats: &ContainerStats) -> Result<CpuMetrics, MetricsError> {
        let usage = &stats.cpu_stats.cpu_usage;
        if usage.percpu_usage.is_empty() {
            return Err(MetricsError::MissingField("cpu_stats.cpu_usage.percpu_usage"));
        }

        let percentage = Self::cpu_percent(stats);

        let rates = CpuUsageRates {
            total: self.cpu_total.update(usage.total_usage).seconds(),
            kernel: self.cpu_kernel.update(usage.usage_in_kernelmode).seconds(),
            user: self.cpu_user.update(usage.usage_in_usermode).seconds(),
            cores: observe_cores(&mut self.cores, &usage.percpu_usage, NANOS_PER_SEC),
        };

        Ok(CpuMetrics {
            percentage: Some(percentage),
            usage: rates,
        })
    }

    fn memory_family(stats: &ContainerStats) -> Result<MemoryMetrics, MetricsError> {
        let usage = stats
            .memory_stats
            .usage
            .ok_or(MetricsError::MissingField("memory_stats.usage"))?;
        let limit = stats.memory_stats.limit.unwrap_or(0);

        let inactive_anon = stats.memory_stats.sub_stat("total_inactive_anon");
        let inactive_file = stats.memory_stats.sub_stat("total_inactive_file");

        Ok(MemoryMetrics {
            usage,
            limit,
            percentage: memory_percent(usage, limit),
            working_set: Some(working_set(usage, inactive_anon, inactive_file)),
        })
    }

    /// Cross-tick network rates against the retained previous snapshot
    /// (never the embedded precpu pair, which only covers CPU).
    fn network_rates(&mut self, stats: &ContainerStats) -> HashMap<String, NetworkRates> {
        stats
            .networks
            .iter()
            .map(|(name, counters)| {
                let trackers = self.networks.entry(name.clone()).or_default();
                (name.clone(), trackers.observe(counters))
            })
            .collect()
    }
}
