//! Host metrics calculator
//!
//! Derives the host analogues of the container signals. CPU has two
//! sourcing strategies, selected by platform capability at startup:
//! scheduler tick counters (always available) or cgroup aggregate
//! nanosecond counters (when the pseudo-files exist). Memory is an
//! instantaneous gauge; network rates come from per-interface counter
//! files read concurrently.

use super::{memory_percent, observe_cores, working_set, InterfaceTrackers};
use crate::error::MetricsError;
use crate::models::{CpuMetrics, CpuUsageRates, HostMetrics, NetworkRates};
use crate::rate::{CounterTracker, NANOS_PER_SEC, SCHED_TICKS_PER_SEC};
use crate::source::{CoreTicks, HostCounterSource};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Which counter family feeds the host CPU usage rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuSourcing {
    /// Per-core scheduler tick counters (USER_HZ jiffies).
    SchedulerTicks,
    /// Cgroup aggregate cumulative counters (nanoseconds), same
    /// arithmetic as the container calculator.
    CgroupAggregate,
}

/// Rolling per-core average of idle and total scheduler ticks, the
/// previous sample for the host CPU percentage.
#[derive(Debug, Clone, Copy)]
struct CpuAverage {
    idle: f64,
    total: f64,
}

/// Stateful calculator for host-wide signals.
pub struct HostCalculator {
    source: Arc<dyn HostCounterSource>,
    sourcing: CpuSourcing,
    track_working_set: bool,
    last_average: Option<CpuAverage>,
    cpu_total: CounterTracker,
    cpu_kernel: CounterTracker,
    cpu_user: CounterTracker,
    cores: Vec<CounterTracker>,
    networks: HashMap<String, InterfaceTrackers>,
}

impl HostCalculator {
    /// Create a calculator with explicit capabilities (for testing).
    pub fn new(
        source: Arc<dyn HostCounterSource>,
        sourcing: CpuSourcing,
        track_working_set: bool,
    ) -> Self {
        Self {
            source,
            sourcing,
            track_working_set,
            last_average: None,
            cpu_total: CounterTracker::new(),
            cpu_kernel: CounterTracker::new(),
            cpu_user: CounterTracker::new(),
            cores: Vec::new(),
            networks: HashMap::new(),
        }
    }

    /// Probe the source's capabilities and pick the CPU strategy.
    pub async fn detect(source: Arc<dyn HostCounterSource>) -> Self {
        let sourcing = if source.supports_cgroup_cpu().await {
            info!("Cgroup aggregate CPU counters available, using nanosecond sourcing");
            CpuSourcing::CgroupAggregate
        } else {
            info!("No cgroup CPU counters, falling back to scheduler tick sourcing");
            CpuSourcing::SchedulerTicks
        };
        let track_working_set = source.supports_cgroup_memory().await;

        Self::new(source, sourcing, track_working_set)
    }

    pub fn sourcing(&self) -> CpuSourcing {
        self.sourcing
    }

    /// Derive all host signals for one tick.
    ///
    /// Every sub-read fails independently: an unreadable source
    /// suppresses its own signals and leaves their baselines untouched,
    /// so the next successful read computes a correct delta across the
    /// gap.
    pub async fn tick(&mut self) -> HostMetrics {
        let timestamp = chrono::Utc::now().timestamp();

        let cpu = match self.cpu_family().await {
            Ok(metrics) => Some(metrics),
            Err(e) => {
                warn!(error = %e, "Host CPU family skipped for this tick");
                None
            }
        };

        let memory = match self.memory_family().await {
            Ok(metrics) => Some(metrics),
            Err(e) => {
                warn!(error = %e, "Host memory family skipped for this tick");
                None
            }
        };

        let networks = self.network_rates().await;

        HostMetrics {
            timestamp,
            cpu,
            memory,
            networks,
        }
    }

    async fn cpu_family(&mut self) -> Result<CpuMetrics, MetricsError> {
        let ticks = self.source.cpu_ticks().await?;
        let percentage = self.cpu_percentage(&ticks);

        let usage = match self.sourcing {
            CpuSourcing::CgroupAggregate => match self.source.cgroup_cpu().await {
                Ok(cpu) => CpuUsageRates {
                    total: self.cpu_total.update(cpu.total_ns).seconds(),
                    kernel: self.cpu_kernel.update(cpu.kernel_ns).seconds(),
                    user: self.cpu_user.update(cpu.user_ns).seconds(),
                    cores: observe_cores(&mut self.cores, &cpu.percpu_ns, NANOS_PER_SEC),
                },
                Err(e) => {
                    // Baselines untouched; rates resume across the gap
                    warn!(error = %e, "Cgroup CPU counters unreadable, suppressing usage rates");
                    CpuUsageRates::default()
                }
            },
            CpuSourcing::SchedulerTicks => {
                let busy: Vec<u64> = ticks.iter().map(CoreTicks::busy).collect();
                let total_busy: u64 = busy.iter().sum();

                CpuUsageRates {
                    total: self
                        .cpu_total
                        .update(total_busy)
                        .value()
                        .map(|d| d as f64 / SCHED_TICKS_PER_SEC),
                    // The tick counters carry no kernel/user nanosecond
                    // split; those signals exist only on the cgroup path
                    kernel: None,
                    user: None,
                    cores: observe_cores(&mut self.cores, &busy, SCHED_TICKS_PER_SEC),
                }
            }
        };

        Ok(CpuMetrics { percentage, usage })
    }

    /// Host CPU percentage from the rolling tick average.
    ///
    /// The first tick seeds the average and emits nothing; from the
    /// second tick on, `100 - 100 * idleDelta / totalDelta`.
    fn cpu_percentage(&mut self, ticks: &[CoreTicks]) -> Option<f64> {
        if ticks.is_empty() {
            return None;
        }

        let count = ticks.len() as f64;
        let new_average = CpuAverage {
            idle: ticks.iter().map(|c| c.idle).sum::<u64>() as f64 / count,
            total: ticks.iter().map(CoreTicks::total).sum::<u64>() as f64 / count,
        };

        let percentage = self.last_average.map(|last| {
            let idle_delta = new_average.idle - last.idle;
            let total_delta = new_average.total - last.total;
            if total_delta <= 0.0 {
                0.0
            } else {
                100.0 - 100.0 * idle_delta / total_delta
            }
        });

        self.last_average = Some(new_average);
        percentage
    }

    async fn memory_family(&mut self) -> Result<crate::models::MemoryMetrics, MetricsError> {
        let gauge = self.source.memory().await?;
        let usage = gauge.used_bytes();
        let limit = gauge.total_bytes;

        let working = if self.track_working_set {
            match self.source.memory_stat().await {
                Ok(stats) => {
                    let inactive_anon = stats.get("total_inactive_anon").copied().unwrap_or(0);
                    let inactive_file = stats.get("total_inactive_file").copied().unwrap_or(0);
                    Some(working_set(usage, inactive_anon, inactive_file))
                }
                Err(e) => {
                    debug!(error = %e, "Host memory stat unreadable, suppressing working set");
                    None
                }
            }
        } else {
            None
        };

        Ok(crate::models::MemoryMetrics {
            usage,
            limit,
            percentage: memory_percent(usage, limit),
            working_set: working,
        })
    }

    /// Per-interface rates. Reads are issued concurrently and may
    /// resolve out of order; a failed read suppresses that interface's
    /// signals for the tick without touching its retained baseline.
    async fn network_rates(&mut self) -> HashMap<String, NetworkRates> {
        let interfaces = match self.source.interfaces().await {
            Ok(names) => names,
            Err(e) => {
                warn!(error = %e, "Interface enumeration failed, suppressing network signals");
                return HashMap::new();
            }
        };

        let mut reads = tokio::task::JoinSet::new();
        for name in interfaces {
            let source = Arc::clone(&self.source);
            reads.spawn(async move {
                let counters = source.network_counters(&name).await;
                (name, counters)
            });
        }

        let mut rates = HashMap::new();
        while let Some(joined) = reads.join_next().await {
            let (name, result) = match joined {
                Ok(pair) => pair,
                Err(_) => continue,
            };

            match result {
                Ok(counters) => {
                    let trackers = self.networks.entry(name.clone()).or_default();
                    rates.insert(name, trackers.observe(&counters));
                }
                Err(e) => {
                    debug!(
                        interface = %name,
                        error = %e,
                        "Interface counters unreadable, skipping this tick"
                    );
                }
            }
        }

        rates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NetworkCounters;
    use crate::source::{CgroupCpu, HostMemory};
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockState {
        memory: HostMemory,
        fail_memory: bool,
        ticks: Vec<CoreTicks>,
        cgroup: Option<CgroupCpu>,
        memory_stat: HashMap<String, u64>,
        interfaces: Vec<String>,
        counters: HashMap<String, NetworkCounters>,
        failing_interfaces: Vec<String>,
    }

    #[derive(Default)]
    struct MockSource {
        state: Mutex<MockState>,
    }

    impl MockSource {
        fn set<F: FnOnce(&mut MockState)>(&self, f: F) {
            f(&mut self.state.lock().unwrap());
        }
    }

    #[async_trait]
    impl HostCounterSource for MockSource {
        async fn memory(&self) -> Result<HostMemory> {
            let state = self.state.lock().unwrap();
            if state.fail_memory {
                anyhow::bail!("meminfo unreadable");
            }
            Ok(state.memory)
        }

        async fn cpu_ticks(&self) -> Result<Vec<CoreTicks>> {
            Ok(self.state.lock().unwrap().ticks.clone())
        }

        async fn supports_cgroup_cpu(&self) -> bool {
            self.state.lock().unwrap().cgroup.is_some()
        }

        async fn cgroup_cpu(&self) -> Result<CgroupCpu> {
            self.state
                .lock()
                .unwrap()
                .cgroup
                .clone()
                .ok_or_else(|| anyhow::anyhow!("no cgroup counters"))
        }

        async fn supports_cgroup_memory(&self) -> bool {
            !self.state.lock().unwrap().memory_stat.is_empty()
        }

        async fn memory_stat(&self) -> Result<HashMap<String, u64>> {
            Ok(self.state.lock().unwrap().memory_stat.clone())
        }

        async fn interfaces(&self) -> Result<Vec<String>> {
            Ok(self.state.lock().unwrap().interfaces.clone())
        }

        async fn network_counters(&self, interface: &str) -> Result<NetworkCounters> {
            let state = self.state.lock().unwrap();
            if state.failing_interfaces.iter().any(|i| i == interface) {
                anyhow::bail!("counter file unreadable");
            }
            state
                .counters
                .get(interface)
                .copied()
                .ok_or_else(|| anyhow::anyhow!("no such interface"))
        }
    }

    fn core(user: u64, system: u64, idle: u64) -> CoreTicks {
        CoreTicks {
            user,
            system,
            idle,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_first_tick_seeds_average_no_percentage() {
        let source = Arc::new(MockSource::default());
        source.set(|s| {
            s.memory = HostMemory { total_bytes: 10_000_000, free_bytes: 4_000_000 };
            s.ticks = vec![core(50, 50, 100), core(50, 50, 100)];
        });

        let mut calc =
            HostCalculator::new(source, CpuSourcing::SchedulerTicks, false);
        let metrics = calc.tick().await;

        let cpu = metrics.cpu.unwrap();
        assert_eq!(cpu.percentage, None);
        assert_eq!(cpu.usage.total, None);
        assert_eq!(cpu.usage.cores, vec![None, None]);
    }

    #[tokio::test]
    async fn test_second_tick_percentage_and_rates() {
        let source = Arc::new(MockSource::default());
        source.set(|s| {
            s.memory = HostMemory { total_bytes: 10_000_000, free_bytes: 4_000_000 };
            s.ticks = vec![core(50, 50, 100), core(50, 50, 100)];
        });

        let mut calc =
            HostCalculator::new(Arc::clone(&source) as Arc<dyn HostCounterSource>, CpuSourcing::SchedulerTicks, false);
        calc.tick().await;

        source.set(|s| {
            s.ticks = vec![core(100, 100, 150), core(100, 100, 150)];
        });
        let metrics = calc.tick().await;

        let cpu = metrics.cpu.unwrap();
        // idleDelta=50, totalDelta=150 per-core average
        let expected = 100.0 - 100.0 * 50.0 / 150.0;
        assert!((cpu.percentage.unwrap() - expected).abs() < 1e-9);

        // busy per core 100 -> 200: 100 jiffies = 1.0s; total 2.0s
        assert_eq!(cpu.usage.total, Some(2.0));
        assert_eq!(cpu.usage.cores, vec![Some(1.0), Some(1.0)]);
        assert_eq!(cpu.usage.kernel, None);
    }

    #[tokio::test]
    async fn test_cgroup_sourcing_nanosecond_scaling() {
        let source = Arc::new(MockSource::default());
        source.set(|s| {
            s.memory = HostMemory { total_bytes: 10_000_000, free_bytes: 4_000_000 };
            s.ticks = vec![core(50, 50, 100)];
            s.cgroup = Some(CgroupCpu {
                total_ns: 1_000_000_000,
                kernel_ns: 400_000_000,
                user_ns: 600_000_000,
                percpu_ns: vec![1_000_000_000],
            });
        });

        let mut calc = HostCalculator::detect(Arc::clone(&source) as Arc<dyn HostCounterSource>).await;
        assert_eq!(calc.sourcing(), CpuSourcing::CgroupAggregate);
        calc.tick().await;

        source.set(|s| {
            s.ticks = vec![core(100, 100, 150)];
            s.cgroup = Some(CgroupCpu {
                total_ns: 3_000_000_000,
                kernel_ns: 900_000_000,
                user_ns: 2_100_000_000,
                percpu_ns: vec![3_000_000_000],
            });
        });
        let metrics = calc.tick().await;

        let cpu = metrics.cpu.unwrap();
        assert_eq!(cpu.usage.total, Some(2.0));
        assert_eq!(cpu.usage.kernel, Some(0.5));
        assert_eq!(cpu.usage.user, Some(1.5));
        assert_eq!(cpu.usage.cores, vec![Some(2.0)]);
        assert!(cpu.percentage.is_some());
    }

    #[tokio::test]
    async fn test_memory_gauge_and_working_set() {
        let source = Arc::new(MockSource::default());
        source.set(|s| {
            s.memory = HostMemory { total_bytes: 10_000_000, free_bytes: 4_000_000 };
            s.ticks = vec![core(50, 50, 100)];
            s.memory_stat.insert("total_inactive_anon".into(), 1_000_000);
            s.memory_stat.insert("total_inactive_file".into(), 2_000_000);
        });

        let mut calc =
            HostCalculator::new(source, CpuSourcing::SchedulerTicks, true);
        let metrics = calc.tick().await;

        let memory = metrics.memory.unwrap();
        assert_eq!(memory.usage, 6_000_000);
        assert_eq!(memory.limit, 10_000_000);
        assert_eq!(memory.percentage, 60.0);
        // 6,000,000 - 1,000,000 - 2,000,000
        assert_eq!(memory.working_set, Some(3_000_000));
    }

    #[tokio::test]
    async fn test_memory_source_failure_suppresses_family() {
        let source = Arc::new(MockSource::default());
        source.set(|s| {
            s.fail_memory = true;
            s.ticks = vec![core(50, 50, 100)];
        });

        let mut calc =
            HostCalculator::new(source, CpuSourcing::SchedulerTicks, false);
        let metrics = calc.tick().await;

        assert!(metrics.memory.is_none());
        assert!(metrics.cpu.is_some());
    }

    #[tokio::test]
    async fn test_interface_failure_preserves_baseline() {
        let source = Arc::new(MockSource::default());
        source.set(|s| {
            s.memory = HostMemory { total_bytes: 10_000_000, free_bytes: 4_000_000 };
            s.ticks = vec![core(50, 50, 100)];
            s.interfaces = vec!["eth0".into()];
            s.counters.insert("eth0".into(), NetworkCounters { rx_bytes: 1000, ..Default::default() });
        });

        let mut calc =
            HostCalculator::new(Arc::clone(&source) as Arc<dyn HostCounterSource>, CpuSourcing::SchedulerTicks, false);
        calc.tick().await;

        // Tick 2: the read fails; no signal, baseline untouched
        source.set(|s| s.failing_interfaces.push("eth0".into()));
        let metrics = calc.tick().await;
        assert!(!metrics.networks.contains_key("eth0"));

        // Tick 3: the delta spans the gap (1000 -> 1500)
        source.set(|s| {
            s.failing_interfaces.clear();
            s.counters.insert("eth0".into(), NetworkCounters { rx_bytes: 1500, ..Default::default() });
        });
        let metrics = calc.tick().await;
        assert_eq!(metrics.networks["eth0"].rx_bytes, Some(500));
    }

    #[tokio::test]
    async fn test_partial_interface_failure_isolated() {
        let source = Arc::new(MockSource::default());
        source.set(|s| {
            s.memory = HostMemory { total_bytes: 10_000_000, free_bytes: 4_000_000 };
            s.ticks = vec![core(50, 50, 100)];
            s.interfaces = vec!["eth0".into(), "eth1".into()];
            s.counters.insert("eth0".into(), NetworkCounters { rx_bytes: 100, ..Default::default() });
            s.counters.insert("eth1".into(), NetworkCounters { rx_bytes: 200, ..Default::default() });
        });

        let mut calc =
            HostCalculator::new(Arc::clone(&source) as Arc<dyn HostCounterSource>, CpuSourcing::SchedulerTicks, false);
        calc.tick().await;

        source.set(|s| {
            s.failing_interfaces.push("eth0".into());
            s.counters.insert("eth1".into(), NetworkCounters { rx_bytes: 260, ..Default::default() });
        });
        let metrics = calc.tick().await;

        assert!(!metrics.networks.contains_key("eth0"));
        assert_eq!(metrics.networks["eth1"].rx_bytes, Some(60));
    }
}
