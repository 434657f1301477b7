//! Tick driver
//!
//! Owns the per-entity calculators and runs the fixed-interval loop:
//! the host calculator is sampled once per tick, while container
//! snapshots arrive from an external feed channel (the stats
//! subscription itself lives outside this crate) and are routed to
//! per-container calculators. Per-entity failures degrade locally and
//! never stop the loop.

use crate::calc::{ContainerCalculator, HostCalculator};
use crate::models::ContainerStats;
use crate::observability::CoreMetrics;
use crate::sink::{container_samples, host_samples, MetricSink, Sample};
use anyhow::Result;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::interval;
use tracing::{debug, info, warn};

/// Events delivered by the external snapshot feed.
#[derive(Debug)]
pub enum SnapshotEvent {
    /// A new raw stats snapshot for a container.
    Stats {
        container_id: String,
        stats: ContainerStats,
    },
    /// The container stopped; its calculator state is discarded.
    Removed { container_id: String },
}

/// Configuration for the tick driver.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Fixed tick interval (default: 1 second).
    pub interval: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
        }
    }
}

/// Drives the calculators once per tick and emits their samples.
pub struct TickDriver {
    host: Option<HostCalculator>,
    containers: DashMap<String, ContainerCalculator>,
    sink: Arc<dyn MetricSink>,
    metrics: CoreMetrics,
    config: DriverConfig,
}

impl TickDriver {
    /// Run until the feed closes or shutdown is signalled.
    pub async fn run(
        mut self,
        mut feed: mpsc::Receiver<SnapshotEvent>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        info!(
            interval_ms = self.config.interval.as_millis() as u64,
            host = self.host.is_some(),
            "Starting tick driver"
        );

        let mut ticker = interval(self.config.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.host_tick().await;
                }
                event = feed.recv() => {
                    match event {
                        Some(SnapshotEvent::Stats { container_id, stats }) => {
                            self.container_tick(container_id, &stats).await;
                        }
                        Some(SnapshotEvent::Removed { container_id }) => {
                            self.remove_container(&container_id);
                        }
                        None => {
                            info!("Snapshot feed closed, stopping tick driver");
                            break;
                        }
                    }
                }
                _ = shutdown.recv() => {
                    info!("Shutting down tick driver");
                    break;
                }
            }
        }
    }

    async fn host_tick(&mut self) {
        let host = match self.host.as_mut() {
            Some(host) => host,
            None => return,
        };

        let metrics = host.tick().await;
        self.metrics.inc_host_ticks();
        self.count_family_gaps(metrics.cpu.is_none(), metrics.memory.is_none());
        self.emit_all(host_samples(&metrics)).await;
    }

    async fn container_tick(&self, container_id: String, stats: &ContainerStats) {
        // Scope the map guard to the synchronous calculation; emission
        // must not hold it across an await
        let metrics = {
            let mut calc = self
                .containers
                .entry(container_id.clone())
                .or_insert_with(|| ContainerCalculator::new(container_id));
            calc.tick(stats)
        };

        self.metrics.inc_container_ticks();
        self.metrics.set_entities_tracked(self.containers.len() as i64);
        self.count_family_gaps(metrics.cpu.is_none(), metrics.memory.is_none());
        self.emit_all(container_samples(&metrics)).await;
    }

    fn remove_container(&self, container_id: &str) {
        if self.containers.remove(container_id).is_some() {
            debug!(container_id = %container_id, "Dropped calculator state for stopped container");
        }
        self.metrics.set_entities_tracked(self.containers.len() as i64);
    }

    fn count_family_gaps(&self, cpu_missing: bool, memory_missing: bool) {
        let gaps = cpu_missing as u64 + memory_missing as u64;
        if gaps > 0 {
            self.metrics.inc_family_errors(gaps);
        }
    }

    async fn emit_all(&self, samples: Vec<Sample>) {
        for sample in samples {
            if let Err(e) = self.sink.emit(sample).await {
                warn!(error = %e, "Failed to emit sample");
                self.metrics.inc_emit_errors();
            }
        }
    }

    /// Number of containers with live calculator state.
    pub fn tracked_containers(&self) -> usize {
        self.containers.len()
    }
}

/// Builder for the tick driver.
pub struct TickDriverBuilder {
    host: Option<HostCalculator>,
    sink: Option<Arc<dyn MetricSink>>,
    config: DriverConfig,
}

impl TickDriverBuilder {
    pub fn new() -> Self {
        Self {
            host: None,
            sink: None,
            config: DriverConfig::default(),
        }
    }

    /// Attach a host calculator; without one the driver handles
    /// container snapshots only.
    pub fn host(mut self, host: HostCalculator) -> Self {
        self.host = Some(host);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn MetricSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    pub fn build(self) -> Result<TickDriver> {
        let sink = self
            .sink
            .ok_or_else(|| anyhow::anyhow!("Sink is required"))?;

        Ok(TickDriver {
            host: self.host,
            containers: DashMap::new(),
            sink,
            metrics: CoreMetrics::new(),
            config: self.config,
        })
    }
}

impl Default for TickDriverBuilder {
    fn default() -> Self {
        Self::new()
    }
}
