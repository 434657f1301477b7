//! Emission sinks
//!
//! The calculators produce structured per-tick results; this module
//! flattens them into named samples (`cpu.percentage`,
//! `memory.workingSet`, `networks.<iface>.rxBytesPerSecond`, ...) and
//! hands them to a write-only sink. Batching and transport belong to
//! the layer behind the sink, not to this crate.

use crate::models::{ContainerMetrics, CpuMetrics, HostMetrics, MemoryMetrics, NetworkRates};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// One named value for one entity and tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sample {
    /// Container id, or `host` for the host calculator.
    pub entity: String,
    /// Dotted signal name.
    pub signal: String,
    pub value: f64,
    pub timestamp: i64,
}

/// Write-only destination for derived samples.
#[async_trait]
pub trait MetricSink: Send + Sync {
    async fn emit(&self, sample: Sample) -> Result<()>;
}

/// Sink backed by a bounded channel; the receiving end belongs to the
/// transport layer.
pub struct ChannelSink {
    tx: mpsc::Sender<Sample>,
}

impl ChannelSink {
    pub fn new(buffer_size: usize) -> (Self, mpsc::Receiver<Sample>) {
        let (tx, rx) = mpsc::channel(buffer_size);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl MetricSink for ChannelSink {
    async fn emit(&self, sample: Sample) -> Result<()> {
        self.tx
            .send(sample)
            .await
            .map_err(|e| anyhow::anyhow!("sample channel closed: {}", e))
    }
}

/// Flatten one container tick into samples, skipping suppressed values.
pub fn container_samples(metrics: &ContainerMetrics) -> Vec<Sample> {
    flatten(
        &metrics.container_id,
        metrics.timestamp,
        metrics.cpu.as_ref(),
        metrics.memory.as_ref(),
        &metrics.networks,
    )
}

/// Flatten one host tick into samples, skipping suppressed values.
pub fn host_samples(metrics: &HostMetrics) -> Vec<Sample> {
    flatten(
        "host",
        metrics.timestamp,
        metrics.cpu.as_ref(),
        metrics.memory.as_ref(),
        &metrics.networks,
    )
}

fn flatten(
    entity: &str,
    timestamp: i64,
    cpu: Option<&CpuMetrics>,
    memory: Option<&MemoryMetrics>,
    networks: &std::collections::HashMap<String, NetworkRates>,
) -> Vec<Sample> {
    let mut samples = Vec::new();
    let mut push = |signal: String, value: f64| {
        samples.push(Sample {
            entity: entity.to_string(),
            signal,
            value,
            timestamp,
        });
    };

    if let Some(cpu) = cpu {
        if let Some(pct) = cpu.percentage {
            push("cpu.percentage".into(), pct);
        }
        if let Some(total) = cpu.usage.total {
            push("cpu.usagePerSecond".into(), total);
        }
        if let Some(kernel) = cpu.usage.kernel {
            push("cpu.kernelUsagePerSecond".into(), kernel);
        }
        if let Some(user) = cpu.usage.user {
            push("cpu.userUsagePerSecond".into(), user);
        }
        for (index, rate) in cpu.usage.cores.iter().enumerate() {
            if let Some(rate) = rate {
                push(format!("cpu.core{}.usagePerSecond", index), *rate);
            }
        }
    }

    if let Some(memory) = memory {
        push("memory.usage".into(), memory.usage as f64);
        push("memory.limit".into(), memory.limit as f64);
        push("memory.percentage".into(), memory.percentage);
        if let Some(working_set) = memory.working_set {
            push("memory.workingSet".into(), working_set as f64);
        }
    }

    for (interface, rates) in networks {
        let mut net = |name: &str, value: Option<u64>| {
            if let Some(value) = value {
                push(format!("networks.{}.{}", interface, name), value as f64);
            }
        };
        net("rxBytesPerSecond", rates.rx_bytes);
        net("txBytesPerSecond", rates.tx_bytes);
        net("rxErrorsPerSecond", rates.rx_errors);
        net("txErrorsPerSecond", rates.tx_errors);
    }

    samples
}
