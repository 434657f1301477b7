//! Observability for the derivation core
//!
//! Prometheus counters for tick throughput and the silent-degradation
//! paths (skipped families, suppressed signals, source read errors).
//! Exposition is owned by the surrounding layer; this module only
//! registers and updates the metrics.

use prometheus::{register_int_counter, register_int_gauge, IntCounter, IntGauge};
use std::sync::OnceLock;

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<CoreMetricsInner> = OnceLock::new();

struct CoreMetricsInner {
    host_ticks: IntCounter,
    container_ticks: IntCounter,
    family_errors: IntCounter,
    emit_errors: IntCounter,
    entities_tracked: IntGauge,
}

impl CoreMetricsInner {
    fn new() -> Self {
        Self {
            host_ticks: register_int_counter!(
                "telemetry_agent_host_ticks_total",
                "Host calculation ticks completed"
            )
            .expect("Failed to register host_ticks_total"),

            container_ticks: register_int_counter!(
                "telemetry_agent_container_ticks_total",
                "Container calculation ticks completed"
            )
            .expect("Failed to register container_ticks_total"),

            family_errors: register_int_counter!(
                "telemetry_agent_family_errors_total",
                "Metric families skipped for a tick due to missing or unreadable inputs"
            )
            .expect("Failed to register family_errors_total"),

            emit_errors: register_int_counter!(
                "telemetry_agent_emit_errors_total",
                "Samples that could not be handed to the sink"
            )
            .expect("Failed to register emit_errors_total"),

            entities_tracked: register_int_gauge!(
                "telemetry_agent_entities_tracked",
                "Entities with live calculator state"
            )
            .expect("Failed to register entities_tracked"),
        }
    }
}

/// Lightweight handle to the global metrics instance.
#[derive(Clone)]
pub struct CoreMetrics {
    _private: (),
}

impl Default for CoreMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl CoreMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(CoreMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &CoreMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn inc_host_ticks(&self) {
        self.inner().host_ticks.inc();
    }

    pub fn inc_container_ticks(&self) {
        self.inner().container_ticks.inc();
    }

    pub fn inc_family_errors(&self, count: u64) {
        self.inner().family_errors.inc_by(count);
    }

    pub fn inc_emit_errors(&self) {
        self.inner().emit_errors.inc();
    }

    pub fn set_entities_tracked(&self, count: i64) {
        self.inner().entities_tracked.set(count);
    }
}
