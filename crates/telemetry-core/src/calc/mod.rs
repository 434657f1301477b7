//! Per-entity metric calculators
//!
//! Two peer calculators share the same delta arithmetic: one consumes a
//! container's raw stats snapshot per tick, the other samples host-wide
//! counters. Each calculator instance owns the retained state for
//! exactly one entity; state is never shared across entities, and
//! dropping the calculator discards the state.

mod container;
mod host;

pub use container::ContainerCalculator;
pub use host::{CpuSourcing, HostCalculator};

use crate::models::{NetworkCounters, NetworkRates};
use crate::rate::CounterTracker;

/// Memory percentage with the divide-by-zero guard: an unset or
/// unbounded limit yields 0, not an error.
pub(crate) fn memory_percent(usage: u64, limit: u64) -> f64 {
    if limit == 0 {
        return 0.0;
    }
    usage as f64 / limit as f64 * 100.0
}

/// Working set: usage minus reclaimable inactive pages, anon first then
/// file, each subtraction clamped so the running value never drops
/// below zero.
pub(crate) fn working_set(usage: u64, inactive_anon: u64, inactive_file: u64) -> u64 {
    usage
        .saturating_sub(inactive_anon)
        .saturating_sub(inactive_file)
}

/// Observe per-core cumulative counters, sizing the tracker list to the
/// current sample. A core that appears grows a fresh tracker (its first
/// rate is suppressed); a core that disappears drops its tracker.
pub(crate) fn observe_cores(
    trackers: &mut Vec<CounterTracker>,
    current: &[u64],
    divisor: f64,
) -> Vec<Option<f64>> {
    trackers.resize_with(current.len(), CounterTracker::default);
    current
        .iter()
        .zip(trackers.iter_mut())
        .map(|(value, tracker)| tracker.update(*value).value().map(|d| d as f64 / divisor))
        .collect()
}

/// Retained cumulative counters for one network interface.
#[derive(Debug, Default)]
pub(crate) struct InterfaceTrackers {
    rx_bytes: CounterTracker,
    tx_bytes: CounterTracker,
    rx_errors: CounterTracker,
    tx_errors: CounterTracker,
}

impl InterfaceTrackers {
    /// Observe a new counter sample and produce this tick's rates.
    /// Network deltas are raw counts per interval, no unit conversion.
    pub(crate) fn observe(&mut self, counters: &NetworkCounters) -> NetworkRates {
        NetworkRates {
            rx_bytes: self.rx_bytes.update(counters.rx_bytes).value(),
            tx_bytes: self.tx_bytes.update(counters.tx_bytes).value(),
            rx_errors: self.rx_errors.update(counters.rx_errors).value(),
            tx_errors: self.tx_errors.update(counters.tx_errors).value(),
        }
    }
}
