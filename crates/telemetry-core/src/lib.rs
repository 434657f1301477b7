//! Telemetry derivation core
//!
//! Converts raw, cumulative container and host statistics into
//! normalized per-interval signals:
//! - a rate/delta primitive that handles first observations and
//!   counter resets
//! - a container calculator (CPU percentage, memory pressure and
//!   working set, network rates) fed by runtime stats snapshots
//! - a host calculator with capability-selected CPU sourcing
//!   (scheduler ticks or cgroup aggregate counters)
//! - pseudo-file counter sources, emission sinks, and the tick driver
//!
//! Discovery, naming/registration, and transport of the resulting
//! series belong to the surrounding framework, not to this crate.

pub mod calc;
pub mod driver;
pub mod error;
pub mod models;
pub mod observability;
pub mod rate;
pub mod sink;
pub mod source;

pub use calc::{ContainerCalculator, CpuSourcing, HostCalculator};
pub use driver::{DriverConfig, SnapshotEvent, TickDriver, TickDriverBuilder};
pub use error::MetricsError;
pub use models::*;
pub use observability::CoreMetrics;
pub use rate::{CounterTracker, Delta, NANOS_PER_SEC};
pub use sink::{container_samples, host_samples, ChannelSink, MetricSink, Sample};
pub use source::{HostCounterSource, LinuxCounterSource};
