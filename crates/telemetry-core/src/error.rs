//! Error taxonomy for the derivation core
//!
//! Failures inside the core are local by design: a missing field or an
//! unreadable counter file degrades the affected signal for one tick
//! and nothing else. Counter resets and zero divisors are not errors
//! at all (they have defined results), so they do not appear here.

use thiserror::Error;

/// Per-tick, per-metric-family failure
#[derive(Debug, Error)]
pub enum MetricsError {
    /// A raw snapshot lacks a field the metric family cannot do without
    #[error("snapshot missing required field `{0}`")]
    MissingField(&'static str),

    /// An external counter read (pseudo-file, syscall) failed
    #[error("counter source unavailable: {0}")]
    SourceUnavailable(anyhow::Error),
}

impl From<anyhow::Error> for MetricsError {
    fn from(err: anyhow::Error) -> Self {
        MetricsError::SourceUnavailable(err)
    }
}
