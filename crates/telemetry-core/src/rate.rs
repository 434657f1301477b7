//! Rate/delta primitive for cumulative counters
//!
//! All rate-of-change signals in this crate go through [`CounterTracker`]:
//! it retains the previous cumulative value and classifies each new
//! observation as a first sample, a counter reset, or a usable delta.
//! The tracker is unit-agnostic; callers divide the raw delta by the
//! conversion factor for their counter family (nanoseconds for CPU
//! time, none for network byte/error counters).

/// Nanoseconds per second, the divisor for cumulative CPU-time counters.
pub const NANOS_PER_SEC: f64 = 1_000_000_000.0;

/// Scheduler ticks (USER_HZ) per second, the divisor for /proc/stat jiffies.
pub const SCHED_TICKS_PER_SEC: f64 = 100.0;

/// Outcome of observing a new cumulative value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delta {
    /// No previous value was retained; callers must suppress emission
    /// rather than fabricate a rate from zero.
    First,
    /// The counter went backwards (restart or wrap). The new value has
    /// been adopted as the baseline; this tick's emission is suppressed.
    Reset,
    /// A usable non-negative delta since the previous observation.
    Step(u64),
}

impl Delta {
    /// The raw delta, or `None` when emission must be suppressed.
    pub fn value(self) -> Option<u64> {
        match self {
            Delta::Step(v) => Some(v),
            Delta::First | Delta::Reset => None,
        }
    }

    /// The delta interpreted as nanoseconds of CPU time, in seconds.
    pub fn seconds(self) -> Option<f64> {
        self.value().map(|v| v as f64 / NANOS_PER_SEC)
    }
}

/// Retains one previous cumulative value for a single counter.
#[derive(Debug, Clone, Default)]
pub struct CounterTracker {
    previous: Option<u64>,
}

impl CounterTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a baseline has been observed yet.
    pub fn has_baseline(&self) -> bool {
        self.previous.is_some()
    }

    /// Observe a new cumulative value and replace the baseline.
    ///
    /// The baseline is read and replaced in one step, so a rate can
    /// never be computed against a partially-updated value.
    pub fn update(&mut self, current: u64) -> Delta {
        let delta = match self.previous {
            None => Delta::First,
            Some(prev) if current < prev => Delta::Reset,
            Some(prev) => Delta::Step(current - prev),
        };
        self.previous = Some(current);
        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_observation_suppressed() {
        let mut tracker = CounterTracker::new();
        assert!(!tracker.has_baseline());
        assert_eq!(tracker.update(1000), Delta::First);
        assert!(tracker.has_baseline());
        assert_eq!(Delta::First.value(), None);
    }

    #[test]
    fn test_monotonic_delta() {
        let mut tracker = CounterTracker::new();
        tracker.update(1000);
        assert_eq!(tracker.update(1500), Delta::Step(500));
        assert_eq!(tracker.update(1500), Delta::Step(0));
    }

    #[test]
    fn test_reset_suppresses_and_rebaselines() {
        let mut tracker = CounterTracker::new();
        tracker.update(1000);

        // Counter went backwards: no rate this tick, new baseline is 900
        assert_eq!(tracker.update(900), Delta::Reset);
        assert_eq!(tracker.update(950), Delta::Step(50));
    }

    #[test]
    fn test_nanosecond_scaling() {
        let mut tracker = CounterTracker::new();
        tracker.update(0);
        let delta = tracker.update(2_500_000_000);
        assert_eq!(delta.seconds(), Some(2.5));
        assert_eq!(Delta::Reset.seconds(), None);
    }
}
