//! Run metrics shared across concurrently executing orchestrations

use crate::orchestrator::config::Pattern;
use crate::types::RunStatus;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Counters for one slice of runs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunCounters {
    /// Total runs recorded
    pub runs: u64,
    /// Runs with status `SUCCESS`
    pub successes: u64,
    /// Runs with status `PARTIAL`
    pub partials: u64,
    /// Runs with status `FAILURE`
    pub failures: u64,
    /// Runs with status `TIMEOUT`
    pub timeouts: u64,
    /// Cumulative wall-clock time
    pub total_duration_ms: u64,
    /// Mean wall-clock time per run
    pub average_duration_ms: f64,
}

impl RunCounters {
    fn record(&mut self, status: RunStatus, duration_ms: u64) {
        self.runs += 1;
        match status {
            RunStatus::Success => self.successes += 1,
            RunStatus::Partial => self.partials += 1,
            RunStatus::Failure => self.failures += 1,
            RunStatus::Timeout => self.timeouts += 1,
        }
        self.total_duration_ms += duration_ms;
        self.average_duration_ms = self.total_duration_ms as f64 / self.runs as f64;
    }

    /// Fraction of runs that fully succeeded
    pub fn success_rate(&self) -> f64 {
        if self.runs == 0 {
            0.0
        } else {
            self.successes as f64 / self.runs as f64
        }
    }
}

/// Point-in-time copy of all counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Counters across every run
    pub totals: RunCounters,
    /// Counters per orchestrator name
    pub by_orchestrator: BTreeMap<String, RunCounters>,
    /// Counters per pattern
    pub by_pattern: BTreeMap<Pattern, RunCounters>,
}

/// Accumulates run outcomes
///
/// Writes are serialized behind a lock; `snapshot` returns an owned copy so
/// readers never observe a half-applied update.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    inner: RwLock<MetricsSnapshot>,
}

impl MetricsCollector {
    /// Create an empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one finished run
    pub fn record(&self, orchestrator: &str, pattern: Pattern, status: RunStatus, duration: Duration) {
        let duration_ms = duration.as_millis() as u64;
        let mut inner = self.inner.write();
        inner.totals.record(status, duration_ms);
        inner
            .by_orchestrator
            .entry(orchestrator.to_string())
            .or_default()
            .record(status, duration_ms);
        inner.by_pattern.entry(pattern).or_default().record(status, duration_ms);
    }

    /// Copy of the current counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner.read().clone()
    }

    /// Counters for one orchestrator
    pub fn counters_for(&self, orchestrator: &str) -> Option<RunCounters> {
        self.inner.read().by_orchestrator.get(orchestrator).cloned()
    }

    /// Clear all counters
    pub fn reset(&self) {
        *self.inner.write() = MetricsSnapshot::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_updates_every_slice() {
        let metrics = MetricsCollector::new();
        metrics.record("a", Pattern::Sequential, RunStatus::Success, Duration::from_millis(10));
        metrics.record("a", Pattern::Sequential, RunStatus::Partial, Duration::from_millis(30));
        metrics.record("b", Pattern::Group, RunStatus::Timeout, Duration::from_millis(50));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.totals.runs, 3);
        assert_eq!(snapshot.totals.timeouts, 1);
        assert_eq!(snapshot.totals.total_duration_ms, 90);

        let a = &snapshot.by_orchestrator["a"];
        assert_eq!((a.runs, a.successes, a.partials), (2, 1, 1));
        assert_eq!(a.average_duration_ms, 20.0);
        assert_eq!(a.success_rate(), 0.5);
        assert_eq!(snapshot.by_pattern[&Pattern::Group].timeouts, 1);
    }

    #[test]
    fn test_snapshot_is_stable_between_records() {
        let metrics = MetricsCollector::new();
        metrics.record("a", Pattern::Concurrent, RunStatus::Failure, Duration::from_millis(5));
        assert_eq!(metrics.snapshot(), metrics.snapshot());
    }

    #[test]
    fn test_reset_clears_counters() {
        let metrics = MetricsCollector::new();
        metrics.record("a", Pattern::Handoff, RunStatus::Success, Duration::from_millis(5));
        metrics.reset();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
        assert!(metrics.counters_for("a").is_none());
    }
}
