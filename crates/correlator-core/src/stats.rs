// crates/correlator-core/src/stats.rs
// ============================================================================
// Module: Stats Collector
// Description: Lock-free running counters for the correlator's operational surface.
// Purpose: Give a host process a cheap, always-consistent snapshot of
// throughput and health without a metrics crate.
// Dependencies: std::sync::atomic, serde
// ============================================================================

//! ## Overview
//! [`Stats`] holds one [`AtomicU64`] per counter. Every counter is
//! monotonically increasing except `events_in_memory`, which tracks the
//! window store's current size as a gauge. A snapshot
//! ([`Stats::snapshot`]) is a plain struct suitable for the `stats` CLI
//! subcommand or for serializing into an operator-facing log line — this is
//! the correlator's entire metrics surface; there is no separate metrics
//! crate dependency.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use serde::Serialize;

// ============================================================================
// SECTION: Stats
// ============================================================================

/// Running operational counters for one correlator instance.
#[derive(Debug, Default)]
pub struct Stats {
    events_processed: AtomicU64,
    events_rejected: AtomicU64,
    rules_evaluated: AtomicU64,
    correlations_found: AtomicU64,
    alerts_generated: AtomicU64,
    alerts_dropped: AtomicU64,
    events_in_memory: AtomicU64,
}

impl Stats {
    /// Builds a zeroed counter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one successfully admitted event.
    pub fn record_event_processed(&self) {
        self.events_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one event dropped for failing schema validation.
    pub fn record_event_rejected(&self) {
        self.events_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one rule evaluation pass (whether or not it triggered).
    pub fn record_rule_evaluated(&self) {
        self.rules_evaluated.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one rule firing (a satisfied decision graph).
    pub fn record_correlation_found(&self) {
        self.correlations_found.fetch_add(1, Ordering::Relaxed);
    }

    /// Records `count` alerts successfully handed to at least one sink.
    pub fn record_alerts_generated(&self, count: u64) {
        self.alerts_generated.fetch_add(count, Ordering::Relaxed);
    }

    /// Records `count` alert deliveries dropped by degraded or failing sinks.
    pub fn record_alerts_dropped(&self, count: u64) {
        self.alerts_dropped.fetch_add(count, Ordering::Relaxed);
    }

    /// Sets the current window-store size gauge.
    pub fn set_events_in_memory(&self, count: u64) {
        self.events_in_memory.store(count, Ordering::Relaxed);
    }

    /// Takes a consistent-enough point-in-time snapshot of every counter.
    ///
    /// Individual counters are read independently, so a snapshot taken
    /// concurrently with updates may observe a torn combination (e.g.
    /// `correlations_found` incremented but `alerts_generated` not yet);
    /// this is acceptable for an operational dashboard and never affects
    /// evaluation correctness.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            events_processed: self.events_processed.load(Ordering::Relaxed),
            events_rejected: self.events_rejected.load(Ordering::Relaxed),
            rules_evaluated: self.rules_evaluated.load(Ordering::Relaxed),
            correlations_found: self.correlations_found.load(Ordering::Relaxed),
            alerts_generated: self.alerts_generated.load(Ordering::Relaxed),
            alerts_dropped: self.alerts_dropped.load(Ordering::Relaxed),
            events_in_memory: self.events_in_memory.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of [`Stats`], suitable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Total events successfully admitted.
    pub events_processed: u64,
    /// Total events dropped for failing schema validation.
    pub events_rejected: u64,
    /// Total rule evaluation passes run.
    pub rules_evaluated: u64,
    /// Total rule firings (satisfied decision graphs).
    pub correlations_found: u64,
    /// Total alert deliveries that succeeded on at least one sink.
    pub alerts_generated: u64,
    /// Total alert deliveries dropped by degraded or failing sinks.
    pub alerts_dropped: u64,
    /// Current number of events retained in the window store.
    pub events_in_memory: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_recorded_counters() {
        let stats = Stats::new();
        stats.record_event_processed();
        stats.record_event_processed();
        stats.record_event_rejected();
        stats.record_rule_evaluated();
        stats.record_correlation_found();
        stats.record_alerts_generated(2);
        stats.record_alerts_dropped(1);
        stats.set_events_in_memory(42);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.events_processed, 2);
        assert_eq!(snapshot.events_rejected, 1);
        assert_eq!(snapshot.rules_evaluated, 1);
        assert_eq!(snapshot.correlations_found, 1);
        assert_eq!(snapshot.alerts_generated, 2);
        assert_eq!(snapshot.alerts_dropped, 1);
        assert_eq!(snapshot.events_in_memory, 42);
    }
}
