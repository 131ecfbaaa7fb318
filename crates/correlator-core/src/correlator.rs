// crates/correlator-core/src/correlator.rs
// ============================================================================
// Module: Correlator
// Description: Top-level admit/evaluate/emit/expire pipeline.
// Purpose: Compose the window store, rule evaluator, decision graph ring,
// alert generator, and stats collector into the single entry point a host
// process drives one event at a time.
// Dependencies: crate::window, crate::evaluator, crate::graph, crate::alert,
// crate::stats, crate::rule, crate::event
// ============================================================================

//! ## Overview
//! [`Correlator`] is the engine's only public entry point for event
//! admission. [`Correlator::admit`] runs a four-phase pipeline for every
//! arriving event:
//!
//! 1. **admit** — parse and admit the event into the window store
//! 2. **evaluate** — run every loaded rule's evaluator pass, recording a
//!    decision graph for each
//! 3. **emit** — for every triggered rule, build an alert and fan it out
//! 4. **expire** — drop events past the retention window
//!
//! A host (the CLI, or any embedding process) owns the wall clock and event
//! source; `correlator-core` never reads either directly, so a replay of
//! the same events with the same timestamps always produces the same
//! decision graphs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::rc::Rc;
use std::time::Instant;

use serde_json::Value;

use crate::alert::Alert;
use crate::alert::AlertGenerator;
use crate::alert::AlertRing;
use crate::alert::AlertSink;
use crate::error::EventSchemaError;
use crate::error::ShutdownDeadlineExceeded;
use crate::event::Event;
use crate::evaluator::RuleEvaluator;
use crate::graph::DecisionGraph;
use crate::graph::DecisionGraphRing;
use crate::rule::Rule;
use crate::stats::Stats;
use crate::stats::StatsSnapshot;
use crate::time::EventTime;
use crate::window::WindowStore;

// ============================================================================
// SECTION: Admit Outcome
// ============================================================================

/// The result of admitting a single raw event.
#[derive(Debug)]
pub enum AdmitOutcome {
    /// The event failed schema validation and was dropped before reaching
    /// the window store.
    Rejected(EventSchemaError),
    /// The event was admitted and every loaded rule was evaluated against
    /// it.
    Admitted {
        /// One decision graph per loaded rule, in rule-load order.
        graphs: Vec<DecisionGraph>,
        /// Total successful alert deliveries across every triggered rule.
        alerts_delivered: usize,
        /// Total alert deliveries dropped by degraded or failing sinks.
        alerts_dropped: usize,
    },
}

// ============================================================================
// SECTION: Correlator
// ============================================================================

/// The temporal event correlation engine.
///
/// # Invariants
/// - `admit` is the only path by which state changes; there is no background
///   thread or timer inside `correlator-core` (Non-goal: no built-in scheduling).
/// - Rule evaluation order is the order `rules` were loaded in; decision
///   graphs for one event are produced in that same order.
pub struct Correlator {
    window_store: WindowStore,
    rules: Vec<Rule>,
    evaluator: RuleEvaluator,
    decision_ring: DecisionGraphRing,
    alert_generator: AlertGenerator,
    alert_ring: AlertRing,
    stats: Stats,
    retention_secs: u64,
    default_confidence: f64,
}

impl Correlator {
    /// Builds a correlator with a loaded, already-validated rule set.
    #[must_use]
    pub fn new(
        rules: Vec<Rule>,
        max_decision_graphs: usize,
        max_alerts_in_memory: usize,
        retention_secs: u64,
        default_confidence: f64,
    ) -> Self {
        Self {
            window_store: WindowStore::new(),
            rules,
            evaluator: RuleEvaluator::new(),
            decision_ring: DecisionGraphRing::new(max_decision_graphs),
            alert_generator: AlertGenerator::new(),
            alert_ring: AlertRing::new(max_alerts_in_memory),
            stats: Stats::new(),
            retention_secs,
            default_confidence,
        }
    }

    /// Registers an alert delivery sink. Sinks are fanned out to in
    /// registration order.
    pub fn register_sink(&mut self, sink: Box<dyn AlertSink>) {
        self.alert_generator.register(sink);
    }

    /// Replaces the loaded rule set, for the `reload-rules` operation. Takes
    /// effect on the very next `admit` call; in-flight evaluation is never
    /// interrupted because `admit` runs rule evaluation synchronously to
    /// completion before returning.
    pub fn reload_rules(&mut self, rules: Vec<Rule>) {
        self.rules = rules;
    }

    /// Admits one raw event and runs the full admit/evaluate/emit/expire
    /// pipeline.
    ///
    /// `ingest_time` is used both as the evaluation instant `now` and as the
    /// fallback timestamp for events whose wire timestamp is missing or
    /// non-finite; the host supplies it so replays are deterministic.
    pub fn admit(&mut self, raw_event: &Value, ingest_time: EventTime) -> AdmitOutcome {
        let event = match Event::from_json(raw_event, ingest_time) {
            Ok(event) => event,
            Err(schema_error) => {
                self.stats.record_event_rejected();
                return AdmitOutcome::Rejected(schema_error);
            }
        };

        let trigger_event = event.clone();
        let now = event.timestamp;
        self.window_store.admit(Rc::new(event));
        self.stats.record_event_processed();

        let mut graphs = Vec::with_capacity(self.rules.len());
        let mut alerts_generated = 0_usize;
        let mut alerts_delivered = 0_usize;
        let mut alerts_dropped = 0_usize;

        for rule in &self.rules {
            self.stats.record_rule_evaluated();
            let graph = self
                .evaluator
                .evaluate(rule, &self.window_store, &trigger_event, now);

            if graph.triggered {
                self.stats.record_correlation_found();
                let bound_events = graph.conditions.iter().map(|c| c.bound_events.clone()).collect();
                let alert = Alert::from_rule_firing(
                    rule,
                    now,
                    trigger_event.clone(),
                    bound_events,
                    self.default_confidence,
                );
                alerts_generated += 1;
                let outcome = self.alert_generator.dispatch(&alert);
                alerts_delivered += outcome.delivered;
                alerts_dropped += outcome.dropped;
                self.alert_ring.push(alert);
            }

            graphs.push(graph);
        }

        for graph in &graphs {
            self.decision_ring.push(graph.clone());
        }

        self.window_store.expire(now, self.retention_secs);
        #[allow(
            clippy::cast_possible_truncation,
            reason = "window store sizes fit comfortably in a u64 gauge"
        )]
        self.stats.set_events_in_memory(self.window_store.len() as u64);

        if alerts_generated > 0 {
            #[allow(
                clippy::cast_possible_truncation,
                reason = "per-event alert counts fit comfortably in a u64 counter"
            )]
            self.stats.record_alerts_generated(alerts_generated as u64);
        }
        if alerts_dropped > 0 {
            #[allow(
                clippy::cast_possible_truncation,
                reason = "per-event alert counts fit comfortably in a u64 counter"
            )]
            self.stats.record_alerts_dropped(alerts_dropped as u64);
        }

        AdmitOutcome::Admitted {
            graphs,
            alerts_delivered,
            alerts_dropped,
        }
    }

    /// Drains `pending` raw events (paired with their ingest times), one
    /// `admit` call per event, until either the iterator is exhausted or
    /// `deadline` passes. On a deadline hit, the remaining unread events are
    /// reported as discarded rather than partially processed.
    ///
    /// # Errors
    ///
    /// Returns [`ShutdownDeadlineExceeded`] when `deadline` is reached
    /// before the iterator is exhausted.
    pub fn drain_with_deadline<I>(&mut self, pending: I, deadline: Instant) -> Result<usize, ShutdownDeadlineExceeded>
    where
        I: IntoIterator<Item = (Value, EventTime)>,
    {
        let mut iter = pending.into_iter();
        let mut processed = 0_usize;
        for (raw, ingest_time) in iter.by_ref() {
            if Instant::now() >= deadline {
                let remaining = iter.count() + 1;
                return Err(ShutdownDeadlineExceeded {
                    remaining_events: remaining,
                });
            }
            let _ = self.admit(&raw, ingest_time);
            processed += 1;
        }
        Ok(processed)
    }

    /// Returns a point-in-time snapshot of operational counters.
    #[must_use]
    pub fn stats_snapshot(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Returns the ring of retained decision graphs, oldest first.
    #[must_use]
    pub fn decision_graphs(&self) -> &DecisionGraphRing {
        &self.decision_ring
    }

    /// Returns the ring of recently generated alerts, oldest first.
    #[must_use]
    pub fn recent_alerts(&self) -> &AlertRing {
        &self.alert_ring
    }

    /// Number of rules currently loaded.
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}
