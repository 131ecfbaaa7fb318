// crates/correlator-core/src/graph.rs
// ============================================================================
// Module: Decision Graph Recorder
// Description: Per-evaluation-pass record of which conditions matched, and why.
// Purpose: Make every rule firing (and every rule non-firing) explainable
// after the fact, without re-running the evaluator.
// Dependencies: serde, std::collections, crate::rule, crate::time
// ============================================================================

//! ## Overview
//! Every time the evaluator runs a rule against an arriving event, it
//! produces one [`DecisionGraph`]: the ordered record of each condition's
//! outcome, the partition it bound, and — when the rule did not fire — the
//! index of the first condition that failed. Graphs are retained in a
//! bounded [`DecisionGraphRing`] (oldest evicted first) so long-running
//! processes stay within a fixed memory budget, and can be exported as
//! Graphviz DOT via [`DecisionGraph::to_dot`] for operator-facing tooling.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::VecDeque;
use std::fmt::Write as _;

use serde::Deserialize;
use serde::Serialize;

use crate::event::Event;
use crate::rule::CountPredicate;
use crate::time::EventTime;

// ============================================================================
// SECTION: Condition Result
// ============================================================================

/// The outcome of evaluating a single condition within one decision graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionResult {
    /// 0-based index of this condition within the rule.
    pub index: usize,
    /// Event type the condition bound against.
    pub event_type: String,
    /// Grouping key the bound partition matched, when `group_by` was set.
    pub group_key: Option<String>,
    /// Number of events in the qualifying partition after field filtering.
    pub count: usize,
    /// The condition's count threshold, for display.
    pub threshold: CountPredicate,
    /// Independent copies of every event bound into the qualifying
    /// partition, so the graph remains valid after the window store expires
    /// the originals.
    pub bound_events: Vec<Event>,
    /// Whether this condition's count threshold and temporal gates were met.
    pub satisfied: bool,
}

impl ConditionResult {
    /// Renders the threshold as `OP N` for display purposes (DOT labels,
    /// human-facing summaries).
    #[must_use]
    pub fn threshold_label(&self) -> String {
        let op = match self.threshold.op {
            crate::predicate::Comparator::GreaterOrEqual => ">=",
            crate::predicate::Comparator::GreaterThan => ">",
            crate::predicate::Comparator::Equal => "=",
            crate::predicate::Comparator::LessOrEqual => "<=",
            crate::predicate::Comparator::LessThan => "<",
        };
        format!("{op} {}", self.threshold.n)
    }
}

// ============================================================================
// SECTION: Decision Graph
// ============================================================================

/// One complete evaluation pass of a single rule against a single arriving
/// event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionGraph {
    /// The rule this evaluation pass belongs to.
    pub rule_id: String,
    /// The rule's human-readable name, copied at evaluation time.
    pub rule_name: String,
    /// An independent copy of the event whose admission triggered this
    /// evaluation pass.
    pub trigger_event: Event,
    /// When this evaluation pass ran.
    pub evaluated_at: EventTime,
    /// Per-condition outcomes, in rule order.
    pub conditions: Vec<ConditionResult>,
    /// Whether every condition was satisfied and the rule fired.
    pub triggered: bool,
    /// Index of the first unsatisfied condition, when `triggered` is `false`.
    pub failed_at_condition: Option<usize>,
}

impl DecisionGraph {
    /// Renders this decision graph as a Graphviz DOT digraph: a `rule` root
    /// node, one `condI` node per condition colored by match outcome, and a
    /// terminal `result` node reporting the overall verdict.
    #[must_use]
    pub fn to_dot(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "digraph CorrelationGraph {{");
        let _ = writeln!(out, "  rankdir=LR;");
        let _ = writeln!(out, "  node [shape=box, style=rounded];");

        let rule_label = format!("{}\\n{}", escape_label(&self.rule_id), escape_label(&self.rule_name));
        let _ = writeln!(out, "  rule [label=\"{rule_label}\", style=filled, fillcolor=lightblue];");

        for result in &self.conditions {
            let node = format!("cond{}", result.index.saturating_add(1));
            let fillcolor = if result.satisfied { "lightgreen" } else { "lightcoral" };
            let label = format!("Condition {}\\n{}", result.index.saturating_add(1), result.event_type);
            let _ = writeln!(
                out,
                "  {node} [label=\"{}\", style=filled, fillcolor={fillcolor}];",
                escape_label(&label)
            );
        }

        let (result_label, result_color) = if self.triggered {
            ("MATCHED\\nAlert Generated", "green")
        } else {
            ("NO MATCH", "red")
        };
        let _ =
            writeln!(out, "  result [shape=ellipse, label=\"{result_label}\", style=filled, fillcolor={result_color}];");

        let _ = write!(out, "  rule");
        for result in &self.conditions {
            let _ = write!(out, " -> cond{}", result.index.saturating_add(1));
        }
        let _ = writeln!(out, " -> result;");

        let _ = writeln!(out, "}}");
        out
    }
}

/// Escapes a string for safe embedding inside a DOT quoted label.
fn escape_label(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('"', "\\\"")
}

// ============================================================================
// SECTION: Decision Graph Ring
// ============================================================================

/// A bounded, oldest-evicted-first ring of recent decision graphs.
///
/// # Invariants
/// - `len() <= capacity` always holds; `push` evicts the oldest entry before
///   inserting when the ring is full.
#[derive(Debug)]
pub struct DecisionGraphRing {
    capacity: usize,
    entries: VecDeque<DecisionGraph>,
}

impl DecisionGraphRing {
    /// Builds a ring holding at most `capacity` graphs. A `capacity` of
    /// zero is accepted and simply discards every push.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity.min(1024)),
        }
    }

    /// Appends a decision graph, evicting the oldest entry first if full.
    pub fn push(&mut self, graph: DecisionGraph) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(graph);
    }

    /// Returns the graph at `index`, oldest-first, if present.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&DecisionGraph> {
        self.entries.get(index)
    }

    /// Iterates the ring, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &DecisionGraph> {
        self.entries.iter()
    }

    /// Number of graphs currently retained.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the ring currently holds no graphs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
