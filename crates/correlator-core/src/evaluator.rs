// crates/correlator-core/src/evaluator.rs
// ============================================================================
// Module: Rule Evaluator
// Description: Left-to-right condition evaluation against the window store.
// Purpose: Turn one admitted event into, for each rule, a single decision
// graph describing whether the rule fired and why.
// Dependencies: crate::window, crate::predicate, crate::rule, crate::graph
// ============================================================================

//! ## Overview
//! [`RuleEvaluator::evaluate`] runs a single rule's condition sequence
//! against the current window store. Conditions are evaluated strictly
//! left to right; the first unsatisfied condition stops the pass (there is
//! no value in reporting conditions that were never reached). Each
//! condition bakes three filters on top of its raw window slice, applied in
//! order:
//!
//! 1. field filters (from [`crate::predicate::evaluate`])
//! 2. `same_user`, restricting to the user bound by an earlier condition
//! 3. `after_previous` / `within`, restricting to events that postdate the
//!    previous condition's bound partition
//!
//! The surviving events are partitioned by `group_by` (or left as one
//! partition when `group_by` is empty); the count predicate is evaluated
//! per partition, and among partitions that satisfy it, the evaluator picks
//! the one with the latest maximum timestamp, breaking remaining ties by
//! lexicographically smallest group key. This is a minimum bound: every
//! qualifying event in the winning partition is retained, not just enough
//! to clear the threshold.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::rc::Rc;

use crate::event::Event;
use crate::event::EventType;
use crate::graph::ConditionResult;
use crate::graph::DecisionGraph;
use crate::predicate;
use crate::rule::Condition;
use crate::rule::Rule;
use crate::time::EventTime;
use crate::window::WindowStore;

// ============================================================================
// SECTION: Evaluator
// ============================================================================

/// Stateless evaluator: every method is a pure function of its arguments.
#[derive(Debug, Default)]
pub struct RuleEvaluator;

impl RuleEvaluator {
    /// Builds an evaluator. Carries no state; condition-to-condition
    /// context lives in [`EvalContext`] for the duration of one pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Evaluates `rule` against `window_store` as of `now`, returning a
    /// complete decision graph. `trigger_event` is copied into the graph
    /// verbatim so the trace remains valid after the window store expires
    /// the original.
    #[must_use]
    pub fn evaluate(
        &self,
        rule: &Rule,
        window_store: &WindowStore,
        trigger_event: &Event,
        now: EventTime,
    ) -> DecisionGraph {
        let mut context = EvalContext::default();
        let mut results = Vec::with_capacity(rule.conditions.len());
        let mut failed_at = None;

        for (index, condition) in rule.conditions.iter().enumerate() {
            let (mut result, winning_partition) = evaluate_condition(condition, window_store, now, &context);
            result.index = index;
            let satisfied = result.satisfied;
            results.push(result);

            if !satisfied {
                failed_at = Some(index);
                break;
            }

            if context.bound_user.is_none() {
                context.bound_user = winning_partition.first().and_then(|e| e.user.clone());
            }
            context.previous_latest_timestamp = winning_partition.iter().map(|e| e.timestamp).max();
        }

        DecisionGraph {
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            trigger_event: trigger_event.clone(),
            evaluated_at: now,
            conditions: results,
            triggered: failed_at.is_none(),
            failed_at_condition: failed_at,
        }
    }
}

/// Condition-to-condition state threaded through one evaluation pass.
#[derive(Debug, Default)]
struct EvalContext {
    /// The `user` of the first event bound by the first satisfied condition
    /// in this pass (spec §3: "the `user` value of the first bound event
    /// from C₁ … Cᵢ₋₁"). Set once and never overwritten.
    bound_user: Option<String>,
    /// Latest timestamp among the most recently satisfied condition's
    /// bound partition, for `after_previous`/`within` gating.
    previous_latest_timestamp: Option<EventTime>,
}

/// Evaluates a single condition, returning its recorded result plus the
/// events in the winning (or best-candidate, if unsatisfied) partition.
fn evaluate_condition(
    condition: &Condition,
    window_store: &WindowStore,
    now: EventTime,
    context: &EvalContext,
) -> (ConditionResult, Vec<Rc<Event>>) {
    let event_type = EventType::parse(&condition.event_type);
    let slice = window_store.slice(&event_type, now, condition.window_secs);

    let mut candidates: Vec<Rc<Event>> = slice
        .into_iter()
        .filter(|event| condition.field_filters.iter().all(|p| predicate::evaluate(p, event)))
        .collect();

    if condition.same_user {
        if let Some(bound_user) = &context.bound_user {
            candidates.retain(|event| event.user.as_deref() == Some(bound_user.as_str()));
        }
    }

    if condition.after_previous {
        if let Some(previous_latest) = context.previous_latest_timestamp {
            candidates.retain(|event| event.timestamp.seconds_since(previous_latest) > 0);
            if let Some(within_secs) = condition.within_secs {
                #[allow(
                    clippy::cast_possible_wrap,
                    reason = "within windows are small, bounded configuration values"
                )]
                let within_secs = within_secs as i64;
                candidates.retain(|event| event.timestamp.seconds_since(previous_latest) <= within_secs);
            }
        }
    }

    let partitions = partition_events(candidates, &condition.group_by);
    let (winning_key, winning_events, satisfied) = select_partition(partitions, condition);

    let result = ConditionResult {
        index: 0,
        event_type: condition.event_type.clone(),
        group_key: winning_key,
        count: winning_events.len(),
        threshold: condition.count,
        bound_events: winning_events.iter().map(|e| (**e).clone()).collect(),
        satisfied,
    };

    (result, winning_events)
}

/// Groups candidate events by the string-rendered tuple of their `group_by`
/// field values. An empty `group_by` yields a single partition keyed by an
/// empty string.
fn partition_events(candidates: Vec<Rc<Event>>, group_by: &[String]) -> BTreeMap<String, Vec<Rc<Event>>> {
    let mut partitions: BTreeMap<String, Vec<Rc<Event>>> = BTreeMap::new();
    for event in candidates {
        let key = partition_key(&event, group_by);
        partitions.entry(key).or_default().push(event);
    }
    partitions
}

/// Renders a partition key as `field=value|field=value`, in `group_by`
/// order; a missing field renders as `field=<missing>`.
fn partition_key(event: &Event, group_by: &[String]) -> String {
    if group_by.is_empty() {
        return String::new();
    }
    group_by
        .iter()
        .map(|field| match event.field(field) {
            Some(value) => format!("{field}={value}"),
            None => format!("{field}=<missing>"),
        })
        .collect::<Vec<_>>()
        .join("|")
}

/// Selects the winning partition among a condition's candidates: among
/// partitions whose size satisfies the count predicate, picks the one with
/// the latest maximum timestamp, breaking ties by lexicographically
/// smallest group key. When no partition satisfies the threshold, returns
/// the largest partition (by the same tie-break) so the decision graph can
/// still report what was observed.
fn select_partition(
    partitions: BTreeMap<String, Vec<Rc<Event>>>,
    condition: &Condition,
) -> (Option<String>, Vec<Rc<Event>>, bool) {
    if partitions.is_empty() {
        return (None, Vec::new(), condition.count.satisfied_by(0));
    }

    let mut best: Option<(String, Vec<Rc<Event>>, bool)> = None;
    for (key, events) in partitions {
        let satisfied = condition.count.satisfied_by(events.len());
        let candidate_max_ts = events.iter().map(|e| e.timestamp).max();

        let replace = match &best {
            None => true,
            Some((best_key, best_events, best_satisfied)) => {
                // A satisfied partition always outranks an unsatisfied one.
                if satisfied != *best_satisfied {
                    satisfied
                } else {
                    let best_max_ts = best_events.iter().map(|e| e.timestamp).max();
                    match (candidate_max_ts, best_max_ts) {
                        (Some(a), Some(b)) if a != b => a.seconds_since(b) > 0,
                        _ => key < *best_key,
                    }
                }
            }
        };

        if replace {
            best = Some((key, events, satisfied));
        }
    }

    let (key, events, satisfied) = best.unwrap_or_default();
    let group_key = if key.is_empty() { None } else { Some(key) };
    (group_key, events, satisfied)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::predicate::Comparator;
    use crate::rule::AlertAction;
    use crate::rule::CountPredicate;
    use crate::rule::Severity;

    fn sample_event(event_type: &str, seconds: i64, user: &str) -> Event {
        Event::from_json(
            &json!({"type": event_type, "timestamp": seconds, "user": user}),
            EventTime::from_unix_seconds(seconds),
        )
        .expect("fixture event must parse")
    }

    fn admit(store: &mut WindowStore, event_type: &str, seconds: i64, user: &str) {
        store.admit(Rc::new(sample_event(event_type, seconds, user)));
    }

    fn credential_stuffing_rule() -> Rule {
        Rule {
            id: "credential_stuffing".to_string(),
            name: "Credential Stuffing".to_string(),
            description: None,
            severity: Severity::High,
            confidence: None,
            mitre_techniques: vec!["T1110".to_string()],
            conditions: vec![Condition {
                event_type: "auth_fail".to_string(),
                window_secs: 60,
                count: CountPredicate {
                    op: Comparator::GreaterOrEqual,
                    n: 5,
                },
                field_filters: Vec::new(),
                group_by: vec!["user".to_string()],
                same_user: false,
                after_previous: false,
                within_secs: None,
            }],
            action: AlertAction {
                message: None,
                severity: None,
                confidence: None,
                tag: None,
            },
        }
    }

    #[test]
    fn rule_fires_when_threshold_met_within_window() {
        let mut store = WindowStore::new();
        for t in 0..5 {
            admit(&mut store, "auth_fail", t, "alice");
        }
        let evaluator = RuleEvaluator::new();
        let graph = evaluator.evaluate(
            &credential_stuffing_rule(),
            &store,
            &sample_event("auth_fail", 4, "alice"),
            EventTime::from_unix_seconds(4),
        );
        assert!(graph.triggered);
        assert_eq!(graph.conditions[0].count, 5);
        assert_eq!(graph.conditions[0].group_key.as_deref(), Some("user=\"alice\""));
    }

    #[test]
    fn rule_does_not_fire_below_threshold() {
        let mut store = WindowStore::new();
        for t in 0..3 {
            admit(&mut store, "auth_fail", t, "alice");
        }
        let evaluator = RuleEvaluator::new();
        let graph = evaluator.evaluate(
            &credential_stuffing_rule(),
            &store,
            &sample_event("auth_fail", 2, "alice"),
            EventTime::from_unix_seconds(2),
        );
        assert!(!graph.triggered);
        assert_eq!(graph.failed_at_condition, Some(0));
    }

    #[test]
    fn group_by_keeps_users_in_separate_partitions() {
        let mut store = WindowStore::new();
        for t in 0..4 {
            admit(&mut store, "auth_fail", t, "alice");
        }
        for t in 0..4 {
            admit(&mut store, "auth_fail", t + 10, "mallory");
        }
        let evaluator = RuleEvaluator::new();
        let graph = evaluator.evaluate(
            &credential_stuffing_rule(),
            &store,
            &sample_event("auth_fail", 13, "mallory"),
            EventTime::from_unix_seconds(13),
        );
        assert!(!graph.triggered, "neither user alone reaches the threshold of 5");
    }

    #[test]
    fn after_previous_gates_on_previous_conditions_latest_timestamp() {
        let mut store = WindowStore::new();
        admit(&mut store, "auth_success", 100, "alice");
        admit(&mut store, "file_access", 50, "alice");
        admit(&mut store, "file_access", 150, "alice");

        let rule = Rule {
            id: "ordering".to_string(),
            name: "Ordering".to_string(),
            description: None,
            severity: Severity::Medium,
            confidence: None,
            mitre_techniques: Vec::new(),
            conditions: vec![
                Condition {
                    event_type: "auth_success".to_string(),
                    window_secs: 3600,
                    count: CountPredicate {
                        op: Comparator::GreaterOrEqual,
                        n: 1,
                    },
                    field_filters: Vec::new(),
                    group_by: Vec::new(),
                    same_user: false,
                    after_previous: false,
                    within_secs: None,
                },
                Condition {
                    event_type: "file_access".to_string(),
                    window_secs: 3600,
                    count: CountPredicate {
                        op: Comparator::GreaterOrEqual,
                        n: 1,
                    },
                    field_filters: Vec::new(),
                    group_by: Vec::new(),
                    same_user: false,
                    after_previous: true,
                    within_secs: Some(60),
                },
            ],
            action: AlertAction {
                message: None,
                severity: None,
                confidence: None,
                tag: None,
            },
        };

        let evaluator = RuleEvaluator::new();
        let graph = evaluator.evaluate(
            &rule,
            &store,
            &sample_event("file_access", 150, "alice"),
            EventTime::from_unix_seconds(150),
        );
        assert!(graph.triggered);
        assert_eq!(
            graph.conditions[1].bound_events.iter().map(|e| e.timestamp).collect::<Vec<_>>(),
            vec![EventTime::from_unix_seconds(150)]
        );
    }
}
