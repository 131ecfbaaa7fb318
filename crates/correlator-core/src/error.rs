// crates/correlator-core/src/error.rs
// ============================================================================
// Module: Correlator Error Definitions
// Description: Structured diagnostics for rule loading, event admission, and
// alert dispatch.
// Purpose: Give every failure mode across rule loading, event admission,
// and alert dispatch a stable, serializable type.
// Dependencies: thiserror, std::fmt
// ============================================================================

//! ## Overview
//! Errors here are split by where they surface: rule load time (hard
//! refusal), event admission time (drop and count), and alert dispatch time
//! (degrade and count). `PredicateTypeMismatch` has no variant of its own —
//! it collapses to a plain `false` inside [`crate::predicate::evaluate`], so
//! there is nothing to represent at this layer.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::rule::ConditionIndex;

// ============================================================================
// SECTION: Rule Validation Errors
// ============================================================================

/// A single defect found while validating a loaded rule document.
///
/// # Invariants
/// - Variants are stable for programmatic handling by hosts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleValidationError {
    /// A rule has no conditions at all.
    #[error("rule `{rule_id}` has an empty condition list")]
    EmptyConditions {
        /// Offending rule identifier.
        rule_id: String,
    },
    /// A condition referenced an event type with no known shape. The
    /// correlator accepts an open-ended event-type tag set, so this fires
    /// only for structurally invalid (empty) type tags.
    #[error("rule `{rule_id}` condition {index} has an empty event type")]
    EmptyEventType {
        /// Offending rule identifier.
        rule_id: String,
        /// Offending condition index (0-based).
        index: ConditionIndex,
    },
    /// A `count` predicate string failed to parse (e.g. `"~= 5"`).
    #[error("rule `{rule_id}` condition {index} has a malformed count predicate: {detail}")]
    MalformedCountPredicate {
        /// Offending rule identifier.
        rule_id: String,
        /// Offending condition index (0-based).
        index: ConditionIndex,
        /// Human-readable detail about what failed to parse.
        detail: String,
    },
    /// A field predicate shape was not recognized at load time.
    #[error("rule `{rule_id}` condition {index} has an unknown predicate for field `{field}`")]
    UnknownPredicateShape {
        /// Offending rule identifier.
        rule_id: String,
        /// Offending condition index (0-based).
        index: ConditionIndex,
        /// Field name the predicate was attached to.
        field: String,
    },
    /// A rule declared no alert actions.
    #[error("rule `{rule_id}` has no alert actions")]
    MissingAction {
        /// Offending rule identifier.
        rule_id: String,
    },
    /// A rule's `within` value was given without `after_previous`.
    #[error("rule `{rule_id}` condition {index} sets `within` without `after_previous`")]
    WithinWithoutAfterPrevious {
        /// Offending rule identifier.
        rule_id: String,
        /// Offending condition index (0-based).
        index: ConditionIndex,
    },
    /// Two or more rules share the same identifier.
    #[error("duplicate rule id `{rule_id}`")]
    DuplicateRuleId {
        /// The duplicated rule identifier.
        rule_id: String,
    },
}

// ============================================================================
// SECTION: Event Admission Errors
// ============================================================================

/// An admitted event failed schema validation and was dropped.
///
/// # Invariants
/// - Admission never partially applies a malformed event; it is dropped in full.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventSchemaError {
    /// The event had no `type` field.
    #[error("event is missing the `type` field")]
    MissingType,
    /// The event's `type` field was present but empty.
    #[error("event `type` field is empty")]
    EmptyType,
    /// The event had no `timestamp` field at all (the field key itself was absent).
    #[error("event is missing the `timestamp` field")]
    MissingTimestamp,
    /// The event body was not a JSON object.
    #[error("event is not a JSON object")]
    NotAnObject,
}

// ============================================================================
// SECTION: Alert Sink Errors
// ============================================================================

/// An alert sink rejected or failed to deliver an alert.
///
/// # Invariants
/// - A `SinkError` never aborts evaluation; the generator counts it and
///   continues fanning out to remaining sinks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    /// The sink reported a delivery failure.
    #[error("alert sink delivery failed: {0}")]
    DeliveryFailed(String),
    /// The sink is currently marked degraded and was skipped.
    #[error("alert sink is degraded and was skipped")]
    Degraded,
}

// ============================================================================
// SECTION: Shutdown Errors
// ============================================================================

/// The host-level queue drain exceeded its shutdown deadline.
///
/// # Invariants
/// - This is informational; the process still exits cleanly rather than
///   aborting on an incomplete drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("shutdown drain deadline exceeded; {remaining_events} event(s) discarded")]
pub struct ShutdownDeadlineExceeded {
    /// Number of queued events discarded when the deadline was hit.
    pub remaining_events: usize,
}
