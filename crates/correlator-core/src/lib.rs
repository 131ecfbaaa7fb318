// crates/correlator-core/src/lib.rs
// ============================================================================
// Crate: correlator-core
// Description: Temporal event correlation engine — window store, predicate
// evaluator, rule evaluator, decision graph recorder, alert generator, and
// stats collector.
// Dependencies: serde, serde_json, thiserror, time
// ============================================================================

//! `correlator-core` evaluates a stream of security events against a set of
//! temporal correlation rules and produces alerts when a rule's full
//! condition sequence is satisfied within its configured sliding windows.
//!
//! The crate has no knowledge of configuration files, CLI arguments, or
//! process lifetime — see `correlator-config` and `correlator-cli` for
//! those layers. Everything here is synchronous and single-threaded; a host
//! embedding this crate across threads is responsible for its own
//! synchronization (a single [`correlator::Correlator`] behind a mutex is
//! the expected shape).
//!
//! ## Module map
//! - [`time`] — second-precision event timestamps
//! - [`event`] — the typed event model, parsed from untrusted JSON
//! - [`predicate`] — field predicate parsing and evaluation
//! - [`rule`] — rule and condition model, rule-load validation
//! - [`window`] — the sliding window store
//! - [`evaluator`] — the rule evaluator (Algorithm EVAL)
//! - [`graph`] — decision graphs and the bounded decision graph ring
//! - [`alert`] — alerts, sinks, and fan-out dispatch
//! - [`stats`] — operational counters
//! - [`correlator`] — the top-level admit/evaluate/emit/expire pipeline
//! - [`error`] — structured error types for every failure mode above

#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        missing_docs,
        clippy::missing_docs_in_private_items
    )
)]

pub mod alert;
pub mod correlator;
pub mod error;
pub mod event;
pub mod evaluator;
pub mod graph;
pub mod predicate;
pub mod rule;
pub mod stats;
pub mod time;
pub mod window;

pub use alert::Alert;
pub use alert::AlertGenerator;
pub use alert::AlertSink;
pub use correlator::AdmitOutcome;
pub use correlator::Correlator;
pub use error::EventSchemaError;
pub use error::RuleValidationError;
pub use event::Event;
pub use event::EventType;
pub use graph::DecisionGraph;
pub use rule::Rule;
pub use rule::RuleDocument;
pub use rule::load_rules;
pub use stats::StatsSnapshot;
pub use time::EventTime;
