// crates/correlator-core/src/window.rs
// ============================================================================
// Module: Sliding Window Store
// Description: Per-event-type ring of recently admitted events.
// Purpose: Give the rule evaluator O(window size) access to "events of type T
// in the last N seconds" without rescanning the full event history.
// Dependencies: std::collections, crate::event, crate::time
// ============================================================================

//! ## Overview
//! One [`WindowStore`] backs an entire [`crate::correlator::Correlator`].
//! Events are appended in admission order per event type
//! ([`WindowStore::admit`]); [`WindowStore::slice`] returns every event of a
//! given type whose timestamp falls within `window_secs` of `now`, and
//! [`WindowStore::expire`] drops anything older than the configured
//! retention so memory use stays bounded regardless of event volume.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::event::Event;
use crate::event::EventType;
use crate::time::EventTime;

// ============================================================================
// SECTION: Window Store
// ============================================================================

/// Holds every admitted event, partitioned by event type, in admission
/// order.
///
/// # Invariants
/// - Each per-type deque is sorted by admission order. Admission order and
///   timestamp order usually coincide, but an out-of-order arrival (a
///   collector replaying a backlog) is still appended at the back; `slice`
///   filters by timestamp rather than assuming sortedness, so out-of-order
///   admission affects only recency within a window, not correctness.
#[derive(Debug, Default)]
pub struct WindowStore {
    windows: BTreeMap<EventType, VecDeque<Rc<Event>>>,
}

impl WindowStore {
    /// Builds an empty window store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            windows: BTreeMap::new(),
        }
    }

    /// Appends an event to its type's window.
    pub fn admit(&mut self, event: Rc<Event>) {
        self.windows
            .entry(event.event_type.clone())
            .or_default()
            .push_back(event);
    }

    /// Returns every event of `event_type` with `timestamp` in
    /// `[now - window_secs, now]`, oldest first.
    #[must_use]
    pub fn slice(&self, event_type: &EventType, now: EventTime, window_secs: u64) -> Vec<Rc<Event>> {
        let Some(window) = self.windows.get(event_type) else {
            return Vec::new();
        };
        #[allow(
            clippy::cast_possible_wrap,
            reason = "window widths are small, bounded configuration values"
        )]
        let window_secs = window_secs as i64;
        window
            .iter()
            .filter(|candidate| {
                let age = now.seconds_since(candidate.timestamp);
                age >= 0 && age <= window_secs
            })
            .cloned()
            .collect()
    }

    /// Drops every event older than `retention_secs` relative to `now`,
    /// across all event types. Empty per-type deques are removed so the
    /// map does not grow unboundedly with transient event types.
    pub fn expire(&mut self, now: EventTime, retention_secs: u64) {
        #[allow(
            clippy::cast_possible_wrap,
            reason = "retention windows are small, bounded configuration values"
        )]
        let retention_secs = retention_secs as i64;
        self.windows.retain(|_, window| {
            while let Some(front) = window.front() {
                if now.seconds_since(front.timestamp) > retention_secs {
                    window.pop_front();
                } else {
                    break;
                }
            }
            !window.is_empty()
        });
    }

    /// Total number of events currently retained, across all types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.windows.values().map(VecDeque::len).sum()
    }

    /// Whether the store currently holds no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.windows.values().all(VecDeque::is_empty)
    }
}
