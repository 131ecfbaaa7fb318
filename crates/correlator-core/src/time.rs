// crates/correlator-core/src/time.rs
// ============================================================================
// Module: Correlator Time Model
// Description: Canonical timestamp representation for events and evaluation passes.
// Purpose: Provide a single, deterministic second-precision instant type.
// Dependencies: time (parsing, formatting), serde
// ============================================================================

//! ## Overview
//! The correlator never reads wall-clock time directly from inside
//! `correlator-core`: every `now` is supplied by the host as the ingest time
//! of the triggering event (see [`crate::correlator::Correlator::admit`]).
//! This keeps evaluation replayable and keeps `P1`/`P2` (purity, order
//! independence) true by construction.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Event Time
// ============================================================================

/// A second-precision absolute instant.
///
/// # Invariants
/// - Values are monotonically interpreted (larger means later); no timezone
///   information is retained past construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventTime(i64);

impl EventTime {
    /// Builds an event time from unix seconds.
    #[must_use]
    pub const fn from_unix_seconds(seconds: i64) -> Self {
        Self(seconds)
    }

    /// Returns the underlying unix-seconds value.
    #[must_use]
    pub const fn unix_seconds(self) -> i64 {
        self.0
    }

    /// Parses a timestamp from an RFC3339 string or a bare unix-seconds
    /// integer string — the two shapes a collector's wire timestamp may
    /// arrive in.
    ///
    /// Returns `None` for any input that is neither a valid RFC3339
    /// instant nor a parseable integer, so callers can fall back to ingest
    /// time per the "missing or non-finite timestamps" policy.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        if let Ok(seconds) = raw.trim().parse::<i64>() {
            return Some(Self(seconds));
        }
        OffsetDateTime::parse(raw.trim(), &Rfc3339)
            .ok()
            .map(|instant| Self(instant.unix_timestamp()))
    }

    /// Builds an event time from a JSON number, truncating toward zero and
    /// rejecting non-finite values.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        reason = "fractional-second JSON timestamps are intentionally truncated to whole seconds"
    )]
    pub fn from_json_number(value: &serde_json::Number) -> Option<Self> {
        if let Some(int) = value.as_i64() {
            return Some(Self(int));
        }
        value.as_f64().filter(|v| v.is_finite()).map(|v| Self(v as i64))
    }

    /// Returns `self - other` in whole seconds.
    #[must_use]
    pub const fn seconds_since(self, other: Self) -> i64 {
        self.0 - other.0
    }

    /// Returns `self + seconds`.
    #[must_use]
    pub const fn add_seconds(self, seconds: i64) -> Self {
        Self(self.0 + seconds)
    }
}

impl fmt::Display for EventTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
