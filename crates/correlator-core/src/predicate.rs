// crates/correlator-core/src/predicate.rs
// ============================================================================
// Module: Field Predicate Evaluator
// Description: Pure functions interpreting field predicates against events.
// Purpose: Give every predicate shape a single parsed representation and a
// single evaluation function, so nothing is re-parsed per event.
// Dependencies: serde_json, crate::event
// ============================================================================

//! ## Overview
//! Predicates are parsed once, at rule-load time, into a [`FieldPredicate`].
//! Evaluation ([`evaluate`]) is a pure function of an already-parsed
//! predicate and an [`Event`]; it never allocates a parser and never fails —
//! a missing field or an incompatible value shape both evaluate to `false`
//! rather than surfacing a type-mismatch error of their own.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::event::Event;

// ============================================================================
// SECTION: Comparator
// ============================================================================

/// Arithmetic comparison operator for numeric (and size-literal) predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparator {
    /// `>=`
    GreaterOrEqual,
    /// `>`
    GreaterThan,
    /// `=`
    Equal,
    /// `<=`
    LessOrEqual,
    /// `<`
    LessThan,
}

impl Comparator {
    /// Parses a comparator token (`>=`, `>`, `=`, `<=`, `<`).
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            ">=" => Some(Self::GreaterOrEqual),
            ">" => Some(Self::GreaterThan),
            "=" | "==" => Some(Self::Equal),
            "<=" => Some(Self::LessOrEqual),
            "<" => Some(Self::LessThan),
            _ => None,
        }
    }

    /// Applies the comparator to two already-extracted numeric values.
    #[must_use]
    pub fn apply(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Self::GreaterOrEqual => lhs >= rhs,
            Self::GreaterThan => lhs > rhs,
            Self::Equal => (lhs - rhs).abs() < f64::EPSILON,
            Self::LessOrEqual => lhs <= rhs,
            Self::LessThan => lhs < rhs,
        }
    }
}

// ============================================================================
// SECTION: Field Predicate
// ============================================================================

/// A single, already-parsed field predicate, attached to one field name.
///
/// # Invariants
/// - Constructed only via [`FieldPredicate::parse`], which is the sole place
///   size literals and numeric-comparison strings are interpreted.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldPredicate {
    /// The event field this predicate filters on.
    pub field: String,
    /// The parsed predicate shape.
    pub shape: PredicateShape,
}

/// The parsed shape of a field predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum PredicateShape {
    /// `field: scalar` — exact equality.
    Equals(Value),
    /// `field: [v1, v2, ...]` — set membership.
    OneOf(Vec<Value>),
    /// `field_contains: "s"` (or a list) — substring match, case-sensitive.
    Contains(Vec<String>),
    /// `field: "OP N"` — arithmetic comparison, `N` already parsed as `f64`
    /// (size literals such as `10MB` are resolved into this at parse time).
    Compare(Comparator, f64),
}

/// Error returned when a predicate's wire shape cannot be parsed at
/// rule-load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredicateParseError {
    /// Human-readable detail.
    pub detail: String,
}

impl FieldPredicate {
    /// Parses a `field: value` predicate entry from its wire JSON value.
    ///
    /// `field_suffix_contains` is `true` when the wire key ended in
    /// `_contains`, selecting [`PredicateShape::Contains`] regardless of the
    /// value's JSON shape (string or array of strings).
    ///
    /// # Errors
    ///
    /// Returns [`PredicateParseError`] for any value shape outside equality,
    /// set membership, substring, and comparison predicates.
    pub fn parse(
        field: &str,
        value: &Value,
        field_suffix_contains: bool,
    ) -> Result<Self, PredicateParseError> {
        let shape = if field_suffix_contains {
            parse_contains_shape(value)?
        } else {
            parse_value_shape(value)?
        };
        Ok(Self {
            field: field.to_string(),
            shape,
        })
    }
}

/// Parses the `field_contains` wire shape: a string or a list of strings.
fn parse_contains_shape(value: &Value) -> Result<PredicateShape, PredicateParseError> {
    match value {
        Value::String(text) => Ok(PredicateShape::Contains(vec![text.clone()])),
        Value::Array(items) => {
            let mut substrings = Vec::with_capacity(items.len());
            for item in items {
                match item.as_str() {
                    Some(text) => substrings.push(text.to_string()),
                    None => {
                        return Err(PredicateParseError {
                            detail: "field_contains list entries must be strings".to_string(),
                        });
                    }
                }
            }
            Ok(PredicateShape::Contains(substrings))
        }
        _ => Err(PredicateParseError {
            detail: "field_contains must be a string or a list of strings".to_string(),
        }),
    }
}

/// Parses the `field: value` wire shape, dispatching on the JSON value kind.
fn parse_value_shape(value: &Value) -> Result<PredicateShape, PredicateParseError> {
    match value {
        Value::Array(items) => Ok(PredicateShape::OneOf(items.clone())),
        Value::String(text) => parse_string_shape(text),
        scalar => Ok(PredicateShape::Equals(scalar.clone())),
    }
}

/// Parses a string-valued predicate: either a literal string equality, or an
/// `"OP N"` arithmetic comparison (`N` possibly carrying a `KB`/`MB`/`GB`
/// size suffix).
fn parse_string_shape(text: &str) -> Result<PredicateShape, PredicateParseError> {
    let trimmed = text.trim();
    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let Some(op_token) = parts.next() else {
        return Ok(PredicateShape::Equals(Value::String(text.to_string())));
    };
    let Some(comparator) = Comparator::parse(op_token) else {
        return Ok(PredicateShape::Equals(Value::String(text.to_string())));
    };
    let Some(number_token) = parts.next() else {
        return Err(PredicateParseError {
            detail: format!("comparator `{op_token}` given with no operand"),
        });
    };
    let magnitude = parse_size_literal(number_token.trim()).ok_or_else(|| PredicateParseError {
        detail: format!("`{number_token}` is not a number or size literal"),
    })?;
    Ok(PredicateShape::Compare(comparator, magnitude))
}

/// Byte multiplier for the `KB` size suffix.
const KB: f64 = 1024.0;
/// Byte multiplier for the `MB` size suffix.
const MB: f64 = KB * 1024.0;
/// Byte multiplier for the `GB` size suffix.
const GB: f64 = MB * 1024.0;

/// Parses a bare number or a size literal (`10MB`, `512KB`, `2GB`).
fn parse_size_literal(token: &str) -> Option<f64> {
    if let Ok(value) = token.parse::<f64>() {
        return Some(value);
    }
    for (suffix, multiplier) in [("KB", KB), ("MB", MB), ("GB", GB)] {
        if let Some(prefix) = token.strip_suffix(suffix) {
            if let Ok(value) = prefix.trim().parse::<f64>() {
                return Some(value * multiplier);
            }
        }
    }
    None
}

// ============================================================================
// SECTION: Evaluation
// ============================================================================

/// Evaluates a single field predicate against an event.
///
/// A field that is absent from the event evaluates to `false` (never an
/// error). A field whose JSON shape is incompatible with the predicate also
/// evaluates to `false`.
#[must_use]
pub fn evaluate(predicate: &FieldPredicate, event: &Event) -> bool {
    let Some(actual) = event.field(&predicate.field) else {
        return false;
    };
    match &predicate.shape {
        PredicateShape::Equals(expected) => values_equal(&actual, expected),
        PredicateShape::OneOf(candidates) => candidates.iter().any(|c| values_equal(&actual, c)),
        PredicateShape::Contains(substrings) => match actual.as_str() {
            Some(text) => substrings.iter().any(|s| text.contains(s.as_str())),
            None => false,
        },
        PredicateShape::Compare(comparator, expected) => match actual.as_f64() {
            Some(actual_num) => comparator.apply(actual_num, *expected),
            None => false,
        },
    }
}

/// Type-exact equality: numbers compare numerically, strings compare
/// string-wise, everything else compares structurally.
fn values_equal(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => (a - b).abs() < f64::EPSILON,
            _ => false,
        },
        (Value::String(a), Value::String(b)) => a == b,
        _ => actual == expected,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::event::EventTime;

    fn sample_event() -> Event {
        Event::from_json(
            &json!({
                "type": "file_access",
                "timestamp": 1000,
                "source": "edr",
                "file_path": "/etc/shadow",
                "bytes_written": 11_534_336i64,
            }),
            EventTime::from_unix_seconds(1000),
        )
        .expect("fixture event must parse")
    }

    #[test]
    fn equals_matches_type_exact_strings() {
        let predicate = FieldPredicate::parse("file_path", &json!("/etc/shadow"), false).unwrap();
        assert!(evaluate(&predicate, &sample_event()));
    }

    #[test]
    fn one_of_matches_any_candidate() {
        let predicate =
            FieldPredicate::parse("file_path", &json!(["/etc/passwd", "/etc/shadow"]), false)
                .unwrap();
        assert!(evaluate(&predicate, &sample_event()));
    }

    #[test]
    fn contains_matches_substring() {
        let predicate = FieldPredicate::parse("file_path", &json!("shadow"), true).unwrap();
        assert!(evaluate(&predicate, &sample_event()));
    }

    #[test]
    fn compare_parses_size_literal() {
        let predicate =
            FieldPredicate::parse("bytes_written", &json!("> 10MB"), false).unwrap();
        assert!(evaluate(&predicate, &sample_event()));
    }

    #[test]
    fn missing_field_is_silently_false() {
        let predicate = FieldPredicate::parse("nonexistent", &json!("x"), false).unwrap();
        assert!(!evaluate(&predicate, &sample_event()));
    }

    #[test]
    fn incompatible_shape_is_false_not_error() {
        let predicate =
            FieldPredicate::parse("file_path", &json!("> 10MB"), false).unwrap();
        assert!(!evaluate(&predicate, &sample_event()));
    }
}
