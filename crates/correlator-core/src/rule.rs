// crates/correlator-core/src/rule.rs
// ============================================================================
// Module: Correlator Rule Model
// Description: Parsed rules, conditions, and the rule-load validation pass.
// Purpose: Turn an untrusted rule document into a validated, evaluation-ready
// rule set with every count predicate and field filter already parsed.
// Dependencies: serde, serde_json, crate::predicate, crate::event, crate::error
// ============================================================================

//! ## Overview
//! Rules are loaded once, at startup or on `reload-rules`, via
//! [`load_rules`]. Everything the evaluator needs at event-admission time —
//! parsed count predicates, parsed field filters — is computed here so the
//! hot path in [`crate::evaluator`] never parses a string (DESIGN NOTES:
//! "count-predicate as parsed string → parse once at rule-load time").

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::error::RuleValidationError;
use crate::predicate::Comparator;
use crate::predicate::FieldPredicate;

// ============================================================================
// SECTION: Condition Index
// ============================================================================

/// A 0-based index into a rule's condition sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConditionIndex(pub usize);

impl fmt::Display for ConditionIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: Severity
// ============================================================================

/// Alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Low severity.
    Low,
    /// Medium severity.
    Medium,
    /// High severity.
    High,
    /// Critical severity.
    Critical,
}

// ============================================================================
// SECTION: Count Predicate
// ============================================================================

/// A parsed `OP N` count threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountPredicate {
    /// Comparison operator.
    pub op: Comparator,
    /// Threshold operand.
    pub n: u64,
}

impl CountPredicate {
    /// The default count threshold when a condition omits `count`: `>= 1`.
    #[must_use]
    pub const fn default_at_least_one() -> Self {
        Self {
            op: Comparator::GreaterOrEqual,
            n: 1,
        }
    }

    /// Evaluates `count OP n` for an observed partition size.
    #[must_use]
    pub fn satisfied_by(self, count: usize) -> bool {
        #[allow(
            clippy::cast_precision_loss,
            reason = "partition sizes are small; precision loss is not observable at this scale"
        )]
        self.op.apply(count as f64, self.n as f64)
    }

    /// Parses a `"OP N"` count predicate string.
    ///
    /// # Errors
    ///
    /// Returns a detail string when the token does not split into a known
    /// comparator and a non-negative integer.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        let mut parts = trimmed.splitn(2, char::is_whitespace);
        let op_token = parts.next().ok_or_else(|| "empty count predicate".to_string())?;
        let op = Comparator::parse(op_token)
            .ok_or_else(|| format!("unknown comparator `{op_token}`"))?;
        let n_token = parts
            .next()
            .ok_or_else(|| format!("comparator `{op_token}` given with no operand"))?;
        let n = n_token
            .trim()
            .parse::<u64>()
            .map_err(|_| format!("`{n_token}` is not a non-negative integer"))?;
        Ok(Self { op, n })
    }
}

// ============================================================================
// SECTION: Condition
// ============================================================================

/// A single, validated condition within a rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// Event type this condition binds to.
    pub event_type: String,
    /// Sliding lookback window, in seconds.
    pub window_secs: u64,
    /// Count threshold.
    pub count: CountPredicate,
    /// Field filters, applied before counting.
    pub field_filters: Vec<FieldPredicate>,
    /// Optional per-key grouping fields.
    pub group_by: Vec<String>,
    /// Whether matched events must share the first bound event's `user`.
    pub same_user: bool,
    /// Whether matched events must postdate the previous condition's bound set.
    pub after_previous: bool,
    /// When `after_previous` is set, the seconds window after the previous
    /// condition's latest bound timestamp.
    pub within_secs: Option<u64>,
}

// ============================================================================
// SECTION: Alert Action
// ============================================================================

/// The alert template carried by a rule's first action.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertAction {
    /// Alert message template; falls back to the rule's name if absent.
    pub message: Option<String>,
    /// Severity override; falls back to the rule's severity if absent.
    pub severity: Option<Severity>,
    /// Confidence override; falls back to the configured default if absent.
    pub confidence: Option<f64>,
    /// Optional free-form tag forwarded onto the alert.
    pub tag: Option<String>,
}

// ============================================================================
// SECTION: Rule
// ============================================================================

/// A validated, evaluation-ready rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    /// Globally unique rule identifier.
    pub id: String,
    /// Human-readable rule name.
    pub name: String,
    /// Optional human-readable description, used as a message fallback.
    pub description: Option<String>,
    /// Rule severity.
    pub severity: Severity,
    /// Rule-level confidence override, if set.
    pub confidence: Option<f64>,
    /// MITRE ATT&CK technique identifiers, forwarded verbatim to alerts.
    pub mitre_techniques: Vec<String>,
    /// Ordered condition sequence (non-empty).
    pub conditions: Vec<Condition>,
    /// The alert template built from the rule's first action.
    pub action: AlertAction,
}

// ============================================================================
// SECTION: Wire Document
// ============================================================================

/// Wire-format rule document, as parsed from the host's YAML or JSON source.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RuleDocument {
    /// Top-level rule list.
    pub rules: Vec<RawRule>,
}

/// Wire-format rule, prior to validation.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawRule {
    /// Rule identifier.
    pub id: String,
    /// Rule name.
    pub name: String,
    /// Optional human-readable description.
    #[serde(default)]
    pub description: Option<String>,
    /// Whether the rule is enabled (default `true`).
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Rule severity.
    pub severity: Severity,
    /// Optional rule-level confidence.
    #[serde(default)]
    pub confidence: Option<f64>,
    /// MITRE ATT&CK technique identifiers.
    #[serde(default)]
    pub mitre_techniques: Vec<String>,
    /// Ordered condition sequence.
    #[serde(default)]
    pub conditions: Vec<RawCondition>,
    /// Alert actions (only the first is used).
    #[serde(default)]
    pub actions: Vec<RawAction>,
}

const fn default_enabled() -> bool {
    true
}

/// Wire-format condition, prior to validation.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawCondition {
    /// Event type tag this condition binds to.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Sliding lookback window, in seconds.
    #[serde(default)]
    pub window: Option<u64>,
    /// `"OP N"` count predicate string.
    #[serde(default)]
    pub count: Option<String>,
    /// Field name to predicate-value map. A key ending in `_contains`
    /// selects substring matching on the field named by the prefix.
    #[serde(default)]
    pub field_filter: std::collections::BTreeMap<String, Value>,
    /// Optional per-key grouping fields.
    #[serde(default)]
    pub group_by: Option<Vec<String>>,
    /// Whether matched events must share the first bound event's `user`.
    #[serde(default)]
    pub same_user: bool,
    /// Whether matched events must postdate the previous condition's bound set.
    #[serde(default)]
    pub after_previous: bool,
    /// When `after_previous` is set, the seconds window after the previous
    /// condition's latest bound timestamp.
    #[serde(default)]
    pub within: Option<u64>,
}

/// Wire-format alert action.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawAction {
    /// Alert message template.
    #[serde(default)]
    pub message: Option<String>,
    /// Severity override.
    #[serde(default)]
    pub severity: Option<Severity>,
    /// Confidence override.
    #[serde(default)]
    pub confidence: Option<f64>,
    /// Optional free-form tag.
    #[serde(default)]
    pub tag: Option<String>,
}

// ============================================================================
// SECTION: Rule-Load Defaults
// ============================================================================

/// Process-wide defaults applied when a condition omits `window` or `count`.
#[derive(Debug, Clone, Copy)]
pub struct RuleLoadDefaults {
    /// Applied when a condition omits `window`.
    pub default_window_secs: u64,
    /// Applied when a condition omits `count`.
    pub default_count: CountPredicate,
}

impl Default for RuleLoadDefaults {
    fn default() -> Self {
        Self {
            default_window_secs: 60,
            default_count: CountPredicate::default_at_least_one(),
        }
    }
}

// ============================================================================
// SECTION: Loader
// ============================================================================

/// Validates and compiles a rule document into an evaluation-ready rule set.
///
/// Rules with `enabled: false` are dropped silently and are not validated.
/// Every remaining rule is fully validated; any validation defect anywhere
/// in the document causes the whole load to fail with the complete list of
/// defects found, so a host refuses to start rather than run with a
/// partially valid rule set.
///
/// # Errors
///
/// Returns the full list of [`RuleValidationError`]s found across all
/// enabled rules.
pub fn load_rules(
    document: &RuleDocument,
    defaults: RuleLoadDefaults,
) -> Result<Vec<Rule>, Vec<RuleValidationError>> {
    let mut rules = Vec::new();
    let mut errors = Vec::new();
    let mut seen_ids = BTreeSet::new();

    for raw in &document.rules {
        if !raw.enabled {
            continue;
        }
        if !seen_ids.insert(raw.id.clone()) {
            errors.push(RuleValidationError::DuplicateRuleId {
                rule_id: raw.id.clone(),
            });
            continue;
        }
        match build_rule(raw, defaults) {
            Ok(rule) => rules.push(rule),
            Err(rule_errors) => errors.extend(rule_errors),
        }
    }

    if errors.is_empty() { Ok(rules) } else { Err(errors) }
}

/// Validates and compiles a single raw rule, collecting every defect found
/// rather than stopping at the first one.
fn build_rule(raw: &RawRule, defaults: RuleLoadDefaults) -> Result<Rule, Vec<RuleValidationError>> {
    let mut errors = Vec::new();

    if raw.conditions.is_empty() {
        errors.push(RuleValidationError::EmptyConditions {
            rule_id: raw.id.clone(),
        });
    }

    let mut conditions = Vec::with_capacity(raw.conditions.len());
    for (position, raw_condition) in raw.conditions.iter().enumerate() {
        match build_condition(raw, ConditionIndex(position), raw_condition, defaults) {
            Ok(condition) => conditions.push(condition),
            Err(condition_errors) => errors.extend(condition_errors),
        }
    }

    let action = match raw.actions.first() {
        Some(raw_action) => AlertAction {
            message: raw_action.message.clone(),
            severity: raw_action.severity,
            confidence: raw_action.confidence,
            tag: raw_action.tag.clone(),
        },
        None => {
            errors.push(RuleValidationError::MissingAction {
                rule_id: raw.id.clone(),
            });
            AlertAction {
                message: None,
                severity: None,
                confidence: None,
                tag: None,
            }
        }
    };

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(Rule {
        id: raw.id.clone(),
        name: raw.name.clone(),
        description: raw.description.clone(),
        severity: raw.severity,
        confidence: raw.confidence,
        mitre_techniques: raw.mitre_techniques.clone(),
        conditions,
        action,
    })
}

/// Validates and compiles a single raw condition.
fn build_condition(
    raw_rule: &RawRule,
    index: ConditionIndex,
    raw: &RawCondition,
    defaults: RuleLoadDefaults,
) -> Result<Condition, Vec<RuleValidationError>> {
    let mut errors = Vec::new();

    if raw.event_type.is_empty() {
        errors.push(RuleValidationError::EmptyEventType {
            rule_id: raw_rule.id.clone(),
            index,
        });
    }

    let count = match &raw.count {
        Some(token) => match CountPredicate::parse(token) {
            Ok(parsed) => parsed,
            Err(detail) => {
                errors.push(RuleValidationError::MalformedCountPredicate {
                    rule_id: raw_rule.id.clone(),
                    index,
                    detail,
                });
                defaults.default_count
            }
        },
        None => defaults.default_count,
    };

    let mut field_filters = Vec::with_capacity(raw.field_filter.len());
    for (key, value) in &raw.field_filter {
        let (field, is_contains) = match key.strip_suffix("_contains") {
            Some(base) => (base, true),
            None => (key.as_str(), false),
        };
        match FieldPredicate::parse(field, value, is_contains) {
            Ok(predicate) => field_filters.push(predicate),
            Err(_) => errors.push(RuleValidationError::UnknownPredicateShape {
                rule_id: raw_rule.id.clone(),
                index,
                field: key.clone(),
            }),
        }
    }

    if raw.within.is_some() && !raw.after_previous {
        errors.push(RuleValidationError::WithinWithoutAfterPrevious {
            rule_id: raw_rule.id.clone(),
            index,
        });
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(Condition {
        event_type: raw.event_type.clone(),
        window_secs: raw.window.unwrap_or(defaults.default_window_secs),
        count,
        field_filters,
        group_by: raw.group_by.clone().unwrap_or_default(),
        same_user: raw.same_user,
        after_previous: raw.after_previous,
        within_secs: raw.within,
    })
}
