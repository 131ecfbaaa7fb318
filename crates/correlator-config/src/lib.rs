// crates/correlator-config/src/lib.rs
// ============================================================================
// Crate: correlator-config
// Description: Process-level configuration for the temporal event correlator.
// Purpose: Load, default, and validate the handful of knobs the engine needs
// before it can build a `correlator_core::Correlator`.
// Dependencies: serde, toml, thiserror, correlator-core
// ============================================================================

//! Configuration is a small, flat TOML document. Every field has a
//! documented default, so an empty document is a valid configuration.
//! Validation happens once, at load time
//! ([`CorrelatorConfig::from_toml_str`]), so the engine never has to guard
//! against an out-of-range knob at runtime.

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

use std::fs;
use std::path::Path;

use correlator_core::rule::CountPredicate;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Config
// ============================================================================

/// Process-level engine configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CorrelatorConfig {
    /// How long admitted events are retained before expiry, in seconds.
    pub retention_window_secs: u64,
    /// Maximum number of decision graphs retained in memory.
    pub max_decision_graphs: usize,
    /// Maximum number of recently generated alerts retained in memory.
    pub max_alerts_in_memory: usize,
    /// `"OP N"` count predicate applied when a condition omits `count`.
    pub default_count: String,
    /// Sliding window width, in seconds, applied when a condition omits `window`.
    pub default_window_secs: u64,
    /// Confidence applied to an alert when neither the rule nor its action
    /// set one explicitly.
    pub default_confidence: f64,
    /// Seconds a graceful shutdown waits for the event queue to drain
    /// before discarding whatever remains.
    pub shutdown_drain_deadline_secs: u64,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        Self {
            retention_window_secs: 3600,
            max_decision_graphs: 512,
            max_alerts_in_memory: 500,
            default_count: ">= 1".to_string(),
            default_window_secs: 60,
            default_confidence: 0.75,
            shutdown_drain_deadline_secs: 5,
        }
    }
}

impl CorrelatorConfig {
    /// Parses and validates a configuration document from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the document fails to parse or any
    /// field fails validation.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a configuration document from a file path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read, fails to
    /// parse, or fails validation.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml_str(&raw)
    }

    /// Validates every field, returning the first defect found.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] describing the first out-of-range or
    /// malformed field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.default_confidence) {
            return Err(ConfigError::InvalidConfidence(self.default_confidence));
        }
        if CountPredicate::parse(&self.default_count).is_err() {
            return Err(ConfigError::InvalidDefaultCount(self.default_count.clone()));
        }
        if self.retention_window_secs == 0 {
            return Err(ConfigError::InvalidRetentionWindow);
        }
        if self.default_window_secs == 0 {
            return Err(ConfigError::InvalidDefaultWindow);
        }
        if self.retention_window_secs < self.default_window_secs {
            return Err(ConfigError::RetentionShorterThanDefaultWindow {
                retention_window_secs: self.retention_window_secs,
                default_window_secs: self.default_window_secs,
            });
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// A configuration load or validation failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration file: {0}")]
    Io(String),
    /// The configuration document failed to parse as TOML.
    #[error("failed to parse configuration: {0}")]
    Parse(String),
    /// `default_confidence` was outside `[0.0, 1.0]`.
    #[error("default_confidence must be within [0.0, 1.0], got {0}")]
    InvalidConfidence(f64),
    /// `default_count` failed to parse as an `"OP N"` count predicate.
    #[error("default_count `{0}` is not a valid count predicate")]
    InvalidDefaultCount(String),
    /// `retention_window_secs` was zero.
    #[error("retention_window_secs must be greater than zero")]
    InvalidRetentionWindow,
    /// `default_window_secs` was zero.
    #[error("default_window_secs must be greater than zero")]
    InvalidDefaultWindow,
    /// The retention window was narrower than the default condition window,
    /// which would expire events before a rule using defaults could see them.
    #[error(
        "retention_window_secs ({retention_window_secs}) is shorter than default_window_secs ({default_window_secs})"
    )]
    RetentionShorterThanDefaultWindow {
        /// Configured retention window.
        retention_window_secs: u64,
        /// Configured default condition window.
        default_window_secs: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = CorrelatorConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_document_parses_to_defaults() {
        let config = CorrelatorConfig::from_toml_str("").expect("empty document is valid");
        assert_eq!(config, CorrelatorConfig::default());
    }

    #[test]
    fn partial_override_keeps_remaining_defaults() {
        let config = CorrelatorConfig::from_toml_str("retention_window_secs = 7200\n")
            .expect("partial document is valid");
        assert_eq!(config.retention_window_secs, 7200);
        assert_eq!(config.default_window_secs, 60);
    }

    #[test]
    fn out_of_range_confidence_is_rejected() {
        let err = CorrelatorConfig::from_toml_str("default_confidence = 1.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidConfidence(_)));
    }

    #[test]
    fn malformed_default_count_is_rejected() {
        let err = CorrelatorConfig::from_toml_str("default_count = \"~= 3\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDefaultCount(_)));
    }

    #[test]
    fn retention_shorter_than_default_window_is_rejected() {
        let err = CorrelatorConfig::from_toml_str(
            "retention_window_secs = 30\ndefault_window_secs = 60\n",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::RetentionShorterThanDefaultWindow { .. }
        ));
    }
}
