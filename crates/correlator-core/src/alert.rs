// crates/correlator-core/src/alert.rs
// ============================================================================
// Module: Alert Generation and Dispatch
// Description: Alert records, the sink trait, and fan-out delivery.
// Purpose: Turn a triggered rule firing into a delivered alert without ever
// letting a misbehaving sink affect evaluation or other sinks.
// Dependencies: serde, serde_json, std::sync::mpsc, std::io, crate::rule
// ============================================================================

//! ## Overview
//! An [`Alert`] is built once per triggered rule firing and handed to every
//! registered [`AlertSink`] in turn ([`AlertGenerator::dispatch`]). A sink
//! that fails is marked degraded and skipped on subsequent alerts — it never
//! blocks delivery to the other sinks, and a degraded sink's drops are
//! counted rather than silently lost. This mirrors a fan-out broker: delivery
//! is independent per destination, and failure of one destination is never
//! visible to another.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::sync::mpsc::SendError;
use std::sync::mpsc::Sender;

use serde::Deserialize;
use serde::Serialize;

use crate::error::SinkError;
use crate::event::Event;
use crate::rule::Rule;
use crate::time::EventTime;

// ============================================================================
// SECTION: Alert
// ============================================================================

/// A single generated alert, ready for delivery to registered sinks.
///
/// `trigger_event` and `bound_events` hold independent copies of the events
/// that produced this firing, so the alert remains meaningful after the
/// window store has expired the originals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// When this alert was generated (the triggering event's ingest time).
    pub timestamp: EventTime,
    /// Rule identifier that produced this alert.
    pub rule_id: String,
    /// Rule name, copied at firing time.
    pub rule_name: String,
    /// Rendered alert message.
    pub message: String,
    /// Effective severity: the action override, else the rule's severity.
    pub severity: crate::rule::Severity,
    /// Effective confidence: the action override, else the configured default.
    pub confidence: f64,
    /// MITRE ATT&CK technique identifiers copied from the rule.
    pub mitre_techniques: Vec<String>,
    /// An independent copy of the event whose admission triggered this firing.
    pub trigger_event: Event,
    /// Independent copies of the events bound into each satisfied
    /// condition's partition, one inner list per condition in rule order.
    pub bound_events: Vec<Vec<Event>>,
    /// The rule action's free-form tag, copied into a single-element list
    /// (empty when the action carried no tag).
    pub tags: Vec<String>,
}

impl Alert {
    /// Builds an alert from a triggered rule and its decision graph's bound
    /// events, applying the rule's action overrides (falling back to the
    /// rule's own severity and the configured default confidence).
    #[must_use]
    pub fn from_rule_firing(
        rule: &Rule,
        timestamp: EventTime,
        trigger_event: Event,
        bound_events: Vec<Vec<Event>>,
        default_confidence: f64,
    ) -> Self {
        let severity = rule.action.severity.unwrap_or(rule.severity);
        let confidence = rule
            .action
            .confidence
            .or(rule.confidence)
            .unwrap_or(default_confidence);
        let message = rule
            .action
            .message
            .clone()
            .unwrap_or_else(|| rule.name.clone());
        let tags = rule.action.tag.clone().into_iter().collect();

        Self {
            timestamp,
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            message,
            severity,
            confidence,
            mitre_techniques: rule.mitre_techniques.clone(),
            trigger_event,
            bound_events,
            tags,
        }
    }
}

// ============================================================================
// SECTION: Sink Trait
// ============================================================================

/// A delivery destination for generated alerts.
///
/// Implementors must never panic; a delivery failure is reported through
/// the `Result`, not through an unwind, so the generator can continue
/// fanning out to the remaining sinks.
pub trait AlertSink {
    /// Attempts to deliver a single alert.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when delivery fails. The generator marks the
    /// sink degraded and continues with the remaining sinks.
    fn deliver(&mut self, alert: &Alert) -> Result<(), SinkError>;

    /// A short, stable name for this sink, used in generator diagnostics.
    fn name(&self) -> &str;
}

// ============================================================================
// SECTION: Log Sink
// ============================================================================

/// Writes one JSON line per alert to any [`Write`] destination (a file, a
/// pipe, or a process's stdout handle passed in explicitly by the host).
pub struct LogSink<W: Write> {
    name: String,
    writer: W,
}

impl<W: Write> LogSink<W> {
    /// Builds a log sink writing JSONL records to `writer`.
    pub fn new(name: impl Into<String>, writer: W) -> Self {
        Self {
            name: name.into(),
            writer,
        }
    }
}

impl<W: Write> AlertSink for LogSink<W> {
    fn deliver(&mut self, alert: &Alert) -> Result<(), SinkError> {
        let line = serde_json::to_string(alert)
            .map_err(|e| SinkError::DeliveryFailed(format!("serialize alert: {e}")))?;
        writeln!(self.writer, "{line}")
            .map_err(|e| SinkError::DeliveryFailed(format!("write alert: {e}")))?;
        self.writer
            .flush()
            .map_err(|e| SinkError::DeliveryFailed(format!("flush alert: {e}")))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ============================================================================
// SECTION: Channel Sink
// ============================================================================

/// Forwards alerts to an in-process consumer over a standard channel.
pub struct ChannelSink {
    name: String,
    sender: Sender<Alert>,
}

impl ChannelSink {
    /// Builds a channel sink forwarding onto `sender`.
    #[must_use]
    pub fn new(name: impl Into<String>, sender: Sender<Alert>) -> Self {
        Self {
            name: name.into(),
            sender,
        }
    }
}

impl AlertSink for ChannelSink {
    fn deliver(&mut self, alert: &Alert) -> Result<(), SinkError> {
        self.sender.send(alert.clone()).map_err(|SendError(_)| {
            SinkError::DeliveryFailed("receiver has disconnected".to_string())
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ============================================================================
// SECTION: Alert Generator
// ============================================================================

/// A registered sink plus its degradation state.
struct SinkHandle {
    sink: Box<dyn AlertSink>,
    degraded: bool,
}

/// Per-dispatch delivery summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SinkOutcome {
    /// Number of sinks the alert was successfully delivered to.
    pub delivered: usize,
    /// Number of sinks the alert was dropped for (degraded or failing).
    pub dropped: usize,
}

/// Fans a generated alert out to every registered sink, independently.
///
/// # Invariants
/// - A failing sink is marked degraded and skipped on every subsequent
///   alert until [`AlertGenerator::clear_degraded`] is called; it is never
///   retried automatically, so a persistently broken sink cannot stall
///   delivery to the others.
#[derive(Default)]
pub struct AlertGenerator {
    sinks: Vec<SinkHandle>,
}

impl AlertGenerator {
    /// Builds a generator with no registered sinks.
    #[must_use]
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    /// Registers a sink. Order of registration is the order alerts are
    /// fanned out in.
    pub fn register(&mut self, sink: Box<dyn AlertSink>) {
        self.sinks.push(SinkHandle {
            sink,
            degraded: false,
        });
    }

    /// Delivers `alert` to every non-degraded sink, marking any sink that
    /// fails as degraded.
    pub fn dispatch(&mut self, alert: &Alert) -> SinkOutcome {
        let mut outcome = SinkOutcome::default();
        for handle in &mut self.sinks {
            if handle.degraded {
                outcome.dropped += 1;
                continue;
            }
            match handle.sink.deliver(alert) {
                Ok(()) => outcome.delivered += 1,
                Err(_) => {
                    handle.degraded = true;
                    outcome.dropped += 1;
                }
            }
        }
        outcome
    }

    /// Clears the degraded flag on every registered sink, allowing delivery
    /// attempts to resume. Intended for a host-driven recovery action (e.g.
    /// after reconnecting a downstream consumer).
    pub fn clear_degraded(&mut self) {
        for handle in &mut self.sinks {
            handle.degraded = false;
        }
    }

    /// Names of every registered sink currently marked degraded.
    #[must_use]
    pub fn degraded_sink_names(&self) -> Vec<&str> {
        self.sinks
            .iter()
            .filter(|h| h.degraded)
            .map(|h| h.sink.name())
            .collect()
    }
}

// ============================================================================
// SECTION: Alert Ring
// ============================================================================

/// A bounded, oldest-evicted-first ring of recently generated alerts, kept
/// so a host can inspect what fired recently without a log sink configured.
///
/// # Invariants
/// - `len() <= capacity` always holds; `push` evicts the oldest entry first
///   when the ring is full.
#[derive(Debug)]
pub struct AlertRing {
    capacity: usize,
    entries: std::collections::VecDeque<Alert>,
}

impl AlertRing {
    /// Builds a ring holding at most `capacity` alerts. A `capacity` of
    /// zero is accepted and simply discards every push.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: std::collections::VecDeque::with_capacity(capacity.min(1024)),
        }
    }

    /// Appends an alert, evicting the oldest entry first if full.
    pub fn push(&mut self, alert: Alert) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(alert);
    }

    /// Iterates retained alerts, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Alert> {
        self.entries.iter()
    }

    /// Number of alerts currently retained.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the ring currently holds no alerts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc::channel;

    use serde_json::json;

    use super::*;
    use crate::rule::AlertAction;
    use crate::rule::Severity;

    fn sample_trigger_event() -> Event {
        Event::from_json(
            &json!({"type": "auth_fail", "timestamp": 100, "user": "alice"}),
            EventTime::from_unix_seconds(100),
        )
        .expect("fixture event must parse")
    }

    fn sample_rule() -> Rule {
        Rule {
            id: "credential_stuffing".to_string(),
            name: "Credential Stuffing".to_string(),
            description: None,
            severity: Severity::High,
            confidence: None,
            mitre_techniques: vec!["T1110".to_string()],
            conditions: Vec::new(),
            action: AlertAction {
                message: None,
                severity: None,
                confidence: None,
                tag: None,
            },
        }
    }

    struct AlwaysFailsSink;
    impl AlertSink for AlwaysFailsSink {
        fn deliver(&mut self, _alert: &Alert) -> Result<(), SinkError> {
            Err(SinkError::DeliveryFailed("boom".to_string()))
        }
        fn name(&self) -> &str {
            "always_fails"
        }
    }

    #[test]
    fn alert_falls_back_to_rule_name_and_severity() {
        let rule = sample_rule();
        let alert = Alert::from_rule_firing(&rule, EventTime::from_unix_seconds(100), sample_trigger_event(), vec![], 0.5);
        assert_eq!(alert.message, "Credential Stuffing");
        assert_eq!(alert.severity, Severity::High);
        assert!((alert.confidence - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn failing_sink_is_degraded_and_skipped_on_next_dispatch() {
        let mut generator = AlertGenerator::new();
        generator.register(Box::new(AlwaysFailsSink));
        let rule = sample_rule();
        let alert = Alert::from_rule_firing(&rule, EventTime::from_unix_seconds(100), sample_trigger_event(), vec![], 0.5);

        let first = generator.dispatch(&alert);
        assert_eq!(first.dropped, 1);
        assert_eq!(generator.degraded_sink_names(), vec!["always_fails"]);

        let second = generator.dispatch(&alert);
        assert_eq!(second.dropped, 1);
        assert_eq!(second.delivered, 0);
    }

    #[test]
    fn channel_sink_delivers_and_detects_disconnect() {
        let (tx, rx) = channel();
        let mut generator = AlertGenerator::new();
        generator.register(Box::new(ChannelSink::new("channel", tx)));
        let rule = sample_rule();
        let alert = Alert::from_rule_firing(&rule, EventTime::from_unix_seconds(100), sample_trigger_event(), vec![], 0.5);

        let outcome = generator.dispatch(&alert);
        assert_eq!(outcome.delivered, 1);
        assert_eq!(rx.recv().unwrap().rule_id, "credential_stuffing");

        drop(rx);
        let outcome = generator.dispatch(&alert);
        assert_eq!(outcome.dropped, 1);
    }

    #[derive(Clone, Default)]
    struct SharedBuf(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0
                .lock()
                .expect("test mutex is never poisoned")
                .extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn log_sink_writes_one_json_line() {
        let buffer = SharedBuf::default();
        let mut generator = AlertGenerator::new();
        generator.register(Box::new(LogSink::new("log", buffer.clone())));
        let rule = sample_rule();
        let alert = Alert::from_rule_firing(&rule, EventTime::from_unix_seconds(100), sample_trigger_event(), vec![], 0.5);
        let outcome = generator.dispatch(&alert);
        assert_eq!(outcome.delivered, 1);

        let text = String::from_utf8(buffer.0.lock().expect("test mutex is never poisoned").clone())
            .expect("valid utf8");
        assert_eq!(text.lines().count(), 1);
        assert!(text.contains("credential_stuffing"));
    }
}
