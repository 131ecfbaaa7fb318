// crates/correlator-core/src/event.rs
// ============================================================================
// Module: Correlator Event Model
// Description: Immutable, typed event records admitted into the window store.
// Purpose: Replace the "bag of fields" wire shape with a tagged variant over
// known fields plus an overflow map for rule-extensible fields.
// Dependencies: serde, serde_json, crate::time, crate::error
// ============================================================================

//! ## Overview
//! An [`Event`] is the unit the correlator reasons about. It is built once
//! from an untrusted wire payload via [`Event::from_json`] and never mutated
//! afterward. Known fields are typed; anything the wire payload carries
//! beyond the known set is preserved in [`Event::extra`] so rules can still
//! filter on it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use serde_json::Value;

use crate::error::EventSchemaError;
use crate::time::EventTime;

// ============================================================================
// SECTION: Event Type Tag
// ============================================================================

/// Enumerated event-type tag, open-ended via [`EventType::Other`].
///
/// # Invariants
/// - `Other` never holds an empty string; empty tags are rejected at
///   admission time ([`EventSchemaError::EmptyType`]).
/// - Serializes and deserializes as a plain wire string (see
///   [`EventType::as_str`]/[`EventType::parse`]), not as a tagged enum.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventType {
    /// Failed authentication attempt.
    AuthFail,
    /// Successful authentication.
    AuthSuccess,
    /// A process was started.
    ProcessStart,
    /// A network connection was established or observed.
    NetworkConnect,
    /// A file was accessed.
    FileAccess,
    /// A registry key or value changed.
    RegistryChange,
    /// A DNS query was observed.
    DnsQuery,
    /// Any event type not enumerated above, recognized only by rules that
    /// name it explicitly.
    Other(String),
}

impl Serialize for EventType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

impl EventType {
    /// Parses an event-type tag from its wire string form.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "auth_fail" => Self::AuthFail,
            "auth_success" => Self::AuthSuccess,
            "process_start" => Self::ProcessStart,
            "network_connect" => Self::NetworkConnect,
            "file_access" => Self::FileAccess,
            "registry_change" => Self::RegistryChange,
            "dns_query" => Self::DnsQuery,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns the canonical wire string for this event type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::AuthFail => "auth_fail",
            Self::AuthSuccess => "auth_success",
            Self::ProcessStart => "process_start",
            Self::NetworkConnect => "network_connect",
            Self::FileAccess => "file_access",
            Self::RegistryChange => "registry_change",
            Self::DnsQuery => "dns_query",
            Self::Other(tag) => tag.as_str(),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Traffic direction for network events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Connection initiated from outside toward the observed host.
    Inbound,
    /// Connection initiated by the observed host toward the outside.
    Outbound,
}

impl Direction {
    /// Parses a direction tag, returning `None` for anything unrecognized.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "inbound" => Some(Self::Inbound),
            "outbound" => Some(Self::Outbound),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Event
// ============================================================================

/// An immutable, normalized security event.
///
/// # Invariants
/// - Never mutated after construction (Invariant E1).
/// - `event_type` and `timestamp` are always present; every other field is
///   optional and may be absent from the originating collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Enumerated event-type tag.
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Second-precision event instant.
    pub timestamp: EventTime,
    /// Advisory producing-collector identifier; never used for matching.
    #[serde(default)]
    pub source: String,
    /// Acting user, when known.
    #[serde(default)]
    pub user: Option<String>,
    /// Source IP address, when known.
    #[serde(default)]
    pub source_ip: Option<String>,
    /// Source port, when known.
    #[serde(default)]
    pub source_port: Option<u16>,
    /// Destination IP address, when known.
    #[serde(default)]
    pub dest_ip: Option<String>,
    /// Destination port, when known.
    #[serde(default)]
    pub dest_port: Option<u16>,
    /// Transport or application protocol, when known.
    #[serde(default)]
    pub protocol: Option<String>,
    /// Network direction, when known.
    #[serde(default)]
    pub direction: Option<Direction>,
    /// Process image name, when known.
    #[serde(default)]
    pub process_name: Option<String>,
    /// Full command line, when known.
    #[serde(default)]
    pub command_line: Option<String>,
    /// Parent process image name, when known.
    #[serde(default)]
    pub parent_process: Option<String>,
    /// Process identifier, when known.
    #[serde(default)]
    pub pid: Option<u64>,
    /// Filesystem path, when known.
    #[serde(default)]
    pub file_path: Option<String>,
    /// Operation verb (e.g. `create`, `delete`), when known.
    #[serde(default)]
    pub operation: Option<String>,
    /// Queried domain name, when known.
    #[serde(default)]
    pub domain: Option<String>,
    /// DNS query type, when known.
    #[serde(default)]
    pub query_type: Option<String>,
    /// Collector-reported severity, when known.
    #[serde(default)]
    pub severity: Option<String>,
    /// Free-text message, when known.
    #[serde(default)]
    pub message: Option<String>,
    /// Every field the wire payload carried that is not one of the above,
    /// preserved so rules can still filter on it.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Event {
    /// Builds an event from an untrusted JSON payload, resolving a missing
    /// or non-finite `timestamp` to `ingest_time` rather than failing
    /// admission outright.
    ///
    /// # Errors
    ///
    /// Returns [`EventSchemaError`] when the payload is not an object, or
    /// lacks a non-empty `type` field, or lacks a `timestamp` key entirely.
    pub fn from_json(raw: &Value, ingest_time: EventTime) -> Result<Self, EventSchemaError> {
        let object = raw.as_object().ok_or(EventSchemaError::NotAnObject)?;

        let type_value = object.get("type").ok_or(EventSchemaError::MissingType)?;
        let type_str = type_value.as_str().ok_or(EventSchemaError::MissingType)?;
        if type_str.is_empty() {
            return Err(EventSchemaError::EmptyType);
        }
        let event_type = EventType::parse(type_str);

        let timestamp_value = object
            .get("timestamp")
            .ok_or(EventSchemaError::MissingTimestamp)?;
        let timestamp = parse_timestamp(timestamp_value).unwrap_or(ingest_time);

        let source = object
            .get("source")
            .or_else(|| object.get("_source"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let mut event = Self {
            event_type,
            timestamp,
            source,
            user: None,
            source_ip: None,
            source_port: None,
            dest_ip: None,
            dest_port: None,
            protocol: None,
            direction: None,
            process_name: None,
            command_line: None,
            parent_process: None,
            pid: None,
            file_path: None,
            operation: None,
            domain: None,
            query_type: None,
            severity: None,
            message: None,
            extra: BTreeMap::new(),
        };

        for (key, value) in object {
            match key.as_str() {
                "type" | "timestamp" | "source" | "_source" => {}
                "user" => event.user = value.as_str().map(str::to_string),
                "source_ip" => event.source_ip = value.as_str().map(str::to_string),
                "source_port" => event.source_port = value.as_u64().and_then(|v| u16::try_from(v).ok()),
                "dest_ip" => event.dest_ip = value.as_str().map(str::to_string),
                "dest_port" => event.dest_port = value.as_u64().and_then(|v| u16::try_from(v).ok()),
                "protocol" => event.protocol = value.as_str().map(str::to_string),
                "direction" => event.direction = value.as_str().and_then(Direction::parse),
                "process_name" => event.process_name = value.as_str().map(str::to_string),
                "command_line" => event.command_line = value.as_str().map(str::to_string),
                "parent_process" => event.parent_process = value.as_str().map(str::to_string),
                "pid" => event.pid = value.as_u64(),
                "file_path" => event.file_path = value.as_str().map(str::to_string),
                "operation" => event.operation = value.as_str().map(str::to_string),
                "domain" => event.domain = value.as_str().map(str::to_string),
                "query_type" => event.query_type = value.as_str().map(str::to_string),
                "severity" => event.severity = value.as_str().map(str::to_string),
                "message" => event.message = value.as_str().map(str::to_string),
                other => {
                    event.extra.insert(other.to_string(), value.clone());
                }
            }
        }

        Ok(event)
    }

    /// Looks up a field by name, checking known typed fields first and
    /// falling back to [`Event::extra`]. Returns `None` when the field is
    /// absent, which predicate evaluation treats as a silent non-match.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<Value> {
        match name {
            "type" => Some(Value::String(self.event_type.as_str().to_string())),
            "timestamp" => Some(Value::from(self.timestamp.unix_seconds())),
            "source" => Some(Value::String(self.source.clone())),
            "user" => self.user.clone().map(Value::String),
            "source_ip" => self.source_ip.clone().map(Value::String),
            "source_port" => self.source_port.map(Value::from),
            "dest_ip" => self.dest_ip.clone().map(Value::String),
            "dest_port" => self.dest_port.map(Value::from),
            "protocol" => self.protocol.clone().map(Value::String),
            "direction" => self.direction.map(|d| {
                Value::String(
                    match d {
                        Direction::Inbound => "inbound",
                        Direction::Outbound => "outbound",
                    }
                    .to_string(),
                )
            }),
            "process_name" => self.process_name.clone().map(Value::String),
            "command_line" => self.command_line.clone().map(Value::String),
            "parent_process" => self.parent_process.clone().map(Value::String),
            "pid" => self.pid.map(Value::from),
            "file_path" => self.file_path.clone().map(Value::String),
            "operation" => self.operation.clone().map(Value::String),
            "domain" => self.domain.clone().map(Value::String),
            "query_type" => self.query_type.clone().map(Value::String),
            "severity" => self.severity.clone().map(Value::String),
            "message" => self.message.clone().map(Value::String),
            other => self.extra.get(other).cloned(),
        }
    }
}

/// Parses a `timestamp` JSON value as either a unix-seconds number or an
/// RFC3339/bare-integer string, per the ingress wire format.
fn parse_timestamp(value: &Value) -> Option<EventTime> {
    match value {
        Value::Number(number) => EventTime::from_json_number(number),
        Value::String(text) => EventTime::parse(text),
        _ => None,
    }
}
