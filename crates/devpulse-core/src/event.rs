// Event entity type
//
// One record of either live feed. Log events arrive in this shape directly;
// alert payloads are mapped into it by the alert decoder.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Identity of an event. Services emit either string or numeric ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventId {
    Number(i64),
    Text(String),
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventId::Number(n) => write!(f, "{}", n),
            EventId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for EventId {
    fn from(id: i64) -> Self {
        EventId::Number(id)
    }
}

impl From<&str> for EventId {
    fn from(id: &str) -> Self {
        EventId::Text(id.to_string())
    }
}

impl From<String> for EventId {
    fn from(id: String) -> Self {
        EventId::Text(id)
    }
}

/// Severity of a log line or alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
    /// Any label the dashboard does not know about
    Unknown,
}

impl Level {
    /// Parse a level label, case-insensitively
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_uppercase().as_str() {
            "DEBUG" | "TRACE" => Level::Debug,
            "INFO" => Level::Info,
            "WARN" | "WARNING" => Level::Warn,
            "ERROR" | "CRITICAL" | "FATAL" => Level::Error,
            _ => Level::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Level {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let label = String::deserialize(deserializer)?;
        Ok(Level::from_label(&label))
    }
}

/// A single log line or alert as shown by the dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: EventId,
    /// ISO-8601 timestamp as sent by the producing service
    pub timestamp: String,
    pub level: Level,
    pub service_name: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

impl Event {
    /// Create a new event
    pub fn new(
        id: impl Into<EventId>,
        timestamp: impl Into<String>,
        level: Level,
        service_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            timestamp: timestamp.into(),
            level,
            service_name: service_name.into(),
            message: message.into(),
            trace_id: None,
        }
    }

    /// Attach a trace id
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    /// Parse the timestamp for display. Returns `None` for unparsable input.
    pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|ts| ts.with_timezone(&Utc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_log_payload_deserializes() {
        let event: Event = serde_json::from_value(json!({
            "id": "65f1c2",
            "timestamp": "2026-10-16T08:30:00Z",
            "level": "WARN",
            "serviceName": "producer-order",
            "message": "slow query",
            "traceId": "abc123"
        }))
        .unwrap();

        assert_eq!(event.id, EventId::from("65f1c2"));
        assert_eq!(event.level, Level::Warn);
        assert_eq!(event.service_name, "producer-order");
        assert_eq!(event.trace_id.as_deref(), Some("abc123"));
        assert!(event.parsed_timestamp().is_some());
    }

    #[test]
    fn test_numeric_id_and_unknown_level() {
        let event: Event = serde_json::from_value(json!({
            "id": 42,
            "timestamp": "not a date",
            "level": "notice",
            "serviceName": "svc",
            "message": "m"
        }))
        .unwrap();

        assert_eq!(event.id, EventId::Number(42));
        assert_eq!(event.level, Level::Unknown);
        assert!(event.trace_id.is_none());
        assert!(event.parsed_timestamp().is_none());
    }

    #[test]
    fn test_level_labels_are_case_insensitive() {
        assert_eq!(Level::from_label("error"), Level::Error);
        assert_eq!(Level::from_label("Warning"), Level::Warn);
        assert_eq!(Level::from_label(" info "), Level::Info);
    }

    #[test]
    fn test_serializes_camel_case_without_empty_trace() {
        let event = Event::new(7i64, "2026-10-16T08:30:00Z", Level::Info, "svc", "hello");
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["serviceName"], "svc");
        assert_eq!(value["level"], "INFO");
        assert!(value.get("traceId").is_none());
    }
}
