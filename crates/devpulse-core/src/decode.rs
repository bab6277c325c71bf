// Frame decoders
//
// Turn raw frames into events. Decoding runs on the feed task right before
// admission, so a frame is decoded and admitted in one step.

use chrono::{SecondsFormat, Utc};
use serde::Deserialize;

use crate::error::{FeedError, Result};
use crate::event::{Event, EventId, Level};
use crate::transport::Frame;

/// SSE event name used by the log stream
pub const LOG_EVENT_NAME: &str = "log";

/// Service name used for alerts that carry neither a service nor a rule name
pub const DEFAULT_ALERT_SOURCE: &str = "alert-processor";

/// Decodes frames of one feed
pub trait FrameDecoder: Send + Sync {
    /// `Ok(None)` means the frame is not meant for this feed and is skipped.
    fn decode(&self, frame: &Frame) -> Result<Option<Event>>;
}

/// Decoder for the log stream: named SSE events carrying an `Event` JSON object
#[derive(Debug, Clone)]
pub struct LogDecoder {
    event_name: String,
}

impl LogDecoder {
    pub fn new(event_name: impl Into<String>) -> Self {
        Self {
            event_name: event_name.into(),
        }
    }
}

impl Default for LogDecoder {
    fn default() -> Self {
        Self::new(LOG_EVENT_NAME)
    }
}

impl FrameDecoder for LogDecoder {
    fn decode(&self, frame: &Frame) -> Result<Option<Event>> {
        if frame.event != self.event_name {
            return Ok(None);
        }
        let event: Event = serde_json::from_str(&frame.data)?;
        Ok(Some(event))
    }
}

/// Alert as published on the alert topic
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlertPayload {
    id: EventId,
    #[serde(default, alias = "ruleId")]
    rule_name: Option<String>,
    message: String,
    #[serde(default)]
    service_name: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    trace_id: Option<String>,
}

/// Decoder for the alert topic. Every alert is shown at error level.
#[derive(Debug, Clone, Default)]
pub struct AlertDecoder;

impl AlertDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl FrameDecoder for AlertDecoder {
    fn decode(&self, frame: &Frame) -> Result<Option<Event>> {
        let payload: AlertPayload = serde_json::from_str(&frame.data)?;
        if payload.message.trim().is_empty() {
            return Err(FeedError::decode("alert without message"));
        }

        let service_name = payload
            .service_name
            .filter(|s| !s.is_empty())
            .or(payload.rule_name)
            .unwrap_or_else(|| DEFAULT_ALERT_SOURCE.to_string());
        let timestamp = payload
            .timestamp
            .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true));

        Ok(Some(Event {
            id: payload.id,
            timestamp,
            level: Level::Error,
            service_name,
            message: payload.message,
            trace_id: payload.trace_id,
        }))
    }
}
