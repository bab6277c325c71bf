// SSE transport implementation
//
// One subscription is a loop of HTTP requests. Each request that is answered
// with an event stream reports Opened, forwards every event as a Frame, and on
// end or failure reports Error, waits the retry interval and reports
// Reconnecting before trying again.

use async_trait::async_trait;
use devpulse_core::config::{parse_url, DEFAULT_RECONNECT_DELAY};
use devpulse_core::error::{FeedError, Result};
use devpulse_core::transport::{Frame, ReconnectMode, SignalSink, Transport};
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Retry interval used until the server sends a `retry:` field
pub const DEFAULT_RETRY: Duration = DEFAULT_RECONNECT_DELAY;

/// Bound on establishing the TCP/TLS connection
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const EVENT_STREAM: &str = "text/event-stream";
const LAST_EVENT_ID: &str = "Last-Event-ID";
const DEFAULT_EVENT_NAME: &str = "message";

/// How one connection attempt finished
enum StreamEnd {
    /// The server closed the response
    Eof,
    /// Nobody is listening any more
    SinkClosed,
}

/// Cursor carried across reconnects of one subscription
#[derive(Debug)]
struct Cursor {
    last_event_id: Option<String>,
    retry: Duration,
}

/// Transport for a Server-Sent Events endpoint
#[derive(Debug, Clone)]
pub struct SseTransport {
    client: Client,
    url: Url,
    retry: Duration,
}

impl SseTransport {
    /// Create a transport for `url`, which must be http or https
    pub fn new(url: &str) -> Result<Self> {
        let url = parse_url(url, &["http", "https"])?;
        let client = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| FeedError::config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url,
            retry: DEFAULT_RETRY,
        })
    }

    /// Use a custom HTTP client
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Initial retry interval; the server may override it
    pub fn with_retry(mut self, retry: Duration) -> Self {
        self.retry = retry;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn stream_once(&self, sink: &SignalSink, cursor: &mut Cursor) -> Result<StreamEnd> {
        let mut request = self
            .client
            .get(self.url.clone())
            .header(ACCEPT, EVENT_STREAM)
            .header(CACHE_CONTROL, "no-cache");
        if let Some(id) = &cursor.last_event_id {
            request = request.header(LAST_EVENT_ID, id.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| FeedError::transport(format!("request to {} failed: {}", self.url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FeedError::transport(format!(
                "{} answered with status {}: {}",
                self.url, status, body
            )));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !content_type.starts_with(EVENT_STREAM) {
            return Err(FeedError::transport(format!(
                "{} answered with content type {:?}, expected {}",
                self.url, content_type, EVENT_STREAM
            )));
        }

        tracing::info!(url = %self.url, "event stream opened");
        if !sink.opened().await {
            return Ok(StreamEnd::SinkClosed);
        }

        let mut events = response.bytes_stream().eventsource();
        while let Some(item) = events.next().await {
            let event = item.map_err(|e| FeedError::transport(format!("stream error: {}", e)))?;

            if let Some(retry) = event.retry {
                tracing::debug!(retry_ms = retry.as_millis() as u64, "server set retry interval");
                cursor.retry = retry;
            }
            if !event.id.is_empty() {
                cursor.last_event_id = Some(event.id.clone());
            }

            let name = if event.event.is_empty() {
                DEFAULT_EVENT_NAME.to_string()
            } else {
                event.event
            };
            let mut frame = Frame::new(name, event.data);
            if !event.id.is_empty() {
                frame = frame.with_id(event.id);
            }

            tracing::trace!(event = %frame.event, "frame received");
            if !sink.frame(frame).await {
                return Ok(StreamEnd::SinkClosed);
            }
        }

        Ok(StreamEnd::Eof)
    }
}

#[async_trait]
impl Transport for SseTransport {
    fn describe(&self) -> String {
        format!("sse {}", self.url)
    }

    fn reconnect_mode(&self) -> ReconnectMode {
        ReconnectMode::Native
    }

    async fn run(&self, sink: SignalSink) -> Result<()> {
        let mut cursor = Cursor {
            last_event_id: None,
            retry: self.retry,
        };

        loop {
            let reason = match self.stream_once(&sink, &mut cursor).await {
                Ok(StreamEnd::SinkClosed) => return Ok(()),
                Ok(StreamEnd::Eof) => "stream ended".to_string(),
                Err(err) => err.to_string(),
            };

            tracing::warn!(url = %self.url, error = %reason, "event stream interrupted");
            if !sink.error(reason).await {
                return Ok(());
            }

            tokio::time::sleep(cursor.retry).await;
            if !sink.reconnecting().await {
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_http_url() {
        let err = SseTransport::new("ws://localhost:8080/api/logs/stream").unwrap_err();
        assert!(err.is_fatal());
        assert!(SseTransport::new("not a url").is_err());
    }

    #[test]
    fn test_defaults() {
        let transport = SseTransport::new("http://localhost:8080/api/logs/stream").unwrap();
        assert_eq!(transport.reconnect_mode(), ReconnectMode::Native);
        assert_eq!(transport.retry, DEFAULT_RETRY);
        assert_eq!(
            transport.describe(),
            "sse http://localhost:8080/api/logs/stream"
        );
    }
}
