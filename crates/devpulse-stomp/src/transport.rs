// STOMP transport implementation
//
// One subscription is one WebSocket session: connect, send CONNECT, wait for
// CONNECTED, SUBSCRIBE to the topic, then forward every MESSAGE body as a Frame
// named after its destination. The session ends on close, ERROR or a socket
// failure, and the supervisor decides when to open the next one. When the feed
// stops listening, the session is closed with DISCONNECT.

use async_trait::async_trait;
use devpulse_core::config::{parse_url, validate_topic};
use devpulse_core::error::{FeedError, Result};
use devpulse_core::transport::{Frame, ReconnectMode, SignalSink, Transport};
use futures::{Sink, SinkExt, StreamExt};
use std::fmt::Display;
use std::time::Duration;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message;
use url::Url;

use crate::frame::{self, parse_all, StompFrame};

/// Bound on the WebSocket handshake
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub const DEFAULT_SUBSCRIPTION_ID: &str = "sub-0";

/// Transport for one destination on a STOMP broker
#[derive(Debug, Clone)]
pub struct StompTransport {
    url: Url,
    topic: String,
    host: String,
    subscription_id: String,
    connect_timeout: Duration,
}

impl StompTransport {
    /// `url` must be ws or wss; `topic` an absolute destination like `/topic/alerts`
    pub fn new(url: &str, topic: &str) -> Result<Self> {
        let url = parse_url(url, &["ws", "wss"])?;
        validate_topic(topic)?;
        let host = url.host_str().unwrap_or("localhost").to_string();
        Ok(Self {
            url,
            topic: topic.to_string(),
            host,
            subscription_id: DEFAULT_SUBSCRIPTION_ID.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        })
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    fn ws_error(&self, context: &str, err: impl Display) -> FeedError {
        FeedError::transport(format!("{} {}: {}", context, self.url, err))
    }

    /// Say DISCONNECT and close the socket; the peer may already be gone
    async fn leave<S>(&self, write: &mut S)
    where
        S: Sink<Message> + Unpin,
        S::Error: Display,
    {
        if let Err(e) = write
            .send(Message::text(StompFrame::disconnect().encode()))
            .await
        {
            tracing::debug!(url = %self.url, error = %e, "DISCONNECT not delivered");
        }
        let _ = write.close().await;
        tracing::debug!(url = %self.url, "STOMP session closed");
    }
}

#[async_trait]
impl Transport for StompTransport {
    fn describe(&self) -> String {
        format!("stomp {} {}", self.url, self.topic)
    }

    fn reconnect_mode(&self) -> ReconnectMode {
        ReconnectMode::Rebuild
    }

    async fn run(&self, sink: SignalSink) -> Result<()> {
        let (socket, _) = timeout(self.connect_timeout, connect_async(self.url.as_str()))
            .await
            .map_err(|_| self.ws_error("timed out connecting to", "handshake not completed"))?
            .map_err(|e| self.ws_error("failed to connect to", e))?;
        let (mut write, mut read) = socket.split();

        write
            .send(Message::text(StompFrame::connect(&self.host).encode()))
            .await
            .map_err(|e| self.ws_error("failed to send CONNECT to", e))?;

        let mut subscribed = false;
        while let Some(message) = read.next().await {
            let message = message.map_err(|e| self.ws_error("read failed on", e))?;
            let text = match message {
                Message::Text(text) => text.as_str().to_string(),
                Message::Binary(bytes) => match std::str::from_utf8(&bytes) {
                    Ok(text) => text.to_string(),
                    Err(err) => {
                        tracing::warn!(url = %self.url, error = %err, "dropping non-UTF-8 STOMP frame");
                        continue;
                    }
                },
                Message::Close(close) => {
                    tracing::info!(url = %self.url, ?close, "broker closed the connection");
                    return Ok(());
                }
                _ => continue,
            };

            let frames = match parse_all(&text) {
                Ok(frames) => frames,
                Err(err) => {
                    tracing::warn!(url = %self.url, error = %err, "dropping unparseable STOMP frame");
                    continue;
                }
            };

            for stomp in frames {
                match stomp.command.as_str() {
                    frame::CONNECTED => {
                        if subscribed {
                            continue;
                        }
                        tracing::info!(
                            url = %self.url,
                            version = stomp.header("version").unwrap_or("1.0"),
                            topic = %self.topic,
                            "STOMP session established"
                        );
                        write
                            .send(Message::text(
                                StompFrame::subscribe(&self.subscription_id, &self.topic).encode(),
                            ))
                            .await
                            .map_err(|e| self.ws_error("failed to send SUBSCRIBE to", e))?;
                        subscribed = true;
                        if !sink.opened().await {
                            self.leave(&mut write).await;
                            return Ok(());
                        }
                    }
                    frame::MESSAGE => {
                        let destination = stomp
                            .header("destination")
                            .unwrap_or(self.topic.as_str())
                            .to_string();
                        let id = stomp.header("message-id").map(str::to_string);
                        let mut inbound = Frame::new(destination, stomp.body);
                        if let Some(id) = id {
                            inbound = inbound.with_id(id);
                        }
                        if !sink.frame(inbound).await {
                            self.leave(&mut write).await;
                            return Ok(());
                        }
                    }
                    frame::ERROR => {
                        let reason = stomp
                            .header("message")
                            .map(str::to_string)
                            .unwrap_or_else(|| stomp.body.clone());
                        return Err(FeedError::transport(format!("broker error: {}", reason)));
                    }
                    frame::RECEIPT => {
                        tracing::debug!(receipt = ?stomp.header("receipt-id"), "receipt");
                    }
                    other => {
                        tracing::debug!(command = other, "ignoring STOMP frame");
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validates_url_and_topic() {
        assert!(StompTransport::new("http://localhost:8083/alert-ws", "/topic/alerts")
            .unwrap_err()
            .is_fatal());
        assert!(StompTransport::new("ws://localhost:8083/alert-ws/websocket", "alerts")
            .unwrap_err()
            .is_fatal());

        let transport =
            StompTransport::new("ws://localhost:8083/alert-ws/websocket", "/topic/alerts").unwrap();
        assert_eq!(transport.reconnect_mode(), ReconnectMode::Rebuild);
        assert_eq!(transport.host, "localhost");
        assert_eq!(transport.topic(), "/topic/alerts");
    }
}
