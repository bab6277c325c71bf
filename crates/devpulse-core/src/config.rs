// Feed and endpoint configuration
//
// FeedConfig is a plain settings struct with per-feed defaults and a fluent API.
// EndpointConfig is read from DEVPULSE_* environment variables; malformed values
// are reported as configuration errors instead of being silently replaced.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use url::Url;

use crate::dedup::DEFAULT_DEDUP_WINDOW;
use crate::error::{FeedError, Result};
use crate::toast::DEFAULT_TOAST_TTL;

/// Which live feed a component belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedKind {
    Logs,
    Alerts,
}

impl FeedKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedKind::Logs => "logs",
            FeedKind::Alerts => "alerts",
        }
    }
}

impl fmt::Display for FeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Default number of log lines kept on screen
pub const DEFAULT_LOG_CAPACITY: usize = 100;

/// Default number of alerts kept for paged display
pub const DEFAULT_ALERT_CAPACITY: usize = 500;

/// Default wait before rebuilding a failed subscription
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Default capacity of the transport-to-feed signal channel
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Settings for one live feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedConfig {
    pub kind: FeedKind,

    /// Maximum number of events kept in the display buffer
    pub capacity: usize,

    /// Suppress immediate repeats of the same message inside this window
    pub dedup_window: Option<Duration>,

    /// Show each admitted event as a toast for this long
    pub toast_ttl: Option<Duration>,

    /// Delay before a rebuild-mode transport is reopened after an error
    pub reconnect_delay: Duration,

    /// Bound of the signal channel between transport and feed
    pub channel_capacity: usize,
}

impl FeedConfig {
    /// Log feed defaults: 100 lines, no dedup, no toasts
    pub fn logs() -> Self {
        Self {
            kind: FeedKind::Logs,
            capacity: DEFAULT_LOG_CAPACITY,
            dedup_window: None,
            toast_ttl: None,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Alert feed defaults: burst dedup and toasts enabled
    pub fn alerts() -> Self {
        Self {
            kind: FeedKind::Alerts,
            capacity: DEFAULT_ALERT_CAPACITY,
            dedup_window: Some(DEFAULT_DEDUP_WINDOW),
            toast_ttl: Some(DEFAULT_TOAST_TTL),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    pub fn for_kind(kind: FeedKind) -> Self {
        match kind {
            FeedKind::Logs => Self::logs(),
            FeedKind::Alerts => Self::alerts(),
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_dedup_window(mut self, window: Option<Duration>) -> Self {
        self.dedup_window = window;
        self
    }

    pub fn with_toast_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.toast_ttl = ttl;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Reject settings that cannot work
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(FeedError::config("feed capacity must be at least 1"));
        }
        if self.channel_capacity == 0 {
            return Err(FeedError::config("channel capacity must be at least 1"));
        }
        if self.dedup_window == Some(Duration::ZERO) {
            return Err(FeedError::config(
                "dedup window must be positive (omit it to disable dedup)",
            ));
        }
        Ok(())
    }
}

/// Where the dashboard's collaborators live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    /// Base URL of the REST collaborators
    pub api_url: String,
    /// SSE endpoint of the log stream
    pub log_stream_url: String,
    /// WebSocket endpoint of the STOMP broker
    pub alert_ws_url: String,
    /// STOMP destination carrying alerts
    pub alert_topic: String,
    pub logs: FeedConfig,
    pub alerts: FeedConfig,
}

impl EndpointConfig {
    pub const DEFAULT_API_URL: &'static str = "http://localhost:8080";
    pub const DEFAULT_ALERT_WS_URL: &'static str = "ws://localhost:8083/alert-ws/websocket";
    pub const DEFAULT_ALERT_TOPIC: &'static str = "/topic/alerts";

    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup` (used by tests and embedding code)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_url = get("DEVPULSE_API_URL")
            .unwrap_or_else(|| Self::DEFAULT_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let log_stream_url =
            get("DEVPULSE_LOG_STREAM_URL").unwrap_or_else(|| format!("{}/api/logs/stream", api_url));
        let alert_ws_url =
            get("DEVPULSE_ALERT_WS_URL").unwrap_or_else(|| Self::DEFAULT_ALERT_WS_URL.to_string());
        let alert_topic =
            get("DEVPULSE_ALERT_TOPIC").unwrap_or_else(|| Self::DEFAULT_ALERT_TOPIC.to_string());

        let reconnect_delay = parse_millis(&get, "DEVPULSE_RECONNECT_DELAY_MS")?
            .unwrap_or(DEFAULT_RECONNECT_DELAY);

        let mut logs = FeedConfig::logs().with_reconnect_delay(reconnect_delay);
        if let Some(capacity) = parse_number(&get, "DEVPULSE_LOG_BUFFER_CAPACITY")? {
            logs = logs.with_capacity(capacity);
        }

        let mut alerts = FeedConfig::alerts().with_reconnect_delay(reconnect_delay);
        if let Some(capacity) = parse_number(&get, "DEVPULSE_ALERT_BUFFER_CAPACITY")? {
            alerts = alerts.with_capacity(capacity);
        }
        if let Some(window) = parse_millis(&get, "DEVPULSE_DEDUP_WINDOW_MS")? {
            alerts = alerts.with_dedup_window(Some(window));
        }
        if let Some(ttl) = parse_millis(&get, "DEVPULSE_TOAST_TTL_MS")? {
            alerts = alerts.with_toast_ttl(Some(ttl));
        }

        let config = Self {
            api_url,
            log_stream_url,
            alert_ws_url,
            alert_topic,
            logs,
            alerts,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check URLs, topic and feed settings
    pub fn validate(&self) -> Result<()> {
        parse_url(&self.api_url, &["http", "https"])?;
        parse_url(&self.log_stream_url, &["http", "https"])?;
        parse_url(&self.alert_ws_url, &["ws", "wss"])?;
        validate_topic(&self.alert_topic)?;
        self.logs.validate()?;
        self.alerts.validate()
    }
}

/// Parse `raw` as a URL with one of the allowed schemes
pub fn parse_url(raw: &str, schemes: &[&str]) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| FeedError::config(format!("invalid URL {}: {}", raw, e)))?;
    if !schemes.contains(&url.scheme()) {
        return Err(FeedError::config(format!(
            "URL {} must use one of: {}",
            raw,
            schemes.join(", ")
        )));
    }
    Ok(url)
}

/// A STOMP destination must be an absolute path such as `/topic/alerts`
pub fn validate_topic(topic: &str) -> Result<()> {
    if !topic.starts_with('/') || topic.len() < 2 || topic.contains(char::is_whitespace) {
        return Err(FeedError::config(format!("invalid topic: {:?}", topic)));
    }
    Ok(())
}

fn parse_number<G>(get: &G, key: &str) -> Result<Option<usize>>
where
    G: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|raw| {
            raw.trim()
                .parse::<usize>()
                .map_err(|e| FeedError::config(format!("{}={:?}: {}", key, raw, e)))
        })
        .transpose()
}

fn parse_millis<G>(get: &G, key: &str) -> Result<Option<Duration>>
where
    G: Fn(&str) -> Option<String>,
{
    Ok(parse_number(get, key)?.map(|ms| Duration::from_millis(ms as u64)))
}
