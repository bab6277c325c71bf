// Connection supervisor
//
// Owns the connection state machine of one feed and the single active
// subscription. Everything here is synchronous; the feed task calls into it
// when signals, user commands or timers arrive.
//
//   Idle ──start──▶ Connecting ──open──▶ Live
//                      ▲   ▲               │ error
//          reconnecting│   │rebuild due    ▼
//                      └───┴────────── Errored ◀──task ended── Live/Connecting
//   Live/Errored/Connecting ──pause──▶ Paused ──resume──▶ Connecting

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::transport::{Envelope, ReconnectMode, SignalSink, Subscription, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Idle,
    Connecting,
    Live,
    Errored,
    Paused,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Live => "live",
            ConnectionState::Errored => "errored",
            ConnectionState::Paused => "paused",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle owner for one feed's subscription
pub struct Supervisor {
    transport: Arc<dyn Transport>,
    signals: mpsc::Sender<Envelope>,
    state: ConnectionState,
    generation: u64,
    subscription: Option<Subscription>,
    reconnect_delay: Duration,
    reconnect_at: Option<Instant>,
    last_error: Option<String>,
}

impl Supervisor {
    pub fn new(
        transport: Arc<dyn Transport>,
        signals: mpsc::Sender<Envelope>,
        reconnect_delay: Duration,
    ) -> Self {
        Self {
            transport,
            signals,
            state: ConnectionState::Idle,
            generation: 0,
            subscription: None,
            reconnect_delay,
            reconnect_at: None,
            last_error: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// When a scheduled rebuild is due, if one is pending
    pub fn reconnect_at(&self) -> Option<Instant> {
        self.reconnect_at
    }

    pub fn has_subscription(&self) -> bool {
        self.subscription.is_some()
    }

    /// Whether a signal from `generation` may still touch the feed
    pub fn accepts(&self, generation: u64) -> bool {
        self.subscription.is_some() && generation == self.generation
    }

    /// Mount: `Idle → Connecting`. Returns false from any other state.
    pub fn start(&mut self) -> bool {
        if self.state != ConnectionState::Idle {
            return false;
        }
        self.connect();
        true
    }

    /// `Connecting/Errored → Live`
    pub fn on_open(&mut self) {
        match self.state {
            ConnectionState::Connecting | ConnectionState::Errored => {
                self.transition(ConnectionState::Live);
                self.last_error = None;
            }
            _ => {}
        }
    }

    /// The transport is retrying by itself: `Errored/Live → Connecting`
    pub fn on_reconnecting(&mut self) {
        match self.state {
            ConnectionState::Errored | ConnectionState::Live => {
                self.transition(ConnectionState::Connecting);
            }
            _ => {}
        }
    }

    /// `Live/Connecting → Errored`.
    ///
    /// Rebuild-mode transports are released here and reopened by
    /// [`reconnect_if_due`](Self::reconnect_if_due) after the reconnect delay.
    pub fn on_error(&mut self, message: &str, now: Instant) {
        match self.state {
            ConnectionState::Live | ConnectionState::Connecting => {
                self.fail(message);
                if self.transport.reconnect_mode() == ReconnectMode::Rebuild {
                    self.schedule_rebuild(now);
                }
            }
            _ => {}
        }
    }

    /// The transport task returned: `Live/Connecting/Errored → Errored`.
    ///
    /// Nothing is left to retry on its own, so a rebuild is scheduled in either mode.
    pub fn on_ended(&mut self, message: &str, now: Instant) {
        match self.state {
            ConnectionState::Live | ConnectionState::Connecting => {
                self.fail(message);
                self.schedule_rebuild(now);
            }
            ConnectionState::Errored => {
                if self.last_error.is_none() {
                    self.last_error = Some(message.to_string());
                }
                self.schedule_rebuild(now);
            }
            _ => {}
        }
    }

    /// Reopen a rebuild-mode subscription once its delay has passed
    pub fn reconnect_if_due(&mut self, now: Instant) -> bool {
        match self.reconnect_at {
            Some(at) if at <= now && self.state == ConnectionState::Errored => {
                tracing::info!(source = %self.transport.describe(), "rebuilding subscription");
                self.connect();
                true
            }
            _ => false,
        }
    }

    /// User pause: tear the subscription down
    pub fn pause(&mut self) -> bool {
        match self.state {
            ConnectionState::Live | ConnectionState::Errored | ConnectionState::Connecting => {
                self.release();
                self.reconnect_at = None;
                self.transition(ConnectionState::Paused);
                true
            }
            _ => false,
        }
    }

    /// User resume: a brand-new subscription, nothing replayed
    pub fn resume(&mut self) -> bool {
        if self.state != ConnectionState::Paused {
            return false;
        }
        self.connect();
        true
    }

    /// Release the transport. Idempotent.
    pub fn disconnect(&mut self) {
        self.release();
        self.reconnect_at = None;
        if self.state != ConnectionState::Paused {
            self.transition(ConnectionState::Idle);
        }
    }

    /// Unmount: release regardless of state and go back to `Idle`
    pub fn shutdown(&mut self) {
        self.release();
        self.reconnect_at = None;
        self.transition(ConnectionState::Idle);
    }

    fn connect(&mut self) {
        self.release();
        self.generation += 1;
        let sink = SignalSink::new(self.generation, self.signals.clone());
        self.subscription = Some(Subscription::open(Arc::clone(&self.transport), sink));
        self.reconnect_at = None;
        tracing::debug!(
            source = %self.transport.describe(),
            generation = self.generation,
            "subscription opened"
        );
        self.transition(ConnectionState::Connecting);
    }

    fn fail(&mut self, message: &str) {
        tracing::warn!(
            source = %self.transport.describe(),
            error = %message,
            "connection lost"
        );
        self.last_error = Some(message.to_string());
        self.transition(ConnectionState::Errored);
    }

    fn schedule_rebuild(&mut self, now: Instant) {
        self.release();
        if self.reconnect_at.is_none() {
            self.reconnect_at = Some(now + self.reconnect_delay);
        }
    }

    fn release(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.close();
            tracing::debug!(
                generation = subscription.generation(),
                "subscription released"
            );
        }
    }

    fn transition(&mut self, next: ConnectionState) {
        if self.state != next {
            tracing::info!(
                source = %self.transport.describe(),
                from = %self.state,
                to = %next,
                "connection state changed"
            );
            self.state = next;
        }
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor")
            .field("source", &self.transport.describe())
            .field("state", &self.state)
            .field("generation", &self.generation)
            .field("subscription", &self.subscription)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::ManualTransport;

    fn supervisor(mode: ReconnectMode) -> (Supervisor, ManualTransport, mpsc::Receiver<Envelope>) {
        let transport = ManualTransport::new(mode);
        let (tx, rx) = mpsc::channel(16);
        let supervisor = Supervisor::new(
            Arc::new(transport.clone()),
            tx,
            Duration::from_millis(100),
        );
        (supervisor, transport, rx)
    }

    #[tokio::test]
    async fn test_start_open_error_cycle_native() {
        let (mut sup, transport, _rx) = supervisor(ReconnectMode::Native);
        assert_eq!(sup.state(), ConnectionState::Idle);

        assert!(sup.start());
        assert!(!sup.start());
        assert_eq!(sup.state(), ConnectionState::Connecting);
        transport.wait_for_open(1).await;

        sup.on_open();
        assert_eq!(sup.state(), ConnectionState::Live);

        sup.on_error("network drop", Instant::now());
        assert_eq!(sup.state(), ConnectionState::Errored);
        assert!(sup.has_subscription());
        assert_eq!(sup.reconnect_at(), None);
        assert_eq!(sup.last_error(), Some("network drop"));

        sup.on_reconnecting();
        assert_eq!(sup.state(), ConnectionState::Connecting);
        sup.on_open();
        assert_eq!(sup.state(), ConnectionState::Live);
        assert_eq!(sup.last_error(), None);
        assert_eq!(transport.opens(), 1);
    }

    #[tokio::test]
    async fn test_rebuild_mode_releases_and_reopens() {
        let (mut sup, transport, _rx) = supervisor(ReconnectMode::Rebuild);
        sup.start();
        transport.wait_for_open(1).await;
        sup.on_open();

        let now = Instant::now();
        sup.on_error("broker went away", now);
        assert_eq!(sup.state(), ConnectionState::Errored);
        assert!(!sup.has_subscription());
        assert!(!sup.accepts(1));

        assert!(!sup.reconnect_if_due(now + Duration::from_millis(50)));
        assert!(sup.reconnect_if_due(now + Duration::from_millis(100)));
        assert_eq!(sup.state(), ConnectionState::Connecting);
        assert_eq!(sup.generation(), 2);
        transport.wait_for_open(2).await;
        assert_eq!(transport.opens(), 2);
    }

    #[tokio::test]
    async fn test_ended_task_is_rebuilt_in_native_mode() {
        let (mut sup, transport, _rx) = supervisor(ReconnectMode::Native);
        sup.start();
        transport.wait_for_open(1).await;
        sup.on_open();

        let now = Instant::now();
        sup.on_ended("stream ended", now);
        assert_eq!(sup.state(), ConnectionState::Errored);
        assert!(!sup.has_subscription());
        assert_eq!(sup.reconnect_at(), Some(now + Duration::from_millis(100)));

        // A later end report does not push the rebuild back
        sup.on_ended("stream ended", now + Duration::from_millis(50));
        assert_eq!(sup.reconnect_at(), Some(now + Duration::from_millis(100)));

        assert!(sup.reconnect_if_due(now + Duration::from_millis(100)));
        assert_eq!(sup.generation(), 2);
        transport.wait_for_open(2).await;
    }

    #[tokio::test]
    async fn test_pause_from_errored_drops_pending_rebuild() {
        let (mut sup, transport, _rx) = supervisor(ReconnectMode::Rebuild);
        sup.start();
        transport.wait_for_open(1).await;
        sup.on_open();

        let now = Instant::now();
        sup.on_error("broker went away", now);
        assert!(sup.pause());
        assert_eq!(sup.state(), ConnectionState::Paused);
        assert!(!sup.reconnect_if_due(now + Duration::from_secs(1)));
        assert_eq!(sup.state(), ConnectionState::Paused);
        assert_eq!(transport.opens(), 1);
    }

    #[tokio::test]
    async fn test_pause_and_resume() {
        let (mut sup, transport, _rx) = supervisor(ReconnectMode::Native);
        assert!(!sup.pause());

        sup.start();
        transport.wait_for_open(1).await;
        assert!(sup.pause());
        assert_eq!(sup.state(), ConnectionState::Paused);
        assert!(!sup.has_subscription());
        assert!(!sup.accepts(1));
        assert!(!sup.pause());

        assert!(sup.resume());
        assert_eq!(sup.state(), ConnectionState::Connecting);
        assert!(sup.accepts(2));
        assert!(!sup.accepts(1));
        assert!(!sup.resume());
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let (mut sup, transport, _rx) = supervisor(ReconnectMode::Native);
        sup.start();
        transport.wait_for_open(1).await;

        sup.disconnect();
        sup.disconnect();
        assert_eq!(sup.state(), ConnectionState::Idle);
        assert!(!sup.has_subscription());

        assert!(sup.start());
        assert_eq!(sup.generation(), 2);
    }

    #[tokio::test]
    async fn test_shutdown_from_paused() {
        let (mut sup, transport, _rx) = supervisor(ReconnectMode::Native);
        sup.start();
        transport.wait_for_open(1).await;
        sup.pause();

        sup.shutdown();
        assert_eq!(sup.state(), ConnectionState::Idle);
        sup.shutdown();
        assert_eq!(sup.state(), ConnectionState::Idle);
    }
}
