// Live feed: stream-to-view reconciliation
//
// A Feed glues the supervisor, a frame decoder, the optional dedup window, the
// bounded buffer and the optional toast tray together. It owns the receiving end
// of the signal channel and is the only writer of its buffer.
//
// Two ways to drive it:
// - synchronously (`handle_envelope`, `drain_pending`, `tick`), as tests do
// - `spawn`, which moves it onto a tokio task and returns a `FeedHandle`;
//   the render layer watches `FeedSnapshot`s published on every change

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use crate::buffer::BoundedBuffer;
use crate::config::{FeedConfig, FeedKind};
use crate::decode::{AlertDecoder, FrameDecoder, LogDecoder};
use crate::dedup::DedupWindow;
use crate::error::{FeedError, Result};
use crate::event::{Event, EventId};
use crate::supervisor::{ConnectionState, Supervisor};
use crate::toast::{Toast, ToastTray};
use crate::transport::{Envelope, Frame, Signal, Transport};

/// Counters describing what the feed did with inbound traffic
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    pub admitted: u64,
    pub decode_failures: u64,
    pub ignored_frames: u64,
    pub suppressed_duplicates: u64,
    pub stale_signals: u64,
    pub last_decode_error: Option<String>,
}

/// What the render layer sees
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedSnapshot {
    pub kind: FeedKind,
    pub state: ConnectionState,
    pub status: String,
    pub capacity: usize,
    /// Newest first
    pub events: Vec<Event>,
    pub toasts: Vec<Toast>,
    pub last_error: Option<String>,
    pub diagnostics: Diagnostics,
}

impl FeedSnapshot {
    fn empty(kind: FeedKind, capacity: usize) -> Self {
        Self {
            kind,
            state: ConnectionState::Idle,
            status: status_line(kind, ConnectionState::Idle),
            capacity,
            events: Vec::new(),
            toasts: Vec::new(),
            last_error: None,
            diagnostics: Diagnostics::default(),
        }
    }
}

/// Indicator text for a connection state
pub fn status_line(kind: FeedKind, state: ConnectionState) -> String {
    let noun = match kind {
        FeedKind::Logs => "log",
        FeedKind::Alerts => "alert",
    };
    match state {
        ConnectionState::Idle => "Disconnected".to_string(),
        ConnectionState::Connecting => format!("Connecting to {} stream...", noun),
        ConnectionState::Live => "LIVE".to_string(),
        ConnectionState::Errored => "Connection lost. Retrying...".to_string(),
        ConnectionState::Paused => "Stream paused".to_string(),
    }
}

/// User actions accepted by a running feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedCommand {
    Pause,
    Resume,
    Clear,
    Dismiss(EventId),
    Shutdown,
}

pub struct Feed {
    config: FeedConfig,
    supervisor: Supervisor,
    inbox: mpsc::Receiver<Envelope>,
    decoder: Box<dyn FrameDecoder>,
    buffer: BoundedBuffer<Event>,
    dedup: Option<DedupWindow>,
    toasts: Option<ToastTray>,
    diagnostics: Diagnostics,
    snapshots: watch::Sender<FeedSnapshot>,
}

impl Feed {
    /// Build a feed with the decoder matching `config.kind`
    pub fn new(transport: Arc<dyn Transport>, config: FeedConfig) -> Result<Self> {
        let decoder: Box<dyn FrameDecoder> = match config.kind {
            FeedKind::Logs => Box::new(LogDecoder::default()),
            FeedKind::Alerts => Box::new(AlertDecoder::new()),
        };
        Self::with_decoder(transport, config, decoder)
    }

    pub fn with_decoder(
        transport: Arc<dyn Transport>,
        config: FeedConfig,
        decoder: Box<dyn FrameDecoder>,
    ) -> Result<Self> {
        config.validate()?;
        let buffer = BoundedBuffer::new(config.capacity)?;
        let (tx, inbox) = mpsc::channel(config.channel_capacity);
        let supervisor = Supervisor::new(transport, tx, config.reconnect_delay);
        let (snapshots, _) = watch::channel(FeedSnapshot::empty(config.kind, config.capacity));

        Ok(Self {
            dedup: config.dedup_window.map(DedupWindow::new),
            toasts: config.toast_ttl.map(ToastTray::new),
            config,
            supervisor,
            inbox,
            decoder,
            buffer,
            diagnostics: Diagnostics::default(),
            snapshots,
        })
    }

    pub fn kind(&self) -> FeedKind {
        self.config.kind
    }

    pub fn state(&self) -> ConnectionState {
        self.supervisor.state()
    }

    pub fn buffer(&self) -> &BoundedBuffer<Event> {
        &self.buffer
    }

    /// Current events, newest first
    pub fn events(&self) -> Vec<Event> {
        self.buffer.snapshot()
    }

    pub fn toasts(&self) -> &[Toast] {
        self.toasts.as_ref().map(|t| t.toasts()).unwrap_or(&[])
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    /// Receiver of every snapshot published from now on
    pub fn subscribe(&self) -> watch::Receiver<FeedSnapshot> {
        self.snapshots.subscribe()
    }

    /// Mount: open the first subscription
    pub fn start(&mut self) -> bool {
        let started = self.supervisor.start();
        self.publish();
        started
    }

    /// Apply one signal from a transport
    pub fn handle_envelope(&mut self, envelope: Envelope, now: Instant) {
        if !self.supervisor.accepts(envelope.generation) {
            self.diagnostics.stale_signals += 1;
            tracing::trace!(
                feed = %self.config.kind,
                generation = envelope.generation,
                "ignoring signal from released subscription"
            );
            return;
        }

        match envelope.signal {
            Signal::Opened => self.supervisor.on_open(),
            Signal::Reconnecting => self.supervisor.on_reconnecting(),
            Signal::Error(message) => self.supervisor.on_error(&message, now),
            Signal::Ended(message) => self.supervisor.on_ended(&message, now),
            Signal::Frame(frame) => {
                self.ingest(&frame, now);
            }
        }
        self.publish();
    }

    /// Handle every signal already queued, without waiting. Returns how many.
    pub fn drain_pending(&mut self, now: Instant) -> usize {
        let mut handled = 0;
        while let Ok(envelope) = self.inbox.try_recv() {
            self.handle_envelope(envelope, now);
            handled += 1;
        }
        handled
    }

    /// Decode a frame and admit it. Returns whether the buffer changed.
    fn ingest(&mut self, frame: &Frame, now: Instant) -> bool {
        let event = match self.decoder.decode(frame) {
            Ok(Some(event)) => event,
            Ok(None) => {
                self.diagnostics.ignored_frames += 1;
                return false;
            }
            Err(err) => {
                tracing::warn!(
                    feed = %self.config.kind,
                    error = %err,
                    "dropping malformed frame"
                );
                self.diagnostics.decode_failures += 1;
                self.diagnostics.last_decode_error = Some(err.to_string());
                return false;
            }
        };

        if let Some(dedup) = self.dedup.as_mut() {
            if !dedup.should_admit(&event, now) {
                self.diagnostics.suppressed_duplicates += 1;
                tracing::debug!(feed = %self.config.kind, id = %event.id, "suppressed repeat");
                return false;
            }
        }

        if let Some(toasts) = self.toasts.as_mut() {
            toasts.push(&event, now);
        }
        self.buffer.admit(event);
        self.diagnostics.admitted += 1;
        true
    }

    pub fn pause(&mut self) -> bool {
        let paused = self.supervisor.pause();
        self.publish();
        paused
    }

    /// Resume with a fresh subscription; the dedup window starts empty
    pub fn resume(&mut self) -> bool {
        let resumed = self.supervisor.resume();
        if resumed {
            if let Some(dedup) = self.dedup.as_mut() {
                dedup.reset();
            }
        }
        self.publish();
        resumed
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.publish();
    }

    /// Dismiss a toast early. Returns false if it already expired or never existed.
    pub fn dismiss(&mut self, id: &EventId) -> bool {
        let dismissed = self
            .toasts
            .as_mut()
            .map(|toasts| toasts.dismiss(id))
            .unwrap_or(false);
        if dismissed {
            self.publish();
        }
        dismissed
    }

    /// Run timers that are due: toast expiry and scheduled rebuilds
    pub fn tick(&mut self, now: Instant) {
        let expired = self
            .toasts
            .as_mut()
            .map(|toasts| toasts.expire_due(now))
            .unwrap_or(0);
        let rebuilt = self.supervisor.reconnect_if_due(now);
        if expired > 0 || rebuilt {
            self.publish();
        }
    }

    /// Earliest instant at which `tick` has work to do
    pub fn next_deadline(&self) -> Option<Instant> {
        let toast = self.toasts.as_ref().and_then(|t| t.next_expiry());
        let reconnect = self.supervisor.reconnect_at();
        match (toast, reconnect) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Unmount: release the transport whatever the state
    pub fn shutdown(&mut self) {
        self.supervisor.shutdown();
        self.publish();
    }

    pub fn apply(&mut self, command: FeedCommand, now: Instant) {
        match command {
            FeedCommand::Pause => {
                self.pause();
            }
            FeedCommand::Resume => {
                self.resume();
            }
            FeedCommand::Clear => self.clear(),
            FeedCommand::Dismiss(id) => {
                self.dismiss(&id);
            }
            FeedCommand::Shutdown => self.shutdown(),
        }
        self.tick(now);
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        let state = self.supervisor.state();
        FeedSnapshot {
            kind: self.config.kind,
            state,
            status: status_line(self.config.kind, state),
            capacity: self.buffer.capacity(),
            events: self.buffer.snapshot(),
            toasts: self.toasts().to_vec(),
            last_error: self.supervisor.last_error().map(str::to_string),
            diagnostics: self.diagnostics.clone(),
        }
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.snapshot());
    }

    /// Mount the feed on its own task
    pub fn spawn(self) -> FeedHandle {
        let (commands, rx) = mpsc::channel(32);
        let snapshots = self.subscribe();
        let task = tokio::spawn(self.run(rx));
        FeedHandle {
            commands,
            snapshots,
            task,
        }
    }

    async fn run(mut self, mut commands: mpsc::Receiver<FeedCommand>) {
        if self.state() == ConnectionState::Idle {
            self.start();
        }

        loop {
            let deadline = self.next_deadline();
            tokio::select! {
                biased;
                command = commands.recv() => match command {
                    Some(FeedCommand::Shutdown) | None => break,
                    Some(command) => self.apply(command, Instant::now()),
                },
                Some(envelope) = self.inbox.recv() => {
                    self.handle_envelope(envelope, Instant::now());
                }
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.tick(Instant::now());
                }
            }
        }

        self.shutdown();
        tracing::debug!(feed = %self.config.kind, "feed task stopped");
    }
}

impl std::fmt::Debug for Feed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Feed")
            .field("kind", &self.config.kind)
            .field("supervisor", &self.supervisor)
            .field("buffered", &self.buffer.len())
            .finish()
    }
}

/// Control handle of a spawned feed
///
/// Dropping the handle stops the feed and releases its transport.
pub struct FeedHandle {
    commands: mpsc::Sender<FeedCommand>,
    snapshots: watch::Receiver<FeedSnapshot>,
    task: JoinHandle<()>,
}

impl FeedHandle {
    async fn send(&self, command: FeedCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| FeedError::Closed)
    }

    pub async fn pause(&self) -> Result<()> {
        self.send(FeedCommand::Pause).await
    }

    pub async fn resume(&self) -> Result<()> {
        self.send(FeedCommand::Resume).await
    }

    pub async fn clear(&self) -> Result<()> {
        self.send(FeedCommand::Clear).await
    }

    pub async fn dismiss(&self, id: EventId) -> Result<()> {
        self.send(FeedCommand::Dismiss(id)).await
    }

    /// Stop the feed and wait for its task to finish
    pub async fn shutdown(self) -> Result<()> {
        // The task may already be gone; waiting on it below covers both cases.
        let _ = self.commands.send(FeedCommand::Shutdown).await;
        self.task
            .await
            .map_err(|e| FeedError::Internal(anyhow::anyhow!("feed task failed: {}", e)))
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedSnapshot> {
        self.snapshots.clone()
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> FeedSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
