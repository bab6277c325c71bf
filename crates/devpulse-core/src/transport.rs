// Push transport capability
//
// A transport opens one subscription to a server-pushed source and reports what
// happens on it as signals: opened, frame, error, reconnecting. Adapters live in
// their own crates (SSE, STOMP over WebSocket); the supervisor only sees this trait.
//
// Signals go through a bounded channel tagged with the generation of the
// subscription that produced them. The feed drops anything from a generation that
// is no longer current, which is what makes teardown safe against late callbacks.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::Result;

/// One raw inbound frame before decoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Event name (SSE `event:` field) or destination (STOMP)
    pub event: String,
    /// Undecoded payload
    pub data: String,
    /// Transport-level id, when the source provides one
    pub id: Option<String>,
}

impl Frame {
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
            id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// What a transport reports about its subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// The source accepted the subscription
    Opened,
    /// A frame arrived
    Frame(Frame),
    /// The connection failed or dropped
    Error(String),
    /// The transport is retrying on its own
    Reconnecting,
    /// The transport task returned; nothing will retry until the supervisor rebuilds
    Ended(String),
}

/// A signal tagged with the subscription generation that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub generation: u64,
    pub signal: Signal,
}

/// How a transport recovers after an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectMode {
    /// The transport retries by itself and keeps the subscription alive (SSE)
    Native,
    /// The transport gives up; the supervisor tears down and opens a new one (STOMP)
    Rebuild,
}

/// Sending half handed to a transport for one subscription
#[derive(Debug, Clone)]
pub struct SignalSink {
    generation: u64,
    tx: mpsc::Sender<Envelope>,
}

impl SignalSink {
    pub fn new(generation: u64, tx: mpsc::Sender<Envelope>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Send a signal, waiting for channel capacity.
    ///
    /// Returns false once the feed is gone; transports should stop then.
    pub async fn send(&self, signal: Signal) -> bool {
        self.tx
            .send(Envelope {
                generation: self.generation,
                signal,
            })
            .await
            .is_ok()
    }

    pub async fn opened(&self) -> bool {
        self.send(Signal::Opened).await
    }

    pub async fn frame(&self, frame: Frame) -> bool {
        self.send(Signal::Frame(frame)).await
    }

    pub async fn error(&self, message: impl Into<String>) -> bool {
        self.send(Signal::Error(message.into())).await
    }

    pub async fn reconnecting(&self) -> bool {
        self.send(Signal::Reconnecting).await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// A push source the supervisor can subscribe to
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Human-readable source description for logs
    fn describe(&self) -> String;

    fn reconnect_mode(&self) -> ReconnectMode;

    /// Run one subscription, reporting through `sink`.
    ///
    /// Native-mode transports keep retrying until the feed goes away. Rebuild-mode
    /// transports return when the connection ends; an `Err` describes why. Whenever
    /// `run` returns while the feed still listens, the supervisor schedules a rebuild.
    async fn run(&self, sink: SignalSink) -> Result<()>;
}

/// Handle to one running subscription
///
/// Closing aborts the transport task. Dropping the handle closes it too, so the
/// transport is released on every exit path.
pub struct Subscription {
    generation: u64,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Spawn `transport.run` on the current runtime
    pub fn open(transport: Arc<dyn Transport>, sink: SignalSink) -> Self {
        let generation = sink.generation();
        let task = tokio::spawn(async move {
            let outcome = transport.run(sink.clone()).await;
            let reason = match outcome {
                Ok(()) => "stream ended".to_string(),
                Err(e) => e.to_string(),
            };
            tracing::debug!(generation, %reason, "subscription task finished");
            sink.send(Signal::Ended(reason)).await;
        });

        Self {
            generation,
            task: Some(task),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Release the transport. Safe to call more than once.
    pub fn close(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.task.is_none()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("generation", &self.generation)
            .field("closed", &self.is_closed())
            .finish()
    }
}
