// In-memory transports for examples and testing
//
// These transports never touch the network, making them useful for:
// - Unit tests of the supervisor and feed
// - Driving a feed by hand from a demo or a render-layer test

use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::Result;
use crate::transport::{ReconnectMode, Signal, SignalSink, Transport};

// ============================================================================
// ManualTransport - Hands every subscription's sink to the test
// ============================================================================

/// Transport whose subscriptions stay open until aborted
///
/// Each opened subscription records its sink; tests push signals through it to
/// simulate the server. Old sinks keep working after teardown, which is how late
/// callbacks from a torn-down subscription are simulated.
#[derive(Debug, Clone)]
pub struct ManualTransport {
    mode: ReconnectMode,
    sinks: Arc<Mutex<Vec<SignalSink>>>,
}

impl ManualTransport {
    pub fn new(mode: ReconnectMode) -> Self {
        Self {
            mode,
            sinks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Number of subscriptions opened so far
    pub fn opens(&self) -> usize {
        self.sinks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Sink of the `n`-th subscription (1-based), if it has been opened
    pub fn sink(&self, n: usize) -> Option<SignalSink> {
        if n == 0 {
            return None;
        }
        self.sinks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(n - 1)
            .cloned()
    }

    /// Yield until the `n`-th subscription has started, then return its sink
    pub async fn wait_for_open(&self, n: usize) -> SignalSink {
        loop {
            if let Some(sink) = self.sink(n) {
                return sink;
            }
            tokio::task::yield_now().await;
        }
    }
}

impl Default for ManualTransport {
    fn default() -> Self {
        Self::new(ReconnectMode::Native)
    }
}

#[async_trait]
impl Transport for ManualTransport {
    fn describe(&self) -> String {
        "manual".to_string()
    }

    fn reconnect_mode(&self) -> ReconnectMode {
        self.mode
    }

    async fn run(&self, sink: SignalSink) -> Result<()> {
        self.sinks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sink);
        std::future::pending::<()>().await;
        Ok(())
    }
}

// ============================================================================
// ScriptedTransport - Replays a fixed list of signals
// ============================================================================

/// Transport that replays the same signals on every subscription
///
/// In `Native` mode the subscription then idles like a quiet stream; in `Rebuild`
/// mode it returns, which the supervisor sees as the connection ending.
#[derive(Debug, Clone)]
pub struct ScriptedTransport {
    mode: ReconnectMode,
    script: Vec<Signal>,
}

impl ScriptedTransport {
    pub fn new(mode: ReconnectMode, script: Vec<Signal>) -> Self {
        Self { mode, script }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    fn describe(&self) -> String {
        "scripted".to_string()
    }

    fn reconnect_mode(&self) -> ReconnectMode {
        self.mode
    }

    async fn run(&self, sink: SignalSink) -> Result<()> {
        for signal in &self.script {
            if !sink.send(signal.clone()).await {
                return Ok(());
            }
        }
        if self.mode == ReconnectMode::Native {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}
