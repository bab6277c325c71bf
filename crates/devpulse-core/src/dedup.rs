// Burst deduplication for the alerts feed
//
// Single-slot: only an immediate repeat of the last admitted message inside the
// window is suppressed. A repeat separated by any other admitted message gets through.

use std::time::Duration;
use tokio::time::Instant;

use crate::event::Event;

/// Default suppression window for repeated alert messages
pub const DEFAULT_DEDUP_WINDOW: Duration = Duration::from_millis(500);

/// Fingerprint of the last admitted event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupFingerprint {
    pub message: String,
    pub admitted_at: Instant,
}

/// Dedup window state: the last admitted message and when it was admitted
#[derive(Debug, Clone)]
pub struct DedupWindow {
    window: Duration,
    last: Option<DedupFingerprint>,
}

impl DedupWindow {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    /// Decide whether `event` arriving at `now` should be admitted.
    ///
    /// Suppressed events leave the fingerprint untouched, so the window keeps
    /// counting from the last admitted event.
    pub fn should_admit(&mut self, event: &Event, now: Instant) -> bool {
        if let Some(last) = &self.last {
            let elapsed = now.saturating_duration_since(last.admitted_at);
            if last.message == event.message && elapsed < self.window {
                return false;
            }
        }

        self.last = Some(DedupFingerprint {
            message: event.message.clone(),
            admitted_at: now,
        });
        true
    }

    pub fn last(&self) -> Option<&DedupFingerprint> {
        self.last.as_ref()
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

impl Default for DedupWindow {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_WINDOW)
    }
}
