// Alert toast tray
//
// Every admitted alert shows up as a toast that expires after a fixed delay unless
// it is dismissed first. Expiry is deadline based so the feed task can sleep until
// the next one instead of running a timer per toast.

use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

use crate::event::{Event, EventId, Level};

/// Default lifetime of a toast
pub const DEFAULT_TOAST_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Toast {
    pub id: EventId,
    pub title: String,
    pub message: String,
    pub level: Level,
    #[serde(skip)]
    pub expires_at: Instant,
}

/// Visible toasts in arrival order (oldest first)
#[derive(Debug, Clone)]
pub struct ToastTray {
    ttl: Duration,
    toasts: Vec<Toast>,
}

impl ToastTray {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            toasts: Vec::new(),
        }
    }

    /// Show a toast for `event`, expiring `ttl` after `now`
    pub fn push(&mut self, event: &Event, now: Instant) {
        self.toasts.push(Toast {
            id: event.id.clone(),
            title: event.service_name.clone(),
            message: event.message.clone(),
            level: event.level,
            expires_at: now + self.ttl,
        });
    }

    /// Remove a toast before it expires. Returns false if it was already gone.
    pub fn dismiss(&mut self, id: &EventId) -> bool {
        let before = self.toasts.len();
        self.toasts.retain(|toast| &toast.id != id);
        self.toasts.len() != before
    }

    /// Drop every toast whose deadline has passed. Returns how many were removed.
    pub fn expire_due(&mut self, now: Instant) -> usize {
        let before = self.toasts.len();
        self.toasts.retain(|toast| toast.expires_at > now);
        before - self.toasts.len()
    }

    pub fn next_expiry(&self) -> Option<Instant> {
        self.toasts.iter().map(|toast| toast.expires_at).min()
    }

    pub fn toasts(&self) -> &[Toast] {
        &self.toasts
    }

    pub fn len(&self) -> usize {
        self.toasts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.toasts.is_empty()
    }

    pub fn clear(&mut self) {
        self.toasts.clear();
    }
}

impl Default for ToastTray {
    fn default() -> Self {
        Self::new(DEFAULT_TOAST_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert(id: i64) -> Event {
        Event::new(id, "2026-10-16T08:30:00Z", Level::Error, "HighErrorRate", "boom")
    }

    #[test]
    fn test_toasts_expire_after_ttl() {
        let mut tray = ToastTray::default();
        let t0 = Instant::now();
        tray.push(&alert(1), t0);
        tray.push(&alert(2), t0 + Duration::from_secs(2));

        assert_eq!(tray.next_expiry(), Some(t0 + DEFAULT_TOAST_TTL));
        assert_eq!(tray.expire_due(t0 + Duration::from_secs(4)), 0);
        assert_eq!(tray.expire_due(t0 + Duration::from_secs(5)), 1);
        assert_eq!(tray.toasts()[0].id, EventId::Number(2));
        assert_eq!(tray.expire_due(t0 + Duration::from_secs(7)), 1);
        assert!(tray.is_empty());
        assert_eq!(tray.next_expiry(), None);
    }

    #[test]
    fn test_expiry_after_dismiss_is_noop() {
        let mut tray = ToastTray::default();
        let t0 = Instant::now();
        tray.push(&alert(1), t0);

        assert!(tray.dismiss(&EventId::Number(1)));
        assert!(!tray.dismiss(&EventId::Number(1)));
        assert_eq!(tray.expire_due(t0 + Duration::from_secs(10)), 0);
    }

    #[test]
    fn test_toast_carries_event_fields() {
        let mut tray = ToastTray::new(Duration::from_secs(1));
        tray.push(&alert(9), Instant::now());

        let toast = &tray.toasts()[0];
        assert_eq!(toast.title, "HighErrorRate");
        assert_eq!(toast.message, "boom");
        assert_eq!(toast.level, Level::Error);
    }
}
