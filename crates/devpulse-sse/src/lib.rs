// Server-Sent Events transport
//
// This crate connects a DevPulse feed to an SSE endpoint such as the log
// service's `/api/logs/stream`. Reconnection is handled here, the way a browser
// EventSource would: the supervisor only hears Error and Reconnecting signals
// and keeps the subscription.

mod transport;

pub use transport::{SseTransport, DEFAULT_CONNECT_TIMEOUT, DEFAULT_RETRY};

// Re-export core types for convenience
pub use devpulse_core::transport::{ReconnectMode, Transport};
