// Live Feed Core
//
// This crate provides the client-side live event ingestion of the DevPulse
// dashboard: bounded, ordered, live-updating views over server-pushed log and
// alert streams.
//
// Key design decisions:
// - Transports (SSE, STOMP) sit behind the Transport trait; the supervisor's
//   state machine never knows which one it drives
// - Transports push signals onto a bounded channel; one feed task drains it and
//   is the only writer of the buffer, dedup window and toast tray
// - Every subscription has a generation; signals from released generations are
//   dropped, so nothing mutates the feed after teardown
// - Decode failures and transport errors never escape the feed; they show up
//   in state and diagnostics. Only bad configuration fails, and it fails at setup
// - The render layer reads FeedSnapshots from a watch channel

pub mod api;
pub mod buffer;
pub mod config;
pub mod decode;
pub mod dedup;
pub mod error;
pub mod event;
pub mod feed;
pub mod supervisor;
pub mod toast;
pub mod transport;

// In-memory transports for examples and testing
pub mod memory;

// Re-exports for convenience
pub use api::{ApiResponse, Page};
pub use buffer::BoundedBuffer;
pub use config::{EndpointConfig, FeedConfig, FeedKind};
pub use decode::{AlertDecoder, FrameDecoder, LogDecoder};
pub use dedup::DedupWindow;
pub use error::{FeedError, Result};
pub use event::{Event, EventId, Level};
pub use feed::{status_line, Diagnostics, Feed, FeedCommand, FeedHandle, FeedSnapshot};
pub use supervisor::{ConnectionState, Supervisor};
pub use toast::{Toast, ToastTray};
pub use transport::{
    Envelope, Frame, ReconnectMode, Signal, SignalSink, Subscription, Transport,
};
