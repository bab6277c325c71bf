// STOMP over WebSocket transport
//
// This crate subscribes a DevPulse feed to a STOMP broker destination, such as
// the alert processor's `/topic/alerts` behind `/alert-ws`.
//
// - frame: STOMP 1.2 frame encoding and parsing
// - transport: the Transport implementation driving one broker session

pub mod frame;
mod transport;

pub use frame::{FrameError, StompFrame};
pub use transport::{StompTransport, DEFAULT_CONNECT_TIMEOUT, DEFAULT_SUBSCRIPTION_ID};
