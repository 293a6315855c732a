//! WebSocket push channel: message decoding, reconnect policy and the
//! connection loop.

pub mod client;
pub mod message;
pub mod reconnect;

pub use client::{PushClient, dispatch_text};
pub use message::{PushEvent, parse_message};
pub use reconnect::{ConnectionState, ReconnectConfig, Reconnector};
