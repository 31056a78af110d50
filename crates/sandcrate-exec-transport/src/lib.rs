//! # sandcrate-exec-transport
//!
//! Wire protocol and transport for the Sandcrate plugin executor.
//!
//! This crate provides:
//! - Protocol codec for outbound commands and inbound envelopes
//! - Endpoint resolution (ws/wss URL, injected credential)
//! - WebSocket connection lifecycle with tagged transport events
//!
//! ## Architecture
//!
//! This is Layer 1 in the architecture - it depends on sandcrate-exec-core
//! and knows nothing about session semantics.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod connection;
pub mod endpoint;

// Re-export commonly used types
pub use codec::{decode_envelope, encode_command, InboundEnvelope, OutboundCommand};
pub use connection::{ConnectionId, ConnectionManager, TransportEvent};
pub use endpoint::Endpoint;
