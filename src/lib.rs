//! resocket - Reconnecting, send-queueing WebSocket clients.
//!
//! This library layers two conveniences over a raw WebSocket transport:
//!
//! - **Send queueing**: [`QueuedTransport`] buffers payloads sent before
//!   the connection opens and flushes them, in order, on open.
//! - **Reconnection**: [`ClientFactory`] binds a transport type and a
//!   resolver once, and produces [`Client`]s that can swap their transport
//!   without losing event subscribers.
//!
//! # Architecture
//!
//! Everything is built on the [`Transport`] trait:
//!
//! - [`WebSocket`] is the native transport (tokio-tungstenite I/O task)
//! - [`QueuedTransport<T>`] wraps any transport and is itself a transport
//! - [`Client<T, P>`] owns one transport at a time and forwards its events
//!
//! Events flow through [`EventTarget`] registries. A client exposes two
//! notification channels that both fire for every event: ordered
//! multi-listeners and one single-slot handler per event kind.
//!
//! # Quick Start
//!
//! ```no_run
//! use resocket::{ClientFactory, ClientOptions, QueuedTransport, Result, WebSocket};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let factory = ClientFactory::<QueuedTransport<WebSocket>, String>::new(|room: &String| {
//!         Ok(ClientOptions::new(format!("ws://chat.example.com/{room}")).protocol("chat"))
//!     });
//!
//!     let client = factory.connect("lobby".to_owned())?;
//!     client.set_onmessage(|event| println!("received {:?}", event.payload()));
//!
//!     // Queued until the handshake completes
//!     client.send("hello")?;
//!
//!     // Later: move to another room, keeping every subscriber
//!     client.close(None, None)?;
//!     client.reconnect_with("general".to_owned())?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `native-tls` | TLS for `wss://` URLs. Without it only `ws://` handshakes succeed |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | [`ClientFactory`], [`Client`], [`ClientOptions`] |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`protocol`] | Ready state, payloads, events, [`EventTarget`] |
//! | [`transport`] | [`Transport`] trait, [`WebSocket`], [`QueuedTransport`] |

// ============================================================================
// Modules
// ============================================================================

/// Reconnectable client layer.
///
/// Use [`ClientFactory::new`] to bind a transport and resolver.
pub mod client;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Protocol vocabulary shared by transports and clients.
pub mod protocol;

/// Transport trait and implementations.
pub mod transport;

#[cfg(test)]
mod testing;

// ============================================================================
// Re-exports
// ============================================================================

// Client types
pub use client::{Client, ClientFactory, ClientOptions, Resolver};

// Error types
pub use error::{Error, Result};

// Protocol types
pub use protocol::{
    CLOSED, CLOSING, CONNECTING, CloseEvent, ErrorEvent, EventKind, EventTarget, Listener,
    ListenerId, OPEN, Payload, ReadyState, TransportEvent,
};

// Transport types
pub use transport::{QueuedTransport, Transport, WebSocket};
