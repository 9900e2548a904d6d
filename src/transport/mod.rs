//! Transport layer.
//!
//! A transport is a bidirectional message connection with a four-state
//! lifecycle. Everything above this module talks to transports through the
//! [`Transport`] trait.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────────────┐     ┌─────────────┐
//! │ Client<T, P>     │────►│ QueuedTransport<T>   │────►│ WebSocket   │
//! │ (reconnects)     │     │ (buffers until open) │     │ (tokio I/O) │
//! └──────────────────┘     └──────────────────────┘     └─────────────┘
//! ```
//!
//! Each layer is optional: a client can wrap a bare [`WebSocket`], and a
//! [`QueuedTransport`] can be used without a client.
//!
//! # Event Delivery
//!
//! A transport dispatches its events into the [`EventTarget`] passed to
//! [`Transport::connect`]. Callers register listeners on that target
//! before connecting, so the `open` event can never fire unobserved.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `queued` | Send-buffering decorator |
//! | `websocket` | tokio-tungstenite WebSocket client |

// ============================================================================
// Imports
// ============================================================================

use crate::error::Result;
use crate::protocol::{EventKind, EventTarget, Listener, ListenerId, Payload, ReadyState};

// ============================================================================
// Submodules
// ============================================================================

/// Send-buffering transport decorator.
pub mod queued;

/// Native WebSocket transport.
pub mod websocket;

// ============================================================================
// Re-exports
// ============================================================================

pub use queued::QueuedTransport;
pub use websocket::WebSocket;

// ============================================================================
// Transport
// ============================================================================

/// Capability set shared by every transport.
///
/// Implementors own one connection. A transport is never reused after it
/// closes; reconnecting means constructing a new one.
pub trait Transport: Send + Sync + 'static {
    /// Starts connecting to `url`, offering `protocols` as sub-protocols.
    ///
    /// Returns immediately in [`ReadyState::Connecting`]. Lifecycle events
    /// are dispatched into `events`.
    ///
    /// # Errors
    ///
    /// Configuration errors only (bad URL, bad sub-protocol, no runtime).
    /// Network failures are reported as `error`/`close` events.
    fn connect(url: &str, protocols: &[String], events: EventTarget) -> Result<Self>
    where
        Self: Sized;

    /// Returns the URL this transport connects to.
    fn url(&self) -> &str;

    /// Returns the sub-protocol selected by the server, if any.
    fn protocol(&self) -> Option<String>;

    /// Returns the current ready state.
    fn ready_state(&self) -> ReadyState;

    /// Sends a payload.
    fn send(&self, payload: Payload) -> Result<()>;

    /// Starts the closing handshake.
    fn close(&self, code: Option<u16>, reason: Option<&str>) -> Result<()>;

    /// Returns the registry this transport dispatches into.
    fn events(&self) -> &EventTarget;

    /// Registers a listener for `kind`.
    #[inline]
    fn add_event_listener(&self, kind: EventKind, listener: Listener) -> ListenerId {
        self.events().add_listener(kind, listener)
    }

    /// Removes a listener.
    #[inline]
    fn remove_event_listener(&self, id: ListenerId) -> bool {
        self.events().remove_listener(id)
    }
}
