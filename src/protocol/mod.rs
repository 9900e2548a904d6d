//! Transport-independent protocol types.
//!
//! This module defines the vocabulary shared by every transport and by
//! the reconnecting client.
//!
//! # Protocol Overview
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`ReadyState`] | Four-state connection lifecycle |
//! | [`Payload`] | Text or binary message |
//! | [`TransportEvent`] | Lifecycle event (`open`, `message`, `error`, `close`) |
//! | [`EventTarget`] | Ordered multi-listener registry |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `event` | Events, listeners and the registry |
//! | `payload` | Message payloads |
//! | `state` | Ready state and its numeric constants |

// ============================================================================
// Submodules
// ============================================================================

/// Lifecycle events and listener registry.
pub mod event;

/// Message payloads.
pub mod payload;

/// Ready state enumeration.
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use event::{
    CLOSE_ABNORMAL, CLOSE_NO_STATUS, CloseEvent, ErrorEvent, EventKind, EventTarget, Listener,
    ListenerId, TransportEvent,
};
pub use payload::Payload;
pub use state::{CLOSED, CLOSING, CONNECTING, OPEN, ReadyState};
