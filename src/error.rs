//! Error types for resocket.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use resocket::{Result, Error};
//!
//! fn example(client: &Client<WebSocket, String>) -> Result<()> {
//!     client.send("hello")?;
//!     client.reconnect()?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::InvalidUrl`], [`Error::InvalidArgument`], [`Error::Resolve`] |
//! | State | [`Error::InvalidState`] |
//! | Connection | [`Error::ConnectionClosed`] |
//! | External | [`Error::WebSocket`], [`Error::Json`] |
//!
//! Failures of an established connection are never returned from these
//! methods. They arrive as [`TransportEvent::Error`] and
//! [`TransportEvent::Close`] events.
//!
//! [`TransportEvent::Error`]: crate::protocol::TransportEvent::Error
//! [`TransportEvent::Close`]: crate::protocol::TransportEvent::Close

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::protocol::ReadyState;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when the environment cannot host a connection, e.g. no
    /// tokio runtime is running.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// URL is not a valid WebSocket target.
    #[error("Invalid URL '{url}': {message}")]
    InvalidUrl {
        /// The rejected URL.
        url: String,
        /// Why it was rejected.
        message: String,
    },

    /// Invalid argument.
    ///
    /// Returned for malformed sub-protocols, close codes or close reasons.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    /// Connection parameter resolver failed.
    #[error("Resolve error: {message}")]
    Resolve {
        /// Description supplied by the resolver.
        message: String,
    },

    // ========================================================================
    // State Errors
    // ========================================================================
    /// Operation not allowed in the current ready state.
    ///
    /// Returned by [`WebSocket::send`](crate::WebSocket) while still
    /// connecting. [`QueuedTransport`](crate::QueuedTransport) exists to
    /// avoid this.
    #[error("Invalid state: operation not allowed while {state}")]
    InvalidState {
        /// State at the time of the call.
        state: ReadyState,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// The transport's I/O task is gone.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // External Errors
    // ========================================================================
    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// JSON deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid URL error.
    #[inline]
    pub fn invalid_url(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    #[inline]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a resolver error.
    ///
    /// Resolvers return this to abort a connect or reconnect.
    #[inline]
    pub fn resolve(message: impl Into<String>) -> Self {
        Self::Resolve {
            message: message.into(),
        }
    }

    /// Creates an invalid state error.
    #[inline]
    pub fn invalid_state(state: ReadyState) -> Self {
        Self::InvalidState { state }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` for configuration errors, resolver failures included.
    ///
    /// These fail synchronously and retrying with the same input fails again.
    #[inline]
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::Config { .. }
                | Self::InvalidUrl { .. }
                | Self::InvalidArgument { .. }
                | Self::Resolve { .. }
        )
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::ConnectionClosed | Self::WebSocket(_))
    }
}

// ============================================================================
// Tests
// ============================================================================
