//! Connection ready state.
//!
//! Every transport moves through the same four states:
//!
//! ```text
//! CONNECTING ──► OPEN ──► CLOSING ──► CLOSED
//!      │                                 ▲
//!      └─────────────────────────────────┘
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

// ============================================================================
// ReadyState
// ============================================================================

/// Lifecycle state of a transport.
///
/// Discriminants match the WebSocket `readyState` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum ReadyState {
    /// Handshake in progress.
    Connecting = 0,
    /// Open and ready to send.
    Open = 1,
    /// Close handshake in progress.
    Closing = 2,
    /// Closed, or failed to open.
    Closed = 3,
}

impl ReadyState {
    /// Returns the numeric value of this state.
    #[inline]
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Converts a numeric value back into a state.
    ///
    /// Returns `None` for values outside `0..=3`.
    #[inline]
    #[must_use]
    pub const fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(Self::Connecting),
            1 => Some(Self::Open),
            2 => Some(Self::Closing),
            3 => Some(Self::Closed),
            _ => None,
        }
    }

    /// Returns the canonical upper-case name.
    #[inline]
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Connecting => "CONNECTING",
            Self::Open => "OPEN",
            Self::Closing => "CLOSING",
            Self::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<ReadyState> for u16 {
    #[inline]
    fn from(state: ReadyState) -> Self {
        state.as_u16()
    }
}

// ============================================================================
// Constants
// ============================================================================

/// Numeric value of [`ReadyState::Connecting`].
pub const CONNECTING: u16 = ReadyState::Connecting.as_u16();

/// Numeric value of [`ReadyState::Open`].
pub const OPEN: u16 = ReadyState::Open.as_u16();

/// Numeric value of [`ReadyState::Closing`].
pub const CLOSING: u16 = ReadyState::Closing.as_u16();

/// Numeric value of [`ReadyState::Closed`].
pub const CLOSED: u16 = ReadyState::Closed.as_u16();

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants_match_enum() {
        assert_eq!(CONNECTING, 0);
        assert_eq!(OPEN, 1);
        assert_eq!(CLOSING, 2);
        assert_eq!(CLOSED, 3);
    }

    #[test]
    fn test_from_u16() {
        for state in [
            ReadyState::Connecting,
            ReadyState::Open,
            ReadyState::Closing,
            ReadyState::Closed,
        ] {
            assert_eq!(ReadyState::from_u16(state.as_u16()), Some(state));
        }
        assert_eq!(ReadyState::from_u16(4), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(ReadyState::Open.to_string(), "OPEN");
        assert_eq!(ReadyState::Closing.to_string(), "CLOSING");
    }
}
