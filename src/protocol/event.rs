//! Lifecycle events and the listener registry.
//!
//! Transports report everything that happens on the connection as a
//! [`TransportEvent`] dispatched through an [`EventTarget`].
//!
//! # Event Types
//!
//! | Kind | Event | Fired when |
//! |------|-------|------------|
//! | `open` | [`TransportEvent::Open`] | Handshake completed |
//! | `message` | [`TransportEvent::Message`] | Text or binary frame received |
//! | `error` | [`TransportEvent::Error`] | Connection failed |
//! | `close` | [`TransportEvent::Close`] | Connection ended |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::Payload;

// ============================================================================
// Constants
// ============================================================================

/// Close code used when the connection ended without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Close code reported when the peer's close frame carried no code.
pub const CLOSE_NO_STATUS: u16 = 1005;

// ============================================================================
// Types
// ============================================================================

/// Event listener callback type.
///
/// Shared so a listener can be registered on several targets and cloned
/// out of the registry before it runs.
pub type Listener = Arc<dyn Fn(&TransportEvent) + Send + Sync>;

// ============================================================================
// EventKind
// ============================================================================

/// The four lifecycle event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Connection opened.
    Open,
    /// Message received.
    Message,
    /// Connection error.
    Error,
    /// Connection closed.
    Close,
}

impl EventKind {
    /// All kinds, in the order clients register their forwarders.
    pub const ALL: [EventKind; 4] = [Self::Close, Self::Error, Self::Message, Self::Open];

    /// Returns the lower-case event name.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Message => "message",
            Self::Error => "error",
            Self::Close => "close",
        }
    }

    /// Index into per-kind slot arrays.
    #[inline]
    pub(crate) const fn index(self) -> usize {
        match self {
            Self::Open => 0,
            Self::Message => 1,
            Self::Error => 2,
            Self::Close => 3,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Event Payloads
// ============================================================================

/// Details of a `close` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseEvent {
    /// Close code from the peer, or 1005/1006.
    pub code: u16,
    /// Close reason from the peer.
    pub reason: String,
    /// `true` if the closing handshake completed.
    pub was_clean: bool,
}

impl CloseEvent {
    /// Creates a close event for a connection that ended abnormally.
    #[inline]
    #[must_use]
    pub fn abnormal() -> Self {
        Self {
            code: CLOSE_ABNORMAL,
            reason: String::new(),
            was_clean: false,
        }
    }
}

/// Details of an `error` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEvent {
    /// Description of the failure.
    pub message: String,
}

impl ErrorEvent {
    /// Creates a new error event.
    #[inline]
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// ============================================================================
// TransportEvent
// ============================================================================

/// A lifecycle event fired by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Connection opened.
    Open,
    /// Message received.
    Message(Payload),
    /// Connection error.
    Error(ErrorEvent),
    /// Connection closed.
    Close(CloseEvent),
}

impl TransportEvent {
    /// Returns the kind of this event.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Open => EventKind::Open,
            Self::Message(_) => EventKind::Message,
            Self::Error(_) => EventKind::Error,
            Self::Close(_) => EventKind::Close,
        }
    }

    /// Returns the payload of a `message` event.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> Option<&Payload> {
        match self {
            Self::Message(payload) => Some(payload),
            _ => None,
        }
    }
}

// ============================================================================
// ListenerId
// ============================================================================

/// Handle returned on registration, used to remove a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

// ============================================================================
// EventTarget
// ============================================================================

/// A registered listener.
struct Registration {
    id: ListenerId,
    kind: EventKind,
    listener: Listener,
}

/// Shared state behind an [`EventTarget`].
struct EventTargetInner {
    /// Listeners in dispatch order.
    registrations: Mutex<Vec<Registration>>,
    /// Next listener ID.
    next_id: AtomicU64,
}

/// Ordered multi-listener registry.
///
/// Cloning yields another handle to the same registry. Listeners of one
/// kind fire in registration order. The registry lock is released before
/// listeners run, so a listener may register or remove listeners, send,
/// close, or reconnect.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use resocket::{EventKind, EventTarget, TransportEvent};
///
/// let target = EventTarget::new();
/// let id = target.add_listener(EventKind::Open, Arc::new(|_| println!("open")));
///
/// target.dispatch(&TransportEvent::Open);
/// assert!(target.remove_listener(id));
/// ```
#[derive(Clone)]
pub struct EventTarget {
    inner: Arc<EventTargetInner>,
}

impl Default for EventTarget {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventTarget")
            .field("listeners", &self.inner.registrations.lock().len())
            .finish()
    }
}

impl EventTarget {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(EventTargetInner {
                registrations: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Appends a listener for `kind`.
    pub fn add_listener(&self, kind: EventKind, listener: Listener) -> ListenerId {
        let id = self.next_id();
        self.inner.registrations.lock().push(Registration {
            id,
            kind,
            listener,
        });
        id
    }

    /// Registers a listener ahead of every existing listener.
    pub fn prepend_listener(&self, kind: EventKind, listener: Listener) -> ListenerId {
        let id = self.next_id();
        self.inner.registrations.lock().insert(
            0,
            Registration {
                id,
                kind,
                listener,
            },
        );
        id
    }

    /// Removes a listener.
    ///
    /// Returns `false` if the ID was not registered here.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut registrations = self.inner.registrations.lock();
        let before = registrations.len();
        registrations.retain(|r| r.id != id);
        registrations.len() != before
    }

    /// Returns the number of listeners registered for `kind`.
    #[must_use]
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.inner
            .registrations
            .lock()
            .iter()
            .filter(|r| r.kind == kind)
            .count()
    }

    /// Invokes every listener registered for the event's kind.
    pub fn dispatch(&self, event: &TransportEvent) {
        let kind = event.kind();
        let listeners: Vec<Listener> = self
            .inner
            .registrations
            .lock()
            .iter()
            .filter(|r| r.kind == kind)
            .map(|r| Arc::clone(&r.listener))
            .collect();

        for listener in listeners {
            listener(event);
        }
    }

    /// Returns `true` if both handles share one registry.
    #[inline]
    #[must_use]
    pub fn same_target(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn next_id(&self) -> ListenerId {
        ListenerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

// ============================================================================
// Tests
// ============================================================================
