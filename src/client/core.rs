//! Reconnectable client.
//!
//! A [`Client`] owns one transport at a time and presents a stable event
//! surface across reconnects.
//!
//! # Event Forwarding
//!
//! Every transport the client creates gets four forwarders (`close`,
//! `error`, `message`, `open`). Each forwarder:
//!
//! 1. Dispatches the event to the client's multi-listener registry
//! 2. Invokes the matching single-slot handler (`onopen`, ...), if set
//!
//! Both channels fire for every event.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::error::Result;
use crate::protocol::{
    EventKind, EventTarget, Listener, ListenerId, Payload, ReadyState, TransportEvent,
};
use crate::transport::Transport;

use super::factory::Resolver;

// ============================================================================
// Handlers
// ============================================================================

/// The four single-slot handlers.
struct Handlers {
    slots: [Mutex<Option<Listener>>; 4],
}

impl Default for Handlers {
    fn default() -> Self {
        Self {
            slots: std::array::from_fn(|_| Mutex::new(None)),
        }
    }
}

impl Handlers {
    fn get(&self, kind: EventKind) -> Option<Listener> {
        self.slots[kind.index()].lock().clone()
    }

    fn set(&self, kind: EventKind, handler: Option<Listener>) {
        *self.slots[kind.index()].lock() = handler;
    }
}

// ============================================================================
// ClientInner
// ============================================================================

/// Internal shared state for a client.
struct ClientInner<T, P> {
    /// Maps parameters to options on every (re)connect.
    resolve: Resolver<P>,
    /// Parameters of the last (re)connect.
    parameters: Mutex<P>,
    /// Current transport.
    transport: RwLock<Arc<T>>,
    /// Multi-listener registry, lives as long as the client.
    events: EventTarget,
    /// Single-slot handlers.
    handlers: Arc<Handlers>,
}

// ============================================================================
// Client
// ============================================================================

/// A client that can replace its transport without losing subscribers.
///
/// Created by [`ClientFactory::connect`](super::ClientFactory::connect).
/// Cloning yields another handle to the same client.
///
/// # Reconnect Semantics
///
/// [`reconnect`](Self::reconnect) builds a new transport and installs it.
/// The previous transport is not closed: call [`close`](Self::close) first
/// if it should not stay open. Its forwarders stay attached, so its
/// remaining events still reach this client.
pub struct Client<T: Transport, P> {
    inner: Arc<ClientInner<T, P>>,
}

impl<T: Transport, P> Clone for Client<T, P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport, P: fmt::Debug> fmt::Debug for Client<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let transport = self.transport();
        f.debug_struct("Client")
            .field("parameters", &*self.inner.parameters.lock())
            .field("url", &transport.url())
            .field("state", &transport.ready_state())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Client - Constructor
// ============================================================================

impl<T, P> Client<T, P>
where
    T: Transport,
    P: Clone + Send + Sync + 'static,
{
    /// Resolves `params` and connects the first transport.
    pub(crate) fn connect(resolve: Resolver<P>, params: P) -> Result<Self> {
        let events = EventTarget::new();
        let handlers = Arc::new(Handlers::default());
        let transport: T = open_transport(&resolve, &params, &events, &handlers)?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                resolve,
                parameters: Mutex::new(params),
                transport: RwLock::new(Arc::new(transport)),
                events,
                handlers,
            }),
        })
    }
}

// ============================================================================
// Client - Connection
// ============================================================================

impl<T, P> Client<T, P>
where
    T: Transport,
    P: Clone + Send + Sync + 'static,
{
    /// Sends a payload through the current transport.
    ///
    /// # Errors
    ///
    /// Whatever the current transport's `send` returns.
    pub fn send(&self, data: impl Into<Payload>) -> Result<()> {
        self.transport().send(data.into())
    }

    /// Closes the current transport.
    ///
    /// # Errors
    ///
    /// Whatever the current transport's `close` returns.
    pub fn close(&self, code: Option<u16>, reason: Option<&str>) -> Result<()> {
        self.transport().close(code, reason)
    }

    /// Reconnects with the stored parameters.
    ///
    /// # Errors
    ///
    /// Whatever the resolver or [`Transport::connect`] returns. The current
    /// transport stays installed on failure.
    pub fn reconnect(&self) -> Result<()> {
        let params = self.inner.parameters.lock().clone();
        self.reconnect_with(params)
    }

    /// Reconnects with new parameters, which replace the stored ones.
    ///
    /// The parameters are stored before resolving, so they are kept even if
    /// this call fails.
    ///
    /// # Errors
    ///
    /// Whatever the resolver or [`Transport::connect`] returns. The current
    /// transport stays installed on failure.
    pub fn reconnect_with(&self, params: P) -> Result<()> {
        *self.inner.parameters.lock() = params.clone();

        let transport: T = open_transport(
            &self.inner.resolve,
            &params,
            &self.inner.events,
            &self.inner.handlers,
        )?;

        debug!(url = transport.url(), "Client transport replaced");
        *self.inner.transport.write() = Arc::new(transport);
        Ok(())
    }
}

// ============================================================================
// Client - Accessors
// ============================================================================

impl<T, P> Client<T, P>
where
    T: Transport,
{
    /// Returns the parameters of the last (re)connect.
    #[must_use]
    pub fn parameters(&self) -> P
    where
        P: Clone,
    {
        self.inner.parameters.lock().clone()
    }

    /// Returns the current transport.
    #[inline]
    #[must_use]
    pub fn transport(&self) -> Arc<T> {
        Arc::clone(&self.inner.transport.read())
    }

    /// Returns the current transport's ready state.
    #[must_use]
    pub fn ready_state(&self) -> ReadyState {
        self.transport().ready_state()
    }

    /// Returns the current transport's URL.
    #[must_use]
    pub fn url(&self) -> String {
        self.transport().url().to_owned()
    }

    /// Returns the current transport's negotiated sub-protocol.
    #[must_use]
    pub fn protocol(&self) -> Option<String> {
        self.transport().protocol()
    }
}

// ============================================================================
// Client - Events
// ============================================================================

impl<T, P> Client<T, P>
where
    T: Transport,
{
    /// Subscribes to `kind`. Survives reconnects.
    pub fn add_event_listener(&self, kind: EventKind, listener: Listener) -> ListenerId {
        self.inner.events.add_listener(kind, listener)
    }

    /// Unsubscribes a listener.
    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        self.inner.events.remove_listener(id)
    }

    /// Returns the client's multi-listener registry.
    #[inline]
    #[must_use]
    pub fn events(&self) -> &EventTarget {
        &self.inner.events
    }

    /// Sets the single-slot handler for `kind`, replacing any previous one.
    pub fn set_handler(&self, kind: EventKind, handler: Listener) {
        self.inner.handlers.set(kind, Some(handler));
    }

    /// Clears the single-slot handler for `kind`.
    pub fn clear_handler(&self, kind: EventKind) {
        self.inner.handlers.set(kind, None);
    }

    /// Returns the single-slot handler for `kind`.
    #[must_use]
    pub fn handler(&self, kind: EventKind) -> Option<Listener> {
        self.inner.handlers.get(kind)
    }

    /// Sets the `onopen` handler.
    pub fn set_onopen<F>(&self, handler: F)
    where
        F: Fn(&TransportEvent) + Send + Sync + 'static,
    {
        self.set_handler(EventKind::Open, Arc::new(handler));
    }

    /// Sets the `onmessage` handler.
    pub fn set_onmessage<F>(&self, handler: F)
    where
        F: Fn(&TransportEvent) + Send + Sync + 'static,
    {
        self.set_handler(EventKind::Message, Arc::new(handler));
    }

    /// Sets the `onerror` handler.
    pub fn set_onerror<F>(&self, handler: F)
    where
        F: Fn(&TransportEvent) + Send + Sync + 'static,
    {
        self.set_handler(EventKind::Error, Arc::new(handler));
    }

    /// Sets the `onclose` handler.
    pub fn set_onclose<F>(&self, handler: F)
    where
        F: Fn(&TransportEvent) + Send + Sync + 'static,
    {
        self.set_handler(EventKind::Close, Arc::new(handler));
    }
}

// ============================================================================
// Connect Sequence
// ============================================================================

/// Resolves options, wires the forwarders and connects a new transport.
fn open_transport<T, P>(
    resolve: &Resolver<P>,
    params: &P,
    events: &EventTarget,
    handlers: &Arc<Handlers>,
) -> Result<T>
where
    T: Transport,
{
    let options = resolve(params)?;

    let target = EventTarget::new();
    for kind in EventKind::ALL {
        target.add_listener(kind, forwarder(events.clone(), Arc::clone(handlers)));
    }

    debug!(url = %options.url, protocols = ?options.protocols, "Client connecting");
    T::connect(&options.url, &options.protocols, target)
}

/// Builds a listener that re-dispatches to the client.
fn forwarder(events: EventTarget, handlers: Arc<Handlers>) -> Listener {
    Arc::new(move |event: &TransportEvent| {
        events.dispatch(event);
        if let Some(handler) = handlers.get(event.kind()) {
            handler(event);
        }
    })
}

// ============================================================================
// Tests
// ============================================================================
