//! Send-buffering transport decorator.
//!
//! [`QueuedTransport`] wraps any [`Transport`] so that `send` never fails
//! because the connection is not open yet. Payloads sent early are held in
//! a FIFO queue and flushed, in order, when the inner transport opens.
//!
//! # Ordering
//!
//! ```text
//! send("a") ─┐
//! send("b") ─┼─► queue [a, b] ──open──► inner.send(a), inner.send(b)
//!            │
//! send("c") ─┴─────────────── after open ──► inner.send(c)
//! ```
//!
//! The check-state/drain/send sequence runs under one lock, so a payload
//! sent after open can never overtake a queued one.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::Result;
use crate::protocol::{EventKind, EventTarget, Payload, ReadyState, TransportEvent};

use super::{Transport, WebSocket};

// ============================================================================
// SendQueue
// ============================================================================

/// Pending payloads plus a weak link to the transport that drains them.
struct SendQueue<T> {
    /// Payloads waiting for OPEN.
    pending: VecDeque<Payload>,
    /// Set once the inner transport exists.
    native: Weak<T>,
}

impl<T: Transport> SendQueue<T> {
    /// Sends every pending payload through `native`, oldest first.
    fn drain(&mut self, native: &T) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let count = self.pending.len();
        while let Some(payload) = self.pending.pop_front() {
            native.send(payload)?;
        }

        debug!(count, url = native.url(), "Flushed queued payloads");
        Ok(())
    }

    /// Drains if the inner transport is set and open.
    fn drain_if_open(&mut self) {
        let Some(native) = self.native.upgrade() else {
            return;
        };

        if native.ready_state() == ReadyState::Open
            && let Err(e) = self.drain(&native)
        {
            debug!(error = %e, "Queue flush interrupted");
        }
    }
}

// ============================================================================
// QueuedTransport
// ============================================================================

/// A transport whose `send` buffers until the connection is open.
///
/// Usable anywhere a [`Transport`] is expected. Only `send` is changed;
/// `close`, state and event registration are the inner transport's.
///
/// Payloads still queued when the inner transport closes without ever
/// opening are dropped with the instance.
///
/// # Example
///
/// ```no_run
/// use resocket::{EventTarget, Payload, QueuedTransport, Transport, WebSocket};
///
/// # async fn example() -> resocket::Result<()> {
/// let socket: QueuedTransport<WebSocket> =
///     QueuedTransport::connect("ws://127.0.0.1:9001", &[], EventTarget::new())?;
///
/// // Still connecting: both are queued, then sent in order on open
/// socket.send(Payload::from("hello"))?;
/// socket.send(Payload::from("world"))?;
/// # Ok(())
/// # }
/// ```
pub struct QueuedTransport<T: Transport = WebSocket> {
    /// The wrapped transport.
    native: Arc<T>,
    /// Shared with the drain listener.
    queue: Arc<Mutex<SendQueue<T>>>,
}

impl<T: Transport> QueuedTransport<T> {
    /// Returns the wrapped transport.
    #[inline]
    #[must_use]
    pub fn inner(&self) -> &T {
        &self.native
    }

    /// Returns the number of payloads waiting for OPEN.
    #[inline]
    #[must_use]
    pub fn queued_len(&self) -> usize {
        self.queue.lock().pending.len()
    }
}

impl<T: Transport + fmt::Debug> fmt::Debug for QueuedTransport<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueuedTransport")
            .field("inner", &self.native)
            .field("queued", &self.queued_len())
            .finish()
    }
}

impl<T: Transport> Transport for QueuedTransport<T> {
    /// Registers the drain listener ahead of every other `open` listener on
    /// `events`, then connects the inner transport.
    fn connect(url: &str, protocols: &[String], events: EventTarget) -> Result<Self> {
        let queue = Arc::new(Mutex::new(SendQueue {
            pending: VecDeque::new(),
            native: Weak::new(),
        }));

        let drain = Arc::clone(&queue);
        events.prepend_listener(
            EventKind::Open,
            Arc::new(move |_: &TransportEvent| drain.lock().drain_if_open()),
        );

        let native = Arc::new(T::connect(url, protocols, events)?);

        // `open` may have fired before the link existed
        {
            let mut queue = queue.lock();
            queue.native = Arc::downgrade(&native);
            queue.drain_if_open();
        }

        Ok(Self { native, queue })
    }

    #[inline]
    fn url(&self) -> &str {
        self.native.url()
    }

    #[inline]
    fn protocol(&self) -> Option<String> {
        self.native.protocol()
    }

    #[inline]
    fn ready_state(&self) -> ReadyState {
        self.native.ready_state()
    }

    /// Sends now if open, otherwise queues.
    ///
    /// Never fails because the connection is not open.
    fn send(&self, payload: Payload) -> Result<()> {
        let mut queue = self.queue.lock();

        if self.native.ready_state() == ReadyState::Open {
            queue.drain(&self.native)?;
            return self.native.send(payload);
        }

        trace!(
            len = payload.len(),
            queued = queue.pending.len() + 1,
            "Payload queued until open"
        );
        queue.pending.push_back(payload);
        Ok(())
    }

    #[inline]
    fn close(&self, code: Option<u16>, reason: Option<&str>) -> Result<()> {
        self.native.close(code, reason)
    }

    #[inline]
    fn events(&self) -> &EventTarget {
        self.native.events()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    use crate::testing::{MockTransport, echo_server, event_channel, next_event};

    fn queued() -> QueuedTransport<MockTransport> {
        QueuedTransport::connect("ws://host/", &[], EventTarget::new()).unwrap()
    }

    #[test]
    fn test_sends_before_open_flush_in_order() {
        let socket = queued();

        socket.send(Payload::from("a")).unwrap();
        socket.send(Payload::from("b")).unwrap();

        assert!(socket.inner().sent().is_empty());
        assert_eq!(socket.queued_len(), 2);

        socket.inner().open();

        assert_eq!(
            socket.inner().sent(),
            vec![Payload::from("a"), Payload::from("b")]
        );
        assert_eq!(socket.queued_len(), 0);
    }

    #[test]
    fn test_send_when_open_goes_straight_through() {
        let socket = queued();
        socket.inner().open();

        socket.send(Payload::from("now")).unwrap();

        assert_eq!(socket.inner().sent(), vec![Payload::from("now")]);
        assert_eq!(socket.queued_len(), 0);
    }

    #[test]
    fn test_empty_payloads_are_not_dropped() {
        let socket = queued();

        socket.send(Payload::from("")).unwrap();
        socket.send(Payload::Binary(Vec::new())).unwrap();
        socket.inner().open();
        socket.send(Payload::from("")).unwrap();

        assert_eq!(
            socket.inner().sent(),
            vec![
                Payload::from(""),
                Payload::Binary(Vec::new()),
                Payload::from("")
            ]
        );
    }

    #[test]
    fn test_drain_runs_before_caller_open_listeners() {
        let events = EventTarget::new();
        let socket: Arc<Mutex<Option<Arc<QueuedTransport<MockTransport>>>>> =
            Arc::new(Mutex::new(None));

        // Registered before connect, yet must observe an already-drained queue
        let observed = Arc::new(Mutex::new(None));
        {
            let socket = Arc::clone(&socket);
            let observed = Arc::clone(&observed);
            events.add_listener(
                EventKind::Open,
                Arc::new(move |_| {
                    if let Some(socket) = socket.lock().as_ref() {
                        *observed.lock() = Some(socket.inner().sent().len());
                        socket.send(Payload::from("from-listener")).unwrap();
                    }
                }),
            );
        }

        let transport = Arc::new(
            QueuedTransport::<MockTransport>::connect("ws://host/", &[], events).unwrap(),
        );
        *socket.lock() = Some(Arc::clone(&transport));

        transport.send(Payload::from("queued")).unwrap();
        transport.inner().open();

        assert_eq!(*observed.lock(), Some(1));
        assert_eq!(
            transport.inner().sent(),
            vec![Payload::from("queued"), Payload::from("from-listener")]
        );
    }

    #[test]
    fn test_never_opened_discards_silently() {
        let socket = queued();
        socket.send(Payload::from("lost")).unwrap();

        socket.inner().fail();

        assert_eq!(socket.ready_state(), ReadyState::Closed);
        assert!(socket.send(Payload::from("also lost")).is_ok());
        assert!(socket.inner().sent().is_empty());
        assert_eq!(socket.queued_len(), 2);
    }

    #[test]
    fn test_close_and_state_delegate() {
        let socket = queued();
        assert_eq!(socket.url(), "ws://host/");
        assert_eq!(socket.ready_state(), ReadyState::Connecting);

        socket.close(Some(4000), Some("done")).unwrap();

        assert_eq!(
            socket.inner().closed_with(),
            Some((Some(4000), Some("done".to_owned())))
        );
        assert_eq!(socket.ready_state(), ReadyState::Closing);
    }

    #[test]
    fn test_connect_error_propagates() {
        let result = QueuedTransport::<MockTransport>::connect("", &[], EventTarget::new());
        assert!(result.is_err());
    }

    proptest! {
        #[test]
        fn prop_fifo_law(
            before in proptest::collection::vec(".{0,8}", 0..32),
            after in proptest::collection::vec(".{0,8}", 0..8),
        ) {
            let socket = queued();
            for text in &before {
                socket.send(Payload::from(text.as_str())).unwrap();
            }
            prop_assert!(socket.inner().sent().is_empty());

            socket.inner().open();
            for text in &after {
                socket.send(Payload::from(text.as_str())).unwrap();
            }

            let expected: Vec<Payload> = before
                .iter()
                .chain(after.iter())
                .map(|text| Payload::from(text.as_str()))
                .collect();
            prop_assert_eq!(socket.inner().sent(), expected);
        }
    }

    #[tokio::test]
    async fn test_queued_websocket_against_echo_server() {
        let (url, server) = echo_server().await;
        let events = EventTarget::new();
        let mut rx = event_channel(&events);

        let socket = QueuedTransport::<WebSocket>::connect(&url, &[], events).unwrap();
        socket.send(Payload::from("a")).unwrap();
        socket.send(Payload::from("b")).unwrap();

        assert_eq!(next_event(&mut rx).await, TransportEvent::Open);
        assert_eq!(
            next_event(&mut rx).await,
            TransportEvent::Message(Payload::from("a"))
        );
        assert_eq!(
            next_event(&mut rx).await,
            TransportEvent::Message(Payload::from("b"))
        );

        socket.close(None, None).unwrap();
        assert!(matches!(next_event(&mut rx).await, TransportEvent::Close(_)));
        assert_eq!(
            server.await.unwrap(),
            vec![Payload::from("a"), Payload::from("b")]
        );
    }
}
