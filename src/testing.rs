//! Test support: a scriptable transport and loopback helpers.

// ============================================================================
// Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::error::{Error, Result};
use crate::protocol::{CloseEvent, EventKind, EventTarget, Payload, ReadyState, TransportEvent};
use crate::transport::Transport;

// ============================================================================
// Constants
// ============================================================================

/// Upper bound for waiting on a loopback event.
pub(crate) const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// MockTransport
// ============================================================================

/// In-memory transport driven by the test.
///
/// Mirrors [`WebSocket`](crate::WebSocket) state rules: `send` fails while
/// connecting and is recorded once open.
pub(crate) struct MockTransport {
    url: String,
    protocols: Vec<String>,
    state: Mutex<ReadyState>,
    sent: Mutex<Vec<Payload>>,
    closed_with: Mutex<Option<(Option<u16>, Option<String>)>>,
    events: EventTarget,
}

impl MockTransport {
    /// Sub-protocols passed to `connect`.
    pub(crate) fn protocols(&self) -> &[String] {
        &self.protocols
    }

    /// Payloads that reached this transport, in order.
    pub(crate) fn sent(&self) -> Vec<Payload> {
        self.sent.lock().clone()
    }

    /// Arguments of the last `close` call.
    pub(crate) fn closed_with(&self) -> Option<(Option<u16>, Option<String>)> {
        self.closed_with.lock().clone()
    }

    /// Moves to OPEN and fires `open`.
    pub(crate) fn open(&self) {
        *self.state.lock() = ReadyState::Open;
        self.events.dispatch(&TransportEvent::Open);
    }

    /// Fires an arbitrary event, updating state for `close`.
    pub(crate) fn fire(&self, event: TransportEvent) {
        if matches!(event, TransportEvent::Close(_)) {
            *self.state.lock() = ReadyState::Closed;
        }
        self.events.dispatch(&event);
    }

    /// Moves to CLOSED and fires `close` without ever opening.
    pub(crate) fn fail(&self) {
        self.fire(TransportEvent::Close(CloseEvent::abnormal()));
    }
}

impl Transport for MockTransport {
    fn connect(url: &str, protocols: &[String], events: EventTarget) -> Result<Self> {
        if url.is_empty() {
            return Err(Error::invalid_url(url, "empty URL"));
        }
        Ok(Self {
            url: url.to_owned(),
            protocols: protocols.to_vec(),
            state: Mutex::new(ReadyState::Connecting),
            sent: Mutex::new(Vec::new()),
            closed_with: Mutex::new(None),
            events,
        })
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn protocol(&self) -> Option<String> {
        self.protocols.first().cloned()
    }

    fn ready_state(&self) -> ReadyState {
        *self.state.lock()
    }

    fn send(&self, payload: Payload) -> Result<()> {
        match self.ready_state() {
            ReadyState::Open => {
                self.sent.lock().push(payload);
                Ok(())
            }
            state => Err(Error::invalid_state(state)),
        }
    }

    fn close(&self, code: Option<u16>, reason: Option<&str>) -> Result<()> {
        *self.closed_with.lock() = Some((code, reason.map(str::to_owned)));
        *self.state.lock() = ReadyState::Closing;
        Ok(())
    }

    fn events(&self) -> &EventTarget {
        &self.events
    }
}

// ============================================================================
// Event Helpers
// ============================================================================

/// Forwards every event fired on `target` into a channel.
pub(crate) fn event_channel(target: &EventTarget) -> mpsc::UnboundedReceiver<TransportEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    for kind in EventKind::ALL {
        let tx = tx.clone();
        target.add_listener(
            kind,
            Arc::new(move |event: &TransportEvent| {
                let _ = tx.send(event.clone());
            }),
        );
    }
    rx
}

/// Waits for the next event, failing the test after [`EVENT_TIMEOUT`].
pub(crate) async fn next_event(
    rx: &mut mpsc::UnboundedReceiver<TransportEvent>,
) -> TransportEvent {
    timeout(EVENT_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

// ============================================================================
// Loopback Servers
// ============================================================================

/// Starts a one-shot echo server.
///
/// The handle resolves to every data frame the server received.
pub(crate) async fn echo_server() -> (String, JoinHandle<Vec<Payload>>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind should succeed");
    let addr = listener.local_addr().expect("local addr");

    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let mut ws = tokio_tungstenite::accept_async(stream)
            .await
            .expect("upgrade");

        let mut received = Vec::new();
        while let Some(Ok(message)) = ws.next().await {
            if message.is_text() || message.is_binary() {
                if let Some(payload) = Payload::from_message(message.clone()) {
                    received.push(payload);
                }
                if ws.send(message).await.is_err() {
                    break;
                }
            }
        }
        received
    });

    (ws_url(addr), handle)
}

/// Binds a listener that never completes the handshake.
///
/// Keep the listener alive for as long as the socket must stay CONNECTING.
pub(crate) async fn silent_server() -> (String, TcpListener) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind should succeed");
    let addr = listener.local_addr().expect("local addr");
    (ws_url(addr), listener)
}

/// Returns a URL nobody listens on.
pub(crate) async fn refused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind should succeed");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    ws_url(addr)
}

fn ws_url(addr: SocketAddr) -> String {
    format!("ws://{addr}")
}
