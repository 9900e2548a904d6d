//! Native WebSocket transport and its I/O task.
//!
//! [`WebSocket`] is the canonical [`Transport`]: a client connection built
//! on tokio-tungstenite with browser-style lifecycle semantics.
//!
//! # Event Loop
//!
//! `connect` spawns a tokio task that:
//!
//! - Performs the opening handshake, then fires `open`
//! - Dispatches incoming text/binary frames as `message` events
//! - Writes payloads queued by [`WebSocket::send`]
//! - Runs the closing handshake and fires `close`
//!
//! The handle talks to the task over an unbounded channel, so `send` and
//! `close` never block.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::protocol::{
    CLOSE_NO_STATUS, CloseEvent, ErrorEvent, EventTarget, Payload, ReadyState, TransportEvent,
};

use super::Transport;

// ============================================================================
// Constants
// ============================================================================

/// Handshake header carrying the offered sub-protocols.
const PROTOCOL_HEADER: &str = "sec-websocket-protocol";

/// Maximum close reason length in UTF-8 bytes.
const MAX_CLOSE_REASON_BYTES: usize = 123;

/// Close code sent when only a reason is given.
const CLOSE_NORMAL: u16 = 1000;

// ============================================================================
// Types
// ============================================================================

type ClientStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ============================================================================
// SocketCommand
// ============================================================================

/// Internal commands for the I/O task.
enum SocketCommand {
    /// Write a data frame.
    Send(Payload),
    /// Start the closing handshake.
    Close(Option<CloseFrame>),
}

// ============================================================================
// SocketShared
// ============================================================================

/// State shared between the handle and the I/O task.
struct SocketShared {
    /// Current [`ReadyState`] as its numeric value.
    state: AtomicU16,
    /// Sub-protocol selected by the server.
    protocol: Mutex<Option<String>>,
}

impl SocketShared {
    fn state(&self) -> ReadyState {
        ReadyState::from_u16(self.state.load(Ordering::Acquire)).unwrap_or(ReadyState::Closed)
    }

    fn set_state(&self, state: ReadyState) {
        self.state.store(state.as_u16(), Ordering::Release);
    }

    /// Moves CONNECTING to OPEN. Fails if `close` got there first.
    fn try_open(&self) -> bool {
        self.state
            .compare_exchange(
                ReadyState::Connecting.as_u16(),
                ReadyState::Open.as_u16(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Moves CONNECTING or OPEN to CLOSING, returning the previous state.
    fn begin_closing(&self) -> Option<ReadyState> {
        self.state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                match ReadyState::from_u16(current) {
                    Some(ReadyState::Connecting | ReadyState::Open) => {
                        Some(ReadyState::Closing.as_u16())
                    }
                    _ => None,
                }
            })
            .ok()
            .and_then(ReadyState::from_u16)
    }
}

// ============================================================================
// WebSocket
// ============================================================================

/// WebSocket client connection.
///
/// Created in [`ReadyState::Connecting`]; lifecycle events are dispatched
/// from the I/O task into the [`EventTarget`] given to
/// [`Transport::connect`].
///
/// Dropping the handle does not close the connection. The task keeps
/// reading, and firing events, until the peer closes.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use resocket::{EventKind, EventTarget, Transport, WebSocket};
///
/// # async fn example() -> resocket::Result<()> {
/// let events = EventTarget::new();
/// events.add_listener(EventKind::Message, Arc::new(|event| {
///     println!("received {:?}", event.payload());
/// }));
///
/// let socket = WebSocket::connect("ws://127.0.0.1:9001", &[], events)?;
/// # Ok(())
/// # }
/// ```
pub struct WebSocket {
    /// Normalized target URL.
    url: Url,
    /// State shared with the I/O task.
    shared: Arc<SocketShared>,
    /// Channel to the I/O task.
    command_tx: mpsc::UnboundedSender<SocketCommand>,
    /// Registry events are dispatched into.
    events: EventTarget,
}

impl fmt::Debug for WebSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSocket")
            .field("url", &self.url.as_str())
            .field("state", &self.shared.state())
            .finish_non_exhaustive()
    }
}

impl Transport for WebSocket {
    /// Validates `url` and `protocols`, then spawns the I/O task.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidUrl`] for unsupported schemes or URLs with a fragment
    /// - [`Error::InvalidArgument`] for empty, malformed or duplicate sub-protocols
    /// - [`Error::Config`] if called outside a tokio runtime
    fn connect(url: &str, protocols: &[String], events: EventTarget) -> Result<Self> {
        let url = parse_ws_url(url)?;
        validate_protocols(protocols)?;
        let request = build_request(&url, protocols)?;

        let runtime = Handle::try_current()
            .map_err(|_| Error::config("WebSocket::connect requires a running tokio runtime"))?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(SocketShared {
            state: AtomicU16::new(ReadyState::Connecting.as_u16()),
            protocol: Mutex::new(None),
        });

        runtime.spawn(run_socket(
            request,
            command_rx,
            Arc::clone(&shared),
            events.clone(),
        ));

        debug!(url = %url, ?protocols, "WebSocket connecting");

        Ok(Self {
            url,
            shared,
            command_tx,
            events,
        })
    }

    #[inline]
    fn url(&self) -> &str {
        self.url.as_str()
    }

    fn protocol(&self) -> Option<String> {
        self.shared.protocol.lock().clone()
    }

    #[inline]
    fn ready_state(&self) -> ReadyState {
        self.shared.state()
    }

    /// Queues a payload for the I/O task.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] while connecting
    /// - [`Error::ConnectionClosed`] if the I/O task has already exited
    ///
    /// Payloads sent while closing or closed are discarded without error.
    fn send(&self, payload: Payload) -> Result<()> {
        match self.shared.state() {
            ReadyState::Connecting => Err(Error::invalid_state(ReadyState::Connecting)),
            ReadyState::Open => {
                trace!(len = payload.len(), "Payload queued for write");
                self.command_tx
                    .send(SocketCommand::Send(payload))
                    .map_err(|_| Error::ConnectionClosed)
            }
            ReadyState::Closing | ReadyState::Closed => {
                trace!(len = payload.len(), "Payload discarded after close");
                Ok(())
            }
        }
    }

    /// Starts the closing handshake.
    ///
    /// From CONNECTING the handshake is abandoned. From CLOSING or CLOSED
    /// this does nothing.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if `code` is not 1000 or in `3000..=4999`,
    /// or if `reason` exceeds 123 bytes.
    fn close(&self, code: Option<u16>, reason: Option<&str>) -> Result<()> {
        let frame = close_frame(code, reason)?;

        if let Some(previous) = self.shared.begin_closing() {
            debug!(url = %self.url, ?previous, ?code, "WebSocket closing");
            let _ = self.command_tx.send(SocketCommand::Close(frame));
        }

        Ok(())
    }

    #[inline]
    fn events(&self) -> &EventTarget {
        &self.events
    }
}

// ============================================================================
// I/O Task
// ============================================================================

/// Runs the handshake, then the event loop.
async fn run_socket(
    request: Request,
    mut command_rx: mpsc::UnboundedReceiver<SocketCommand>,
    shared: Arc<SocketShared>,
    events: EventTarget,
) {
    let mut commands_open = true;
    let handshake = connect_async(request);
    tokio::pin!(handshake);

    let result = loop {
        tokio::select! {
            result = &mut handshake => break result,

            command = command_rx.recv(), if commands_open => {
                match command {
                    Some(SocketCommand::Close(_)) => {
                        debug!("Handshake abandoned by close()");
                        shared.set_state(ReadyState::Closed);
                        events.dispatch(&TransportEvent::Close(CloseEvent::abnormal()));
                        return;
                    }

                    // `send` rejects payloads while connecting
                    Some(SocketCommand::Send(_)) => {}

                    None => commands_open = false,
                }
            }
        }
    };

    let (ws_stream, response) = match result {
        Ok(connected) => connected,
        Err(e) => {
            debug!(error = %e, "WebSocket handshake failed");
            shared.set_state(ReadyState::Closed);
            events.dispatch(&TransportEvent::Error(ErrorEvent::new(e.to_string())));
            events.dispatch(&TransportEvent::Close(CloseEvent::abnormal()));
            return;
        }
    };

    let protocol = response
        .headers()
        .get(PROTOCOL_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);
    *shared.protocol.lock() = protocol;

    // A close() racing the handshake wins; its command is still queued.
    if shared.try_open() {
        debug!("WebSocket open");
        events.dispatch(&TransportEvent::Open);
    }

    run_event_loop(ws_stream, command_rx, commands_open, &shared, &events).await;
}

/// Event loop that handles WebSocket I/O once connected.
async fn run_event_loop(
    ws_stream: ClientStream,
    mut command_rx: mpsc::UnboundedReceiver<SocketCommand>,
    mut commands_open: bool,
    shared: &SocketShared,
    events: &EventTarget,
) {
    let (mut ws_write, mut ws_read) = ws_stream.split();
    let mut peer_close: Option<Option<CloseFrame>> = None;
    let mut failure: Option<String> = None;

    loop {
        tokio::select! {
            // Incoming frames
            message = ws_read.next() => {
                match message {
                    Some(Ok(Message::Close(frame))) => {
                        debug!(?frame, "Close frame received");
                        shared.begin_closing();
                        peer_close = Some(frame);
                    }

                    Some(Ok(message)) => {
                        if let Some(payload) = Payload::from_message(message) {
                            trace!(len = payload.len(), "Payload received");
                            events.dispatch(&TransportEvent::Message(payload));
                        }
                    }

                    Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) | None => {
                        debug!("WebSocket stream ended");
                        break;
                    }

                    Some(Err(e)) => {
                        debug!(error = %e, "WebSocket read failed");
                        failure = Some(e.to_string());
                        break;
                    }
                }
            }

            // Commands from the handle
            command = command_rx.recv(), if commands_open => {
                match command {
                    Some(SocketCommand::Send(payload)) => {
                        if let Err(e) = ws_write.send(payload.into_message()).await {
                            warn!(error = %e, "Failed to write payload");
                        }
                    }

                    Some(SocketCommand::Close(frame)) => {
                        if let Err(e) = ws_write.send(Message::Close(frame)).await {
                            warn!(error = %e, "Failed to write close frame");
                        }
                    }

                    None => {
                        debug!("WebSocket handle dropped, reading until peer closes");
                        commands_open = false;
                    }
                }
            }
        }
    }

    shared.set_state(ReadyState::Closed);

    if let Some(message) = failure {
        events.dispatch(&TransportEvent::Error(ErrorEvent::new(message)));
    }

    let close = match peer_close {
        Some(Some(frame)) => CloseEvent {
            code: u16::from(frame.code),
            reason: frame.reason.as_str().to_owned(),
            was_clean: true,
        },
        Some(None) => CloseEvent {
            code: CLOSE_NO_STATUS,
            reason: String::new(),
            was_clean: true,
        },
        None => CloseEvent::abnormal(),
    };

    debug!(code = close.code, was_clean = close.was_clean, "WebSocket closed");
    events.dispatch(&TransportEvent::Close(close));
}

// ============================================================================
// Validation
// ============================================================================

/// Parses a WebSocket URL, mapping `http`/`https` onto `ws`/`wss`.
fn parse_ws_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw).map_err(|e| Error::invalid_url(raw, e.to_string()))?;

    let scheme = match url.scheme() {
        "ws" | "wss" => None,
        "http" => Some("ws"),
        "https" => Some("wss"),
        other => {
            return Err(Error::invalid_url(
                raw,
                format!("unsupported scheme '{other}'"),
            ));
        }
    };

    if let Some(scheme) = scheme {
        url.set_scheme(scheme)
            .map_err(|()| Error::invalid_url(raw, format!("cannot map to '{scheme}'")))?;
    }

    if url.fragment().is_some() {
        return Err(Error::invalid_url(raw, "fragments are not allowed"));
    }

    Ok(url)
}

/// Checks that sub-protocols are unique HTTP tokens.
fn validate_protocols(protocols: &[String]) -> Result<()> {
    for (index, protocol) in protocols.iter().enumerate() {
        if protocol.is_empty() || !protocol.bytes().all(is_token_byte) {
            return Err(Error::invalid_argument(format!(
                "invalid sub-protocol '{protocol}'"
            )));
        }
        if protocols[..index].contains(protocol) {
            return Err(Error::invalid_argument(format!(
                "duplicate sub-protocol '{protocol}'"
            )));
        }
    }
    Ok(())
}

/// Returns `true` for bytes allowed in an HTTP token.
fn is_token_byte(byte: u8) -> bool {
    byte.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?={}".contains(&byte)
}

/// Builds the handshake request.
fn build_request(url: &Url, protocols: &[String]) -> Result<Request> {
    let mut request = url.as_str().into_client_request()?;

    if !protocols.is_empty() {
        let value = HeaderValue::from_str(&protocols.join(", "))
            .map_err(|e| Error::invalid_argument(e.to_string()))?;
        request.headers_mut().insert(PROTOCOL_HEADER, value);
    }

    Ok(request)
}

/// Validates close arguments and builds the close frame.
fn close_frame(code: Option<u16>, reason: Option<&str>) -> Result<Option<CloseFrame>> {
    if let Some(code) = code
        && code != CLOSE_NORMAL
        && !(3000..=4999).contains(&code)
    {
        return Err(Error::invalid_argument(format!(
            "close code {code} must be 1000 or in 3000..=4999"
        )));
    }

    if let Some(reason) = reason
        && reason.len() > MAX_CLOSE_REASON_BYTES
    {
        return Err(Error::invalid_argument(format!(
            "close reason is {} bytes, limit is {MAX_CLOSE_REASON_BYTES}",
            reason.len()
        )));
    }

    let frame = match (code, reason) {
        (None, None) => None,
        (code, reason) => Some(CloseFrame {
            code: CloseCode::from(code.unwrap_or(CLOSE_NORMAL)),
            reason: reason.unwrap_or_default().to_owned().into(),
        }),
    };

    Ok(frame)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::protocol::CLOSE_ABNORMAL;
    use crate::testing::{echo_server, event_channel, next_event, refused_url, silent_server};

    #[test]
    fn test_parse_ws_url() {
        assert_eq!(parse_ws_url("ws://host/a").unwrap().as_str(), "ws://host/a");
        assert_eq!(parse_ws_url("http://host/a").unwrap().scheme(), "ws");
        assert_eq!(parse_ws_url("https://host/a").unwrap().scheme(), "wss");
    }

    #[test]
    fn test_parse_ws_url_rejects() {
        assert!(matches!(
            parse_ws_url("ftp://host"),
            Err(Error::InvalidUrl { .. })
        ));
        assert!(matches!(
            parse_ws_url("ws://host/#frag"),
            Err(Error::InvalidUrl { .. })
        ));
        assert!(matches!(parse_ws_url(""), Err(Error::InvalidUrl { .. })));
    }

    #[test]
    fn test_validate_protocols() {
        assert!(validate_protocols(&[]).is_ok());
        assert!(validate_protocols(&["chat".into(), "v2.json".into()]).is_ok());
        assert!(validate_protocols(&["".into()]).is_err());
        assert!(validate_protocols(&["has space".into()]).is_err());
        assert!(validate_protocols(&["a,b".into()]).is_err());
        assert!(validate_protocols(&["chat".into(), "chat".into()]).is_err());
    }

    #[test]
    fn test_close_frame_validation() {
        assert!(close_frame(None, None).unwrap().is_none());
        assert!(close_frame(Some(1000), None).is_ok());
        assert!(close_frame(Some(4999), Some("done")).is_ok());
        assert!(close_frame(Some(1001), None).is_err());
        assert!(close_frame(Some(5000), None).is_err());
        assert!(close_frame(None, Some(&"x".repeat(124))).is_err());
    }

    #[test]
    fn test_reason_without_code_uses_normal_closure() {
        let frame = close_frame(None, Some("bye")).unwrap().unwrap();
        assert_eq!(u16::from(frame.code), CLOSE_NORMAL);
        assert_eq!(frame.reason.as_str(), "bye");
    }

    #[test]
    fn test_connect_requires_runtime() {
        let result = WebSocket::connect("ws://127.0.0.1:1", &[], EventTarget::new());
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[tokio::test]
    async fn test_send_while_connecting_fails() {
        let (url, _listener) = silent_server().await;
        let socket = WebSocket::connect(&url, &[], EventTarget::new()).unwrap();

        assert_eq!(socket.ready_state(), ReadyState::Connecting);
        assert!(matches!(
            socket.send(Payload::from("early")),
            Err(Error::InvalidState {
                state: ReadyState::Connecting
            })
        ));
    }

    #[tokio::test]
    async fn test_echo_and_clean_close() {
        let (url, server) = echo_server().await;
        let events = EventTarget::new();
        let mut rx = event_channel(&events);
        let socket = WebSocket::connect(&url, &[], events).unwrap();

        assert_eq!(next_event(&mut rx).await, TransportEvent::Open);
        assert_eq!(socket.ready_state(), ReadyState::Open);

        socket.send(Payload::from("hello")).unwrap();
        socket.send(Payload::Binary(vec![1, 2, 3])).unwrap();

        assert_eq!(
            next_event(&mut rx).await,
            TransportEvent::Message(Payload::from("hello"))
        );
        assert_eq!(
            next_event(&mut rx).await,
            TransportEvent::Message(Payload::Binary(vec![1, 2, 3]))
        );

        socket.close(Some(1000), Some("bye")).unwrap();
        assert_eq!(socket.ready_state(), ReadyState::Closing);

        match next_event(&mut rx).await {
            TransportEvent::Close(close) => {
                assert_eq!(close.code, 1000);
                assert_eq!(close.reason, "bye");
                assert!(close.was_clean);
            }
            other => panic!("expected close, got {other:?}"),
        }
        assert_eq!(socket.ready_state(), ReadyState::Closed);

        let received = server.await.unwrap();
        assert_eq!(
            received,
            vec![Payload::from("hello"), Payload::Binary(vec![1, 2, 3])]
        );

        // Closed sockets discard silently
        assert!(socket.send(Payload::from("late")).is_ok());
    }

    #[tokio::test]
    async fn test_refused_connection_fires_error_then_close() {
        let url = refused_url().await;
        let events = EventTarget::new();
        let mut rx = event_channel(&events);
        let socket = WebSocket::connect(&url, &[], events).unwrap();

        assert!(matches!(next_event(&mut rx).await, TransportEvent::Error(_)));
        match next_event(&mut rx).await {
            TransportEvent::Close(close) => {
                assert_eq!(close.code, CLOSE_ABNORMAL);
                assert!(!close.was_clean);
            }
            other => panic!("expected close, got {other:?}"),
        }
        assert_eq!(socket.ready_state(), ReadyState::Closed);
    }

    #[tokio::test]
    async fn test_close_while_connecting() {
        let (url, _listener) = silent_server().await;
        let events = EventTarget::new();
        let mut rx = event_channel(&events);
        let socket = WebSocket::connect(&url, &[], events).unwrap();

        socket.close(None, None).unwrap();
        assert_eq!(socket.ready_state(), ReadyState::Closing);

        assert_eq!(
            next_event(&mut rx).await,
            TransportEvent::Close(CloseEvent::abnormal())
        );
        assert_eq!(socket.ready_state(), ReadyState::Closed);

        // Second close is a no-op
        assert!(socket.close(None, None).is_ok());
    }

    #[tokio::test]
    async fn test_negotiated_protocol() {
        use tokio::net::TcpListener;
        use tokio_tungstenite::tungstenite::handshake::server::{
            ErrorResponse, Request as ServerRequest, Response as ServerResponse,
        };

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let callback = |request: &ServerRequest,
                            mut response: ServerResponse|
             -> std::result::Result<ServerResponse, ErrorResponse> {
                let offered = request
                    .headers()
                    .get(PROTOCOL_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_owned();
                assert_eq!(offered, "chat, superchat");
                response
                    .headers_mut()
                    .insert(PROTOCOL_HEADER, HeaderValue::from_static("chat"));
                Ok(response)
            };
            let mut ws = tokio_tungstenite::accept_hdr_async(stream, callback)
                .await
                .unwrap();
            while let Some(Ok(_)) = ws.next().await {}
        });

        let events = EventTarget::new();
        let mut rx = event_channel(&events);
        let protocols = vec!["chat".to_owned(), "superchat".to_owned()];
        let socket = WebSocket::connect(&format!("ws://{addr}"), &protocols, events).unwrap();

        assert_eq!(next_event(&mut rx).await, TransportEvent::Open);
        assert_eq!(socket.protocol().as_deref(), Some("chat"));

        socket.close(None, None).unwrap();
        assert!(matches!(next_event(&mut rx).await, TransportEvent::Close(_)));
        server.await.unwrap();
    }
}
