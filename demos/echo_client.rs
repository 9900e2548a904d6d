//! Reconnecting echo client.
//!
//! Demonstrates:
//! - Binding a transport and resolver with `ClientFactory`
//! - Sending before the handshake completes (queued, then flushed)
//! - Listeners and `onX` handlers firing for the same events
//! - Reconnecting to a new room without re-registering anything
//!
//! A local echo server is started in-process, so no network is needed.
//!
//! Usage:
//!   cargo run --example echo_client
//!   cargo run --example echo_client -- --debug

// ============================================================================
// Imports
// ============================================================================

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use resocket::{
    ClientFactory, ClientOptions, EventKind, QueuedTransport, Result, TransportEvent, WebSocket,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let debug = std::env::args().any(|a| a == "--debug");
    init_logging(debug);

    let addr = match spawn_echo_server().await {
        Ok(addr) => addr,
        Err(e) => {
            eprintln!("\n[ERROR] echo server: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(addr).await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run(addr: SocketAddr) -> Result<()> {
    println!("=== Echo Client ===\n");
    println!("[Setup] Echo server on ws://{addr}\n");

    // ========================================================================
    // Create Factory
    // ========================================================================

    let rooms = ClientFactory::<QueuedTransport<WebSocket>, String>::new(move |room: &String| {
        Ok(ClientOptions::new(format!("ws://{addr}/{room}")))
    });

    let client = rooms.connect("room1".to_owned())?;
    println!("[Connect] {} ({})", client.url(), client.ready_state());

    // ========================================================================
    // Subscribe
    // ========================================================================

    let (echo_tx, mut echo_rx) = mpsc::unbounded_channel();
    client.add_event_listener(
        EventKind::Message,
        Arc::new(move |event: &TransportEvent| {
            if let Some(text) = event.payload().and_then(|p| p.as_text()) {
                let _ = echo_tx.send(text.to_owned());
            }
        }),
    );
    client.set_onopen(|_| println!("          onopen fired"));
    client.set_onclose(|event| println!("          onclose fired: {event:?}"));

    // ========================================================================
    // Send Before Open
    // ========================================================================

    client.send("first")?;
    client.send("second")?;
    println!("[Send]    2 payloads queued while connecting");

    for _ in 0..2 {
        if let Some(echo) = next_echo(&mut echo_rx).await {
            println!("          ✓ echo: {echo}");
        }
    }

    // ========================================================================
    // Reconnect
    // ========================================================================

    client.close(Some(1000), Some("switching rooms"))?;
    client.reconnect_with("room2".to_owned())?;
    println!("\n[Reconnect] {} ({})", client.url(), client.ready_state());

    client.send("third")?;
    if let Some(echo) = next_echo(&mut echo_rx).await {
        println!("          ✓ echo: {echo}");
    }

    client.close(None, None)?;
    tokio::time::sleep(Duration::from_millis(100)).await;
    println!(
        "\n[Done] state={} parameters={:?}",
        client.ready_state(),
        client.parameters()
    );

    Ok(())
}

// ============================================================================
// Functions
// ============================================================================

/// Initialize tracing/logging.
fn init_logging(debug: bool) {
    let filter = if debug { "resocket=trace" } else { "resocket=info" };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}

/// Waits up to 5s for the next echoed text.
async fn next_echo(rx: &mut mpsc::UnboundedReceiver<String>) -> Option<String> {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .ok()
        .flatten()
}

/// Starts an echo server accepting any number of connections.
async fn spawn_echo_server() -> io::Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                while let Some(Ok(message)) = ws.next().await {
                    if (message.is_text() || message.is_binary()) && ws.send(message).await.is_err()
                    {
                        break;
                    }
                }
            });
        }
    });

    Ok(addr)
}
