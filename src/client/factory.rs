//! Factory producing reconnectable clients.
//!
//! A [`ClientFactory`] binds a transport type and a resolver once; every
//! client it produces shares both.
//!
//! # Example
//!
//! ```no_run
//! use resocket::{ClientFactory, ClientOptions, QueuedTransport, WebSocket};
//!
//! # async fn example() -> resocket::Result<()> {
//! let rooms = ClientFactory::<QueuedTransport<WebSocket>, String>::new(|room: &String| {
//!     Ok(ClientOptions::new(format!("ws://chat.example.com/{room}")))
//! });
//!
//! let client = rooms.connect("lobby".to_owned())?;
//! client.send("hello")?;
//!
//! client.reconnect_with("general".to_owned())?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::Result;
use crate::transport::Transport;

use super::core::Client;
use super::options::ClientOptions;

// ============================================================================
// Types
// ============================================================================

/// Resolver callback type.
///
/// Maps connection parameters to [`ClientOptions`]. Called on every connect
/// and reconnect.
pub type Resolver<P> = Arc<dyn Fn(&P) -> Result<ClientOptions> + Send + Sync>;

// ============================================================================
// ClientFactory
// ============================================================================

/// Produces [`Client`]s over transport `T`, parameterized by `P`.
///
/// `T` must implement [`Transport`]; anything else is rejected where the
/// factory is named, not when a client is first built:
///
/// ```compile_fail
/// use resocket::{ClientFactory, ClientOptions};
///
/// struct NotATransport;
///
/// let factory = ClientFactory::<NotATransport, String>::new(|url: &String| {
///     Ok(ClientOptions::new(url.clone()))
/// });
/// ```
pub struct ClientFactory<T: Transport, P> {
    /// Shared by every client this factory produces.
    resolve: Resolver<P>,
    _transport: PhantomData<fn() -> T>,
}

impl<T: Transport, P> Clone for ClientFactory<T, P> {
    fn clone(&self) -> Self {
        Self {
            resolve: Arc::clone(&self.resolve),
            _transport: PhantomData,
        }
    }
}

impl<T: Transport, P> fmt::Debug for ClientFactory<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientFactory")
            .field("transport", &std::any::type_name::<T>())
            .finish_non_exhaustive()
    }
}

impl<T, P> ClientFactory<T, P>
where
    T: Transport,
    P: Clone + Send + Sync + 'static,
{
    /// Creates a factory bound to `resolve`.
    #[must_use]
    pub fn new<F>(resolve: F) -> Self
    where
        F: Fn(&P) -> Result<ClientOptions> + Send + Sync + 'static,
    {
        Self {
            resolve: Arc::new(resolve),
            _transport: PhantomData,
        }
    }

    /// Creates a client and starts connecting it with `params`.
    ///
    /// # Errors
    ///
    /// Whatever the resolver or [`Transport::connect`] returns. No client
    /// is created in that case.
    pub fn connect(&self, params: P) -> Result<Client<T, P>> {
        Client::connect(Arc::clone(&self.resolve), params)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::Error;
    use crate::testing::MockTransport;

    #[test]
    fn test_factory_produces_independent_clients() {
        let factory = ClientFactory::<MockTransport, u32>::new(|id: &u32| {
            Ok(ClientOptions::new(format!("ws://host/{id}")))
        });

        let first = factory.connect(1).unwrap();
        let second = factory.clone().connect(2).unwrap();

        assert_eq!(first.url(), "ws://host/1");
        assert_eq!(second.url(), "ws://host/2");
        assert!(!Arc::ptr_eq(&first.transport(), &second.transport()));
    }

    #[test]
    fn test_resolver_failure_creates_nothing() {
        let factory = ClientFactory::<MockTransport, String>::new(|_: &String| {
            Err(Error::resolve("unknown room"))
        });

        assert!(matches!(
            factory.connect("x".into()),
            Err(Error::Resolve { .. })
        ));
    }

    #[test]
    fn test_default_options_fail_to_connect() {
        let factory =
            ClientFactory::<MockTransport, ()>::new(|_: &()| Ok(ClientOptions::default()));

        assert!(factory.connect(()).is_err());
    }
}
