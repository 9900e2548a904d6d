//! Reconnectable client layer.
//!
//! Use [`ClientFactory::new`] with a transport type and a resolver, then
//! [`ClientFactory::connect`] to create clients.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `core` | [`Client`] and its connect sequence |
//! | `factory` | [`ClientFactory`] and the resolver type |
//! | `options` | [`ClientOptions`] |

// ============================================================================
// Submodules
// ============================================================================

/// Client implementation.
pub mod core;

/// Client factory.
pub mod factory;

/// Connection options.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use self::core::Client;
pub use factory::{ClientFactory, Resolver};
pub use options::ClientOptions;
