//! Connection options produced by a resolver.

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Result;

// ============================================================================
// ClientOptions
// ============================================================================

/// Where and how a client connects.
///
/// Produced fresh by the resolver on every connect and reconnect. Fields
/// the resolver leaves out keep their defaults: an empty `url` and no
/// sub-protocols.
///
/// # Example
///
/// ```
/// use resocket::ClientOptions;
///
/// let options = ClientOptions::new("wss://example.com/feed")
///     .protocol("v2.feed")
///     .protocol("v1.feed");
///
/// assert_eq!(options.protocols, ["v2.feed", "v1.feed"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    /// Target URL.
    pub url: String,

    /// Sub-protocols to offer, in preference order.
    ///
    /// Deserializes from a single string or a list of strings.
    #[serde(deserialize_with = "one_or_many")]
    pub protocols: Vec<String>,
}

impl ClientOptions {
    /// Creates options for `url` with no sub-protocols.
    #[inline]
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            protocols: Vec::new(),
        }
    }

    /// Appends a sub-protocol.
    #[inline]
    #[must_use]
    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocols.push(protocol.into());
        self
    }

    /// Replaces the sub-protocol list.
    #[must_use]
    pub fn protocols<I, S>(mut self, protocols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.protocols = protocols.into_iter().map(Into::into).collect();
        self
    }

    /// Parses options from JSON.
    ///
    /// # Errors
    ///
    /// [`Error::Json`](crate::Error::Json) if the document is malformed.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

// ============================================================================
// Serde Helpers
// ============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn one_or_many<'de, D>(deserializer: D) -> StdResult<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(protocol) => vec![protocol],
        OneOrMany::Many(protocols) => protocols,
    })
}

// ============================================================================
// Tests
// ============================================================================
