//! Error types and outcome classification.
//!
//! Two error families exist:
//!
//! - [`ConfigError`]: the request or settings are unusable. Raised before any
//!   network attempt and never classified.
//! - [`SessionError`]: anything that fails once the network phase has begun
//!   (dial, handshake, authentication, channel open, stream I/O).
//!
//! # Classification Strategy
//!
//! [`classify`] maps any raw failure to an [`OutcomeKind`]. Checks are ordered
//! and the first match wins:
//!
//! 1. **No error**: success
//! 2. **Authentication**: phrase match on the error description
//! 3. **Timeout**: connect-timeout variant, `TimedOut` I/O error, or phrase
//! 4. **Connection refused**: `ConnectionRefused` I/O error or phrase
//! 5. **No route to host**: `HostUnreachable`/`NetworkUnreachable` I/O error or phrase
//! 6. **Name resolution**: resolver phrases
//! 7. **Anything else**: unknown
//!
//! The description of an error is its own message joined with the message of
//! every error in its `source()` chain. This is the only place in the crate
//! that looks at error content.
//!
//! # Examples
//!
//! ```rust
//! use std::io;
//! use ssh_probe::probe::{OutcomeKind, classify};
//!
//! assert_eq!(classify(None), OutcomeKind::Success);
//!
//! let refused = io::Error::new(io::ErrorKind::ConnectionRefused, "connect: connection refused");
//! let cause: &(dyn std::error::Error + 'static) = &refused;
//! assert_eq!(classify(Some(cause)), OutcomeKind::ConnectionRefused);
//! ```

use std::error::Error as StdError;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use super::types::OutcomeKind;

/// Invalid request or settings, detected before any network attempt.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no host provided")]
    MissingHost,

    #[error("no key or password provided, one must be set")]
    MissingCredential,

    #[error("both key and password provided, only one may be set")]
    ConflictingCredentials,

    #[error("invalid port {0:?}")]
    InvalidPort(String),

    #[error("failed to read private key from {path}: {source}")]
    KeyRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("a known_hosts file and insecure host key mode cannot both be set")]
    ConflictingHostPolicy,
}

/// Failure after the network phase has started.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("dial tcp {address}: i/o timeout after {timeout:?}")]
    ConnectTimeout { address: String, timeout: Duration },

    #[error("dial tcp {address}: {source}")]
    Dial {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("ssh: handshake failed: {0}")]
    Handshake(#[source] russh::Error),

    #[error("ssh: failed to parse private key: {0}")]
    KeyParse(String),

    #[error(
        "ssh: unable to authenticate, attempted methods [{method}], no supported methods remain"
    )]
    AuthenticationRejected { method: &'static str },

    #[error("ssh: {method} userauth request: {source}")]
    Authentication {
        method: &'static str,
        #[source]
        source: russh::Error,
    },

    #[error("ssh: {method} userauth request: {source}")]
    AuthenticationIo {
        method: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("ssh: failed to open channel: {0}")]
    ChannelOpen(#[source] russh::Error),

    #[error("ssh: channel request failed: {0}")]
    ChannelRequest(#[source] russh::Error),

    #[error("ssh: channel request rejected: {0}")]
    ChannelRejected(&'static str),

    #[error("ssh: failed to write to channel: {0}")]
    ChannelWrite(#[source] russh::Error),

    #[error("shell stream error: {0}")]
    Stream(#[source] io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SessionError {
    /// Wrap a failure from `russh::client::connect`.
    ///
    /// Socket-level causes are lifted out so their I/O kind stays visible to
    /// [`classify`].
    pub(crate) fn from_connect(address: &str, error: russh::Error) -> Self {
        match error {
            russh::Error::IO(source) => SessionError::Dial {
                address: address.to_string(),
                source,
            },
            other => SessionError::Handshake(other),
        }
    }

    /// Wrap a failure raised while a userauth request is in flight.
    ///
    /// The message names the method but claims nothing about the credential,
    /// so only a real rejection classifies as an authentication failure.
    pub(crate) fn from_userauth(method: &'static str, error: russh::Error) -> Self {
        match error {
            russh::Error::IO(source) => SessionError::AuthenticationIo { method, source },
            source => SessionError::Authentication { method, source },
        }
    }
}

/// Phrases that mark an authentication failure.
const AUTH_PHRASES: &[&str] = &[
    "authentication failed",
    "invalid credentials",
    "unable to authenticate",
    "no supported methods remain",
];

const TIMEOUT_PHRASES: &[&str] = &["i/o timeout", "timed out"];

const REFUSED_PHRASES: &[&str] = &["connection refused"];

const NO_ROUTE_PHRASES: &[&str] = &["no route to host", "network is unreachable"];

/// Resolver messages across glibc, musl, macOS and Windows.
const RESOLVE_PHRASES: &[&str] = &[
    "failed to lookup address",
    "name or service not known",
    "nodename nor servname provided",
    "no such host",
    "temporary failure in name resolution",
    "no address associated with hostname",
    "name does not resolve",
];

/// Map a raw failure to its canonical outcome.
///
/// Total: every input yields exactly one [`OutcomeKind`], unrecognized errors
/// yield [`OutcomeKind::Unknown`].
pub fn classify(error: Option<&(dyn StdError + 'static)>) -> OutcomeKind {
    let Some(error) = error else {
        return OutcomeKind::Success;
    };

    let description = describe(error);

    if contains_any(&description, AUTH_PHRASES) {
        return OutcomeKind::AuthenticationFailure;
    }

    let io_kinds = io_error_kinds(error);

    if is_connect_timeout(error)
        || io_kinds.contains(&io::ErrorKind::TimedOut)
        || contains_any(&description, TIMEOUT_PHRASES)
    {
        return OutcomeKind::Timeout;
    }

    if io_kinds.contains(&io::ErrorKind::ConnectionRefused)
        || contains_any(&description, REFUSED_PHRASES)
    {
        return OutcomeKind::ConnectionRefused;
    }

    if io_kinds.contains(&io::ErrorKind::HostUnreachable)
        || io_kinds.contains(&io::ErrorKind::NetworkUnreachable)
        || contains_any(&description, NO_ROUTE_PHRASES)
    {
        return OutcomeKind::NoRouteToHost;
    }

    if contains_any(&description, RESOLVE_PHRASES) {
        return OutcomeKind::UnresolvedHost;
    }

    OutcomeKind::Unknown
}

/// Iterate over an error and its `source()` chain.
fn chain<'a>(
    error: &'a (dyn StdError + 'static),
) -> impl Iterator<Item = &'a (dyn StdError + 'static)> {
    std::iter::successors(Some(error), |&e| e.source())
}

/// Lowercased messages of the whole chain, joined with ": ".
fn describe(error: &(dyn StdError + 'static)) -> String {
    chain(error)
        .map(|e| e.to_string().to_lowercase())
        .collect::<Vec<_>>()
        .join(": ")
}

fn contains_any(haystack: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|phrase| haystack.contains(phrase))
}

fn io_error_kinds(error: &(dyn StdError + 'static)) -> Vec<io::ErrorKind> {
    chain(error)
        .filter_map(|e| e.downcast_ref::<io::Error>())
        .map(io::Error::kind)
        .collect()
}

fn is_connect_timeout(error: &(dyn StdError + 'static)) -> bool {
    chain(error).any(|e| {
        matches!(
            e.downcast_ref::<SessionError>(),
            Some(SessionError::ConnectTimeout { .. })
        )
    })
}
