//! Transport traits.
//!
//! The session driver only talks to these traits, so a whole session can run
//! against an in-memory transport. [`crate::probe::client::RusshConnector`] is
//! the SSH implementation.

use std::time::Duration;

use async_trait::async_trait;

use super::error::SessionError;
use super::shell::ShellLink;
use super::types::{ConnectionRequest, Credential, HostVerificationPolicy};

/// Establishes authenticated connections.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Dial `request`'s endpoint, verify the host per `policy` and
    /// authenticate with `credential`.
    ///
    /// Dialing is bounded by `timeout`. Failures are returned untouched for
    /// classification.
    async fn connect(
        &self,
        request: &ConnectionRequest,
        credential: Credential,
        policy: &HostVerificationPolicy,
        timeout: Duration,
    ) -> Result<Box<dyn TransportHandle>, SessionError>;
}

/// An established, authenticated connection.
#[async_trait]
pub trait TransportHandle: Send + Sync {
    /// Run `command` on a fresh channel, returning stdout and stderr bytes
    /// combined in arrival order.
    async fn run_command(&self, command: &str) -> Result<Vec<u8>, SessionError>;

    /// Open an interactive shell channel.
    async fn open_shell(&self) -> Result<ShellLink, SessionError>;

    /// Close the connection. Failures are logged, not returned.
    async fn disconnect(&self);
}
