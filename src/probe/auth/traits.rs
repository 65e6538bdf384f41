//! Authentication strategy trait definition.
//!
//! Defines the interface for authentication strategies, enabling
//! the Strategy pattern for SSH authentication methods.

use async_trait::async_trait;
use russh::client;

use crate::probe::error::SessionError;
use crate::probe::session::SshClientHandler;

/// Trait for SSH authentication strategies.
///
/// Implementations must be thread-safe (`Send + Sync`) for use across
/// async tasks. Each strategy represents one credential kind.
#[async_trait]
pub trait AuthStrategy: Send + Sync {
    /// Attempt to authenticate with the SSH server.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - Authentication succeeded
    /// * `Ok(false)` - Credentials rejected by the server
    /// * `Err(error)` - Transport failure during the attempt
    async fn authenticate(
        &self,
        handle: &mut client::Handle<SshClientHandler>,
        username: &str,
    ) -> Result<bool, SessionError>;

    /// SSH userauth method name, used in logs and rejection errors.
    fn name(&self) -> &'static str;
}
