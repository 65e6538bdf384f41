//! SSH client handler applying the host verification policy.
//!
//! # Architecture
//!
//! - `SshClientHandler`: a russh client handler that decides whether to trust
//!   the server's host key. With [`HostVerificationPolicy::Insecure`] every key
//!   is accepted (like `StrictHostKeyChecking=no`); with
//!   [`HostVerificationPolicy::TrustedStore`] the key must be listed for the
//!   host in the given known_hosts file.
//!
//! A rejected key makes russh abort the handshake; the resulting error is
//! classified like any other transport failure.

use russh::keys::known_hosts::check_known_hosts_path;
use russh::{client, keys};
use tracing::{debug, warn};

use super::types::HostVerificationPolicy;

/// Client handler for russh carrying the host identity to verify.
pub struct SshClientHandler {
    host: String,
    port: u16,
    policy: HostVerificationPolicy,
}

impl SshClientHandler {
    pub(crate) fn new(host: impl Into<String>, port: u16, policy: HostVerificationPolicy) -> Self {
        Self {
            host: host.into(),
            port,
            policy,
        }
    }
}

impl client::Handler for SshClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        match &self.policy {
            HostVerificationPolicy::Insecure => {
                debug!(
                    "Accepting host key for {}:{} without verification",
                    self.host, self.port
                );
                Ok(true)
            }
            HostVerificationPolicy::TrustedStore(path) => {
                match check_known_hosts_path(&self.host, self.port, server_public_key, path) {
                    Ok(true) => {
                        debug!("Host key for {}:{} found in {:?}", self.host, self.port, path);
                        Ok(true)
                    }
                    Ok(false) => {
                        warn!(
                            "Host key for {}:{} is not listed in {:?}",
                            self.host, self.port, path
                        );
                        Ok(false)
                    }
                    Err(e) => {
                        warn!(
                            "Host key verification for {}:{} against {:?} failed: {}",
                            self.host, self.port, path, e
                        );
                        Ok(false)
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use russh::client::Handler;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HOST_KEY: &str = "AAAAC3NzaC1lZDI1NTE5AAAAIJdD7y3aLq454yWBdwLWbieU1ebz9/cu7/QEXn9OIeZJ";
    const OTHER_KEY: &str = "AAAAC3NzaC1lZDI1NTE5AAAAIA6rWI3G1sz07DnfFlrouTcysQlj2P+jpNSOEWD9OJ3X";

    fn public_key(base64: &str) -> keys::PublicKey {
        keys::parse_public_key_base64(base64).unwrap()
    }

    fn known_hosts(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_insecure_accepts_any_key() {
        let mut handler = SshClientHandler::new("10.0.0.1", 22, HostVerificationPolicy::Insecure);
        let accepted = handler.check_server_key(&public_key(HOST_KEY)).await.unwrap();
        assert!(accepted);
    }

    #[tokio::test]
    async fn test_trusted_store_accepts_listed_key() {
        let file = known_hosts(&format!("localhost ssh-ed25519 {}\n", HOST_KEY));
        let mut handler = SshClientHandler::new(
            "localhost",
            22,
            HostVerificationPolicy::TrustedStore(file.path().to_path_buf()),
        );
        let accepted = handler.check_server_key(&public_key(HOST_KEY)).await.unwrap();
        assert!(accepted);
    }

    #[tokio::test]
    async fn test_trusted_store_rejects_unlisted_host() {
        let file = known_hosts(&format!("otherhost ssh-ed25519 {}\n", HOST_KEY));
        let mut handler = SshClientHandler::new(
            "localhost",
            22,
            HostVerificationPolicy::TrustedStore(file.path().to_path_buf()),
        );
        let accepted = handler.check_server_key(&public_key(HOST_KEY)).await.unwrap();
        assert!(!accepted);
    }

    #[tokio::test]
    async fn test_trusted_store_rejects_changed_key() {
        let file = known_hosts(&format!("localhost ssh-ed25519 {}\n", OTHER_KEY));
        let mut handler = SshClientHandler::new(
            "localhost",
            22,
            HostVerificationPolicy::TrustedStore(file.path().to_path_buf()),
        );
        let accepted = handler.check_server_key(&public_key(HOST_KEY)).await.unwrap();
        assert!(!accepted);
    }

    #[tokio::test]
    async fn test_missing_store_rejects() {
        let mut handler = SshClientHandler::new(
            "localhost",
            22,
            HostVerificationPolicy::TrustedStore("/nonexistent/known_hosts".into()),
        );
        let accepted = handler.check_server_key(&public_key(HOST_KEY)).await.unwrap();
        assert!(!accepted);
    }
}
