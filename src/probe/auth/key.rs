//! Private key SSH authentication.

use std::sync::Arc;

use async_trait::async_trait;
use russh::{client, keys};
use tracing::debug;

use crate::probe::error::SessionError;
use crate::probe::session::SshClientHandler;

use super::traits::AuthStrategy;

/// Public key authentication strategy.
///
/// Holds a key already decoded from the raw file contents. Passphrase
/// protected keys are not supported.
pub struct KeyAuth {
    key: Arc<keys::PrivateKey>,
}

impl KeyAuth {
    /// Decode an OpenSSH or PEM private key from raw file bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SessionError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| SessionError::KeyParse(format!("key file is not text: {}", e)))?;

        let key = keys::decode_secret_key(text, None)
            .map_err(|e| SessionError::KeyParse(e.to_string()))?;

        Ok(Self { key: Arc::new(key) })
    }
}

#[async_trait]
impl AuthStrategy for KeyAuth {
    async fn authenticate(
        &self,
        handle: &mut client::Handle<SshClientHandler>,
        username: &str,
    ) -> Result<bool, SessionError> {
        // For RSA keys, use the best supported hash algorithm
        let hash_alg = handle
            .best_supported_rsa_hash()
            .await
            .ok()
            .flatten()
            .flatten();
        debug!("Using RSA hash algorithm for key auth: {:?}", hash_alg);

        let key_with_hash = keys::PrivateKeyWithHashAlg::new(self.key.clone(), hash_alg);

        let result = handle
            .authenticate_publickey(username, key_with_hash)
            .await
            .map_err(|e| SessionError::from_userauth(self.name(), e))?;

        Ok(result.success())
    }

    fn name(&self) -> &'static str {
        "publickey"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage_is_key_parse_error() {
        let result = KeyAuth::from_bytes(b"not a key");
        assert!(matches!(result, Err(SessionError::KeyParse(_))));
    }

    #[test]
    fn test_non_utf8_is_key_parse_error() {
        let result = KeyAuth::from_bytes(&[0xff, 0xfe, 0x00]);
        match result {
            Err(SessionError::KeyParse(msg)) => assert!(msg.contains("not text")),
            _ => panic!("expected KeyParse"),
        }
    }
}
