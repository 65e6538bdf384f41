//! Exactly-one-of credential selection.
//!
//! A request must name either a private key file or a password, never both
//! and never neither. The key variant reads the file once; the password
//! variant touches nothing.

use std::fs;

use tracing::debug;

use super::error::ConfigError;
use super::types::{ConnectionRequest, Credential};

/// Validate `request` and select its single credential.
///
/// # Errors
///
/// - [`ConfigError::MissingHost`] when the host is empty
/// - [`ConfigError::InvalidPort`] when a port is given that is not a TCP port
/// - [`ConfigError::MissingCredential`] when neither key nor password is set
/// - [`ConfigError::ConflictingCredentials`] when both are set
/// - [`ConfigError::KeyRead`] when the key file cannot be read
pub fn resolve(request: &ConnectionRequest) -> Result<Credential, ConfigError> {
    if request.host.trim().is_empty() {
        return Err(ConfigError::MissingHost);
    }

    if request.effective_port().parse::<u16>().is_err() {
        return Err(ConfigError::InvalidPort(request.port.clone()));
    }

    match (request.key_file(), request.secret()) {
        (None, None) => Err(ConfigError::MissingCredential),
        (Some(_), Some(_)) => Err(ConfigError::ConflictingCredentials),
        (Some(path), None) => {
            let bytes = fs::read(path).map_err(|source| ConfigError::KeyRead {
                path: path.to_path_buf(),
                source,
            })?;
            debug!("Loaded {} bytes of key material from {:?}", bytes.len(), path);
            Ok(Credential::PrivateKey(bytes))
        }
        (None, Some(password)) => Ok(Credential::Password(password.to_string())),
    }
}
