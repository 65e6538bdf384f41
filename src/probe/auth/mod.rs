//! Authentication strategies for SSH connections.
//!
//! Each [`Credential`] variant maps to exactly one strategy:
//!
//! - [`KeyAuth`]: public key signature from decoded key bytes
//! - [`PasswordAuth`]: plain password
//!
//! There is no chaining or fallback between strategies.

mod key;
mod password;
mod traits;

pub use key::KeyAuth;
pub use password::PasswordAuth;
pub use traits::AuthStrategy;

use crate::probe::error::SessionError;
use crate::probe::types::Credential;

/// Build the authentication strategy for a resolved credential.
///
/// Key material is decoded here, before any network traffic.
pub(crate) fn strategy_for(credential: Credential) -> Result<Box<dyn AuthStrategy>, SessionError> {
    match credential {
        Credential::PrivateKey(bytes) => Ok(Box::new(KeyAuth::from_bytes(&bytes)?)),
        Credential::Password(password) => Ok(Box::new(PasswordAuth::new(password))),
    }
}
