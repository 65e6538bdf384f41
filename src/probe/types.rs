//! Request, credential, policy and outcome types.
//!
//! These types carry a session from configuration to the final report:
//!
//! - [`ConnectionRequest`]: what to connect to and with which secret
//! - [`Credential`]: the single authentication method selected from a request
//! - [`HostVerificationPolicy`]: how the server's host key is trusted
//! - [`SessionMode`]: which channel operation runs on the connection
//! - [`SessionOutcome`]: the classified result consumed by the reporter

use std::error::Error as StdError;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::config::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_PORT};
use super::error::{ConfigError, classify};

/// Everything needed to reach and authenticate against one host.
///
/// Empty strings in `port`, `key_path` and `password` count as "not set".
#[derive(Debug, Clone)]
pub struct ConnectionRequest {
    pub host: String,
    pub port: String,
    pub user: String,
    pub key_path: Option<PathBuf>,
    pub password: Option<String>,
    pub connect_timeout: Duration,
}

impl ConnectionRequest {
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: String::new(),
            user: user.into(),
            key_path: None,
            password: None,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }

    pub fn port(mut self, port: impl Into<String>) -> Self {
        self.port = port.into();
        self
    }

    pub fn key_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_path = Some(path.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Port as it will be dialed, "22" when none was given.
    pub fn effective_port(&self) -> &str {
        if self.port.is_empty() {
            DEFAULT_PORT
        } else {
            &self.port
        }
    }

    /// Key file path, ignoring an empty path.
    pub fn key_file(&self) -> Option<&Path> {
        self.key_path
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
    }

    /// Password, ignoring an empty string.
    pub fn secret(&self) -> Option<&str> {
        self.password.as_deref().filter(|p| !p.is_empty())
    }
}

/// The one authentication method used for a session.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Raw private key file contents, parsed at connect time.
    PrivateKey(Vec<u8>),
    Password(String),
}

impl Credential {
    /// SSH userauth method name for this credential.
    pub fn method(&self) -> &'static str {
        match self {
            Credential::PrivateKey(_) => "publickey",
            Credential::Password(_) => "password",
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::PrivateKey(bytes) => {
                write!(f, "PrivateKey(<{} bytes>)", bytes.len())
            }
            Credential::Password(_) => write!(f, "Password(<redacted>)"),
        }
    }
}

/// How the remote host key is trusted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostVerificationPolicy {
    /// Accept any host key.
    Insecure,
    /// Accept only keys listed for the host in this known_hosts file.
    TrustedStore(PathBuf),
}

impl HostVerificationPolicy {
    /// Pick a policy from the two mutually exclusive settings.
    ///
    /// Configuring both is rejected. Configuring neither falls back to
    /// [`HostVerificationPolicy::Insecure`].
    pub fn from_settings(
        insecure: bool,
        known_hosts: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let known_hosts = known_hosts.filter(|p| !p.as_os_str().is_empty());
        match (insecure, known_hosts) {
            (true, Some(_)) => Err(ConfigError::ConflictingHostPolicy),
            (_, Some(path)) => Ok(HostVerificationPolicy::TrustedStore(path)),
            (_, None) => Ok(HostVerificationPolicy::Insecure),
        }
    }
}

/// Which channel operation runs once the connection is up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionMode {
    /// Run one command and collect its combined output.
    Probe { command: String },
    /// Interactive shell wired to local stdin/stdout/stderr.
    Shell,
}

/// Fully resolved configuration for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub request: ConnectionRequest,
    pub policy: HostVerificationPolicy,
    pub mode: SessionMode,
}

/// Canonical result classes, in classification order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Success,
    AuthenticationFailure,
    Timeout,
    ConnectionRefused,
    NoRouteToHost,
    UnresolvedHost,
    Unknown,
}

impl OutcomeKind {
    pub fn code(self) -> u8 {
        match self {
            OutcomeKind::Success => 0,
            OutcomeKind::AuthenticationFailure => 1,
            OutcomeKind::Timeout => 2,
            OutcomeKind::ConnectionRefused => 3,
            OutcomeKind::NoRouteToHost => 4,
            OutcomeKind::UnresolvedHost => 5,
            OutcomeKind::Unknown => 255,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            OutcomeKind::Success => "success",
            OutcomeKind::AuthenticationFailure => "authentication failure",
            OutcomeKind::Timeout => "timeout",
            OutcomeKind::ConnectionRefused => "connection refused",
            OutcomeKind::NoRouteToHost => "no route to host",
            OutcomeKind::UnresolvedHost => "can't resolve host",
            OutcomeKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label(), self.code())
    }
}

/// Final, immutable result of a session.
pub struct SessionOutcome {
    kind: OutcomeKind,
    raw: Option<Box<dyn StdError + Send + Sync>>,
}

impl SessionOutcome {
    pub fn success() -> Self {
        Self {
            kind: OutcomeKind::Success,
            raw: None,
        }
    }

    /// Classify `error` and keep it as the opaque cause.
    pub fn from_error(error: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        let raw = error.into();
        let cause: &(dyn StdError + 'static) = &*raw;
        let kind = classify(Some(cause));
        Self {
            kind,
            raw: Some(raw),
        }
    }

    pub fn from_result<E>(result: Result<(), E>) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        match result {
            Ok(()) => Self::success(),
            Err(e) => Self::from_error(e),
        }
    }

    pub fn kind(&self) -> OutcomeKind {
        self.kind
    }

    pub fn code(&self) -> u8 {
        self.kind.code()
    }

    pub fn text(&self) -> &'static str {
        self.kind.label()
    }

    pub fn raw_error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.raw.as_deref()
    }
}

impl fmt::Debug for SessionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionOutcome")
            .field("code", &self.code())
            .field("text", &self.text())
            .field("raw", &self.raw.as_ref().map(|e| e.to_string()))
            .finish()
    }
}
