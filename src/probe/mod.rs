//! SSH probe module providing a single connect-probe-or-shell session.
//!
//! This module is organized into the following submodules:
//!
//! - `types`: Request, credential, policy and outcome types
//! - `config`: Configuration resolution with environment variable support
//! - `credential`: Exactly-one-of credential selection
//! - `error`: Error types and the outcome classifier
//! - `auth`: Authentication strategies built from a resolved credential
//! - `session`: russh client handler applying the host verification policy
//! - `transport`: Connector and transport handle traits
//! - `client`: russh connection establishment and session channels
//! - `shell`: Interactive shell link and the three-flow multiplexer
//! - `report`: Structured report and exit code mapping
//! - `commands`: Session driver tying the components together

pub(crate) mod auth;
pub mod client;
pub mod commands;
pub mod config;
pub mod credential;
pub mod error;
pub mod report;
pub mod session;
pub mod shell;
pub mod transport;
pub mod types;

pub use commands::run_session;
pub use error::{ConfigError, SessionError, classify};
pub use report::{Report, report};
pub use types::{
    ConnectionRequest, Credential, HostVerificationPolicy, OutcomeKind, SessionMode,
    SessionOutcome, Settings,
};
