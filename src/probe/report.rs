//! Machine-readable session report.
//!
//! One report is printed per run that reaches the network phase. The password
//! only ever appears as its SHA-256 hex digest.

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use sha2::{Digest, Sha256};

use super::types::{ConnectionRequest, SessionOutcome};

/// Reportable fields, serialized in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Report {
    pub host: String,
    pub port: String,
    pub user: String,
    pub password: String,
    pub key: String,
    pub err_code: u8,
    pub err_text: String,
}

impl Report {
    /// Pretty-printed JSON with four-space indentation.
    pub fn to_json(&self) -> serde_json::Result<String> {
        let mut buf = Vec::with_capacity(256);
        let formatter = PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut serializer)?;
        // serde_json only emits valid UTF-8
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

/// Build the report for `outcome` of `request`.
pub fn report(outcome: &SessionOutcome, request: &ConnectionRequest) -> Report {
    Report {
        host: request.host.clone(),
        port: request.effective_port().to_string(),
        user: request.user.clone(),
        password: mask_password(request.secret().unwrap_or("")),
        key: request
            .key_file()
            .map(|p| p.display().to_string())
            .unwrap_or_default(),
        err_code: outcome.code(),
        err_text: outcome.text().to_string(),
    }
}

/// SHA-256 hex digest of `password`. An empty password is hashed too.
pub fn mask_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}
