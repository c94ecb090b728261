use serde::{Deserialize, Serialize};

/// A single TOTP account as exchanged between the import/export codecs
/// (otpauth URIs, Google Authenticator migration payloads, Aegis vaults).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub name: String,
    /// Base32 encoded shared secret.
    pub secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
}
