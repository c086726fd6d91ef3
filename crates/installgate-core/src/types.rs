//! Installation records and resolved identities

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

use crate::error::{CredentialError, Result};

/// Application descriptor supplied by a lifecycle callback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppInfo {
    /// Application identifier
    pub id: String,
    /// Application version
    pub version: String,
}

/// Base64-encoded symmetric key issued to one installation
///
/// Kept in its encoded form so it round-trips through storage untouched.
/// `Debug` never prints the key material.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SharedSecret(String);

impl SharedSecret {
    /// Wrap an encoded secret as received from the platform
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    /// Encode raw key bytes
    pub fn from_bytes(key: &[u8]) -> Self {
        Self(STANDARD.encode(key))
    }

    /// The encoded form, as stored
    pub fn encoded(&self) -> &str {
        &self.0
    }

    /// Decode into raw key bytes
    ///
    /// An empty key is rejected: HMAC would accept it and every token
    /// signed with an empty key would verify.
    pub fn decode(&self) -> Result<Vec<u8>> {
        let key = STANDARD.decode(self.0.trim())?;
        if key.is_empty() {
            return Err(CredentialError::MalformedSecret("empty key material".into()));
        }
        Ok(key)
    }
}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SharedSecret(<redacted>)")
    }
}

/// Credential and metadata for one installed instance of the app
///
/// Keyed by `installation_id`. Every other field is replaced wholesale
/// whenever a lifecycle callback for the same identifier arrives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallationRecord {
    /// Primary key, immutable once created
    pub installation_id: String,

    /// Owning organization
    pub org_id: String,

    /// Platform origin used for every outbound call for this installation
    pub ones_base_url: String,

    /// Shared secret issued at install time
    pub shared_secret: SharedSecret,

    /// Lifecycle event that created or last updated the record
    pub callback_type: String,

    /// Callback timestamp, seconds since epoch
    pub time_stamp: i64,

    /// Application descriptor, if the callback supplied one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<AppInfo>,
}

/// Identity resolved from a verified inbound credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallationIdentity {
    /// Installation the credential was verified against
    pub installation_id: String,
    /// Acting user on the platform
    pub user_id: String,
    /// Platform origin that signed the credential
    pub issuer: String,
}

/// `aud` claim, which the platform may send as a string or an array
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Many(Vec<String>),
}

impl Audience {
    /// Whether the claim names the given audience
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Audience::Single(aud) => aud == audience,
            Audience::Many(auds) => auds.iter().any(|a| a == audience),
        }
    }
}
