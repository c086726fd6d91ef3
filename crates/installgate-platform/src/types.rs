//! Token exchange and API response types

use reqwest::StatusCode;
use serde::Deserialize;

use crate::error::{PlatformError, Result};

/// Access token obtained by exchanging a client assertion
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    /// Bearer value for API calls
    pub access_token: String,
    /// Token type reported by the platform, usually `Bearer`
    pub token_type: Option<String>,
    /// Lifetime in seconds, if reported
    pub expires_in: Option<u64>,
    /// Granted scope, if reported
    pub scope: Option<String>,
    /// Platform user the token acts for, if reported
    pub user_id: Option<String>,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .field("user_id", &self.user_id)
            .finish()
    }
}

/// Token endpoint response (OAuth2 shape plus platform extras)
#[derive(Debug, Deserialize)]
#[allow(dead_code)] // Fields returned by the platform, not all used directly
pub(crate) struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

impl TokenResponse {
    /// Parse a token endpoint body
    pub(crate) fn parse(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body)
            .map_err(|e| PlatformError::UpstreamMalformedResponse(format!("token response is not valid JSON: {}", e)))
    }

    pub(crate) fn into_access_token(self) -> Result<AccessToken> {
        let access_token = self
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| PlatformError::UpstreamMalformedResponse("token response has no access_token".into()))?;

        Ok(AccessToken {
            access_token,
            token_type: self.token_type,
            expires_in: self.expires_in,
            scope: self.scope,
            user_id: self.user_id,
        })
    }
}

/// Raw platform API response
///
/// Returned for every status code; callers decide what a non-2xx means.
#[derive(Debug, Clone)]
pub struct PlatformResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl PlatformResponse {
    /// Body as UTF-8, lossily
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Body parsed as JSON
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }
}
