//! Installation-scoped tokens
//!
//! Inbound credentials are HMAC-signed JWTs minted by the platform with the
//! installation's shared secret. Outbound assertions are minted here with
//! that same secret and exchanged for an access token.
//!
//! Verification is split in two phases so each can be tested on its own:
//!
//! 1. [`peek_subject`] reads `sub` without trusting the signature. The value
//!    is only good enough to look up which secret to verify against.
//! 2. [`verify_with_secret`] checks signature and temporal claims with the
//!    key of that installation.

use chrono::Utc;
use jsonwebtoken::{decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CredentialError, Result};
use crate::types::{Audience, InstallationIdentity, InstallationRecord};

/// Authorization scheme expected on inbound requests
pub const BEARER_SCHEME: &str = "Bearer";

/// Audience of minted client assertions
pub const ASSERTION_AUDIENCE: &str = "oauth";

/// Lifetime of minted client assertions (24 hours)
pub const ASSERTION_LIFETIME_SECS: i64 = 24 * 60 * 60;

/// Signing algorithms accepted on inbound credentials
pub const ACCEPTED_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

// =============================================================================
// Claims
// =============================================================================

/// Claims carried by a platform-issued inbound credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundClaims {
    /// Platform base URL that signed the token
    #[serde(default)]
    pub iss: String,

    /// Installation identifier
    pub sub: String,

    /// Application identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,

    /// Expiration (seconds since epoch)
    pub exp: i64,

    /// Issued at (seconds since epoch)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Not before (seconds since epoch)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,

    /// Acting user
    #[serde(default)]
    pub uid: String,
}

impl InboundClaims {
    /// Identity carried by a verified credential
    pub fn into_identity(self) -> InstallationIdentity {
        InstallationIdentity {
            installation_id: self.sub,
            user_id: self.uid,
            issuer: self.iss,
        }
    }
}

/// Claims of an outbound client assertion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub uid: String,
    pub iat: i64,
    pub exp: i64,
}

impl AssertionClaims {
    /// Claims for `installation_id` acting as `user_id`, issued at `now`
    pub fn new(installation_id: &str, user_id: &str, now: i64) -> Self {
        Self {
            iss: installation_id.to_string(),
            sub: installation_id.to_string(),
            aud: ASSERTION_AUDIENCE.to_string(),
            uid: user_id.to_string(),
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        }
    }
}

// =============================================================================
// Extraction
// =============================================================================

/// Extract the token from an `Authorization` header value
///
/// The header must be exactly two space-separated parts, the first being
/// `Bearer`. Anything else is a [`CredentialError::MalformedHeader`].
pub fn extract_bearer(header: Option<&str>) -> Result<&str> {
    let header = header
        .filter(|h| !h.is_empty())
        .ok_or_else(|| CredentialError::MalformedHeader("Authorization header is empty".into()))?;

    let parts: Vec<&str> = header.split(' ').collect();
    match parts.as_slice() {
        [scheme, token] if *scheme == BEARER_SCHEME && !token.is_empty() => Ok(token),
        _ => Err(CredentialError::MalformedHeader(format!(
            "expected `{} <token>`",
            BEARER_SCHEME
        ))),
    }
}

// =============================================================================
// Verification
// =============================================================================

/// Options for [`verify_with_secret`]
#[derive(Debug, Clone)]
pub struct VerificationOptions {
    /// Clock skew tolerated on `exp`, `nbf` and `iat`; zero unless opted in
    pub leeway_secs: u64,
    /// Required `aud` value, if any
    pub audience: Option<String>,
}

impl Default for VerificationOptions {
    fn default() -> Self {
        Self {
            leeway_secs: 0,
            audience: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct UnverifiedSubject {
    #[serde(default)]
    sub: Option<String>,
}

/// Read the `sub` claim without checking the signature
///
/// The returned value is untrusted. It only selects which installation's
/// secret the token is verified against.
pub fn peek_subject(token: &str) -> Result<String> {
    let header = decode_header(token).map_err(|e| CredentialError::MalformedToken(e.to_string()))?;

    let mut validation = Validation::new(header.alg);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let token_data = decode::<UnverifiedSubject>(token, &DecodingKey::from_secret(&[]), &validation)
        .map_err(|e| CredentialError::MalformedToken(e.to_string()))?;

    match token_data.claims.sub {
        Some(sub) if !sub.trim().is_empty() => Ok(sub),
        _ => Err(CredentialError::MissingClaim("sub".into())),
    }
}

/// Verify signature and temporal claims with an installation's raw key
pub fn verify_with_secret(token: &str, key: &[u8], options: &VerificationOptions) -> Result<InboundClaims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.algorithms = ACCEPTED_ALGORITHMS.to_vec();
    validation.leeway = options.leeway_secs;
    validation.validate_nbf = true;
    validation.set_required_spec_claims(&["exp", "sub"]);

    match options.audience {
        Some(ref aud) => validation.set_audience(&[aud]),
        None => validation.validate_aud = false,
    }

    let token_data = decode::<InboundClaims>(token, &DecodingKey::from_secret(key), &validation)?;
    let claims = token_data.claims;

    // jsonwebtoken has no notion of a future iat
    let now = Utc::now().timestamp();
    if let Some(iat) = claims.iat {
        if iat > now + options.leeway_secs as i64 {
            debug!(iat = iat, now = now, "Credential issued in the future");
            return Err(CredentialError::TokenNotYetValid);
        }
    }

    Ok(claims)
}

// =============================================================================
// Minting
// =============================================================================

/// Mint a client assertion for `record` acting as `user_id`
pub fn mint_assertion(record: &InstallationRecord, user_id: &str) -> Result<String> {
    mint_assertion_at(record, user_id, Utc::now().timestamp())
}

/// Mint a client assertion with an explicit issue time
pub fn mint_assertion_at(record: &InstallationRecord, user_id: &str, now: i64) -> Result<String> {
    let key = record.shared_secret.decode()?;
    let claims = AssertionClaims::new(&record.installation_id, user_id, now);

    encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(&key))
        .map_err(|e| CredentialError::Signing(e.to_string()))
}
