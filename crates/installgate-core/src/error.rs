//! Error types for installation credentials

use thiserror::Error;

/// Result type alias using CredentialError
pub type Result<T> = std::result::Result<T, CredentialError>;

/// Errors raised while extracting, verifying or minting installation tokens
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// Authorization header absent or not of the form `Bearer <token>`
    #[error("Malformed Authorization header: {0}")]
    MalformedHeader(String),

    /// Token structure could not be decoded
    #[error("Malformed token: {0}")]
    MalformedToken(String),

    /// A claim required for verification is absent or empty
    #[error("Missing required claim: {0}")]
    MissingClaim(String),

    /// Stored shared secret is not valid key material
    ///
    /// This is a data-integrity problem with the installation record,
    /// not a client error.
    #[error("Malformed shared secret: {0}")]
    MalformedSecret(String),

    /// Signature does not match the installation's current secret
    #[error("Invalid signature: {0}")]
    SignatureInvalid(String),

    /// Token expired
    #[error("Token expired")]
    TokenExpired,

    /// Token issued in the future or used before `nbf`
    #[error("Token not yet valid")]
    TokenNotYetValid,

    /// Audience claim does not name this application
    #[error("Invalid audience")]
    InvalidAudience,

    /// Signing an assertion failed
    #[error("Signing failed: {0}")]
    Signing(String),
}

impl CredentialError {
    /// Whether this failure is attributable to the presented credential
    /// rather than to stored installation data.
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            CredentialError::MalformedSecret(_) | CredentialError::Signing(_)
        )
    }
}

impl From<jsonwebtoken::errors::Error> for CredentialError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => CredentialError::TokenExpired,
            ErrorKind::ImmatureSignature => CredentialError::TokenNotYetValid,
            ErrorKind::InvalidSignature => CredentialError::SignatureInvalid(err.to_string()),
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                CredentialError::SignatureInvalid(format!("unexpected algorithm: {}", err))
            }
            ErrorKind::InvalidAudience => CredentialError::InvalidAudience,
            ErrorKind::MissingRequiredClaim(claim) => CredentialError::MissingClaim(claim.clone()),
            ErrorKind::InvalidKeyFormat => CredentialError::MalformedSecret(err.to_string()),
            _ => CredentialError::MalformedToken(err.to_string()),
        }
    }
}

impl From<base64::DecodeError> for CredentialError {
    fn from(err: base64::DecodeError) -> Self {
        CredentialError::MalformedSecret(format!("invalid base64 encoding: {}", err))
    }
}
