//! Error types for platform calls

use installgate_core::CredentialError;
use thiserror::Error;

/// Result type for platform operations
pub type Result<T> = std::result::Result<T, PlatformError>;

/// Errors that can occur while talking to the platform
#[derive(Error, Debug)]
pub enum PlatformError {
    /// Assertion could not be minted for the installation
    #[error("Assertion minting failed: {0}")]
    Credential(#[from] CredentialError),

    /// Installation base URL could not be parsed or joined
    #[error("Invalid platform base URL: {0}")]
    InvalidBaseUrl(String),

    /// Outbound request could not be built
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Connection, timeout or transport failure
    #[error("Network failure: {0}")]
    Network(String),

    /// Token endpoint answered with a non-success status
    #[error("Token exchange rejected with status {status}")]
    TokenRejected { status: u16, body: String },

    /// Token endpoint answered with a body we cannot use
    #[error("Malformed upstream response: {0}")]
    UpstreamMalformedResponse(String),
}

impl PlatformError {
    /// Whether the failure happened before reaching the platform
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            PlatformError::Credential(_) | PlatformError::InvalidBaseUrl(_) | PlatformError::InvalidRequest(_)
        )
    }
}

impl From<reqwest::Error> for PlatformError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            PlatformError::InvalidRequest(err.to_string())
        } else {
            PlatformError::Network(err.to_string())
        }
    }
}
