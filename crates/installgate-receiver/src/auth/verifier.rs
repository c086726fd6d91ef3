//! Installation-keyed credential verifier

use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use installgate_core::{
    extract_bearer, peek_subject, verify_with_secret, CredentialError, InstallationIdentity,
    VerificationOptions,
};

use crate::storage::{InstallationStore, StorageError};

/// Verification failure
#[derive(Error, Debug)]
pub enum AuthError {
    /// Token, header or stored secret problem
    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// `sub` names an installation we have no record of
    #[error("Unknown installation: {0}")]
    UnknownInstallation(String),

    /// The store could not be consulted
    #[error("Storage failure during verification: {0}")]
    Storage(StorageError),
}

impl From<StorageError> for AuthError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(id) => AuthError::UnknownInstallation(id),
            other => AuthError::Storage(other),
        }
    }
}

impl AuthError {
    /// Whether the failure is the client's credential rather than our data
    /// or infrastructure
    pub fn is_client_error(&self) -> bool {
        match self {
            AuthError::Credential(err) => err.is_client_error(),
            AuthError::UnknownInstallation(_) => true,
            AuthError::Storage(_) => false,
        }
    }
}

/// Verifies inbound credentials against per-installation secrets
///
/// Holds no cache: every call reads the current record, so a rotated
/// secret takes effect on the next request.
#[derive(Debug, Clone)]
pub struct CredentialVerifier {
    store: Arc<dyn InstallationStore>,
    options: VerificationOptions,
}

impl CredentialVerifier {
    /// Create a verifier reading secrets from `store`
    pub fn new(store: Arc<dyn InstallationStore>, options: VerificationOptions) -> Self {
        Self { store, options }
    }

    /// Verification options in effect
    pub fn options(&self) -> &VerificationOptions {
        &self.options
    }

    /// Verify a raw token
    ///
    /// 1. Peek `sub` without trusting the signature
    /// 2. Look up that installation's record
    /// 3. Decode its shared secret
    /// 4. Verify signature and temporal claims with it
    pub async fn verify(&self, token: &str) -> Result<InstallationIdentity, AuthError> {
        // Step 1: untrusted subject, only used as a lookup key
        let subject = peek_subject(token)?;

        // Step 2: current record for that subject
        let record = self.store.get(&subject).await?;

        // Step 3: key material
        let key = record.shared_secret.decode()?;

        // Step 4: signature, exp, nbf, iat
        let claims = verify_with_secret(token, &key, &self.options)?;

        // The verified subject must be the one we looked up
        if claims.sub != subject {
            return Err(
                CredentialError::SignatureInvalid("subject changed between decode passes".into()).into(),
            );
        }

        debug!(
            installation_id = %claims.sub,
            user_id = %claims.uid,
            issuer = %claims.iss,
            "Credential verified"
        );

        Ok(claims.into_identity())
    }

    /// Verify the bearer credential carried by an `Authorization` header value
    pub async fn verify_header(&self, header: Option<&str>) -> Result<InstallationIdentity, AuthError> {
        let token = extract_bearer(header)?;
        self.verify(token).await
    }
}
