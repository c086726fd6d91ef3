//! # Installgate Core
//!
//! Data model and token primitives for an app installed into a host
//! platform, where every installation holds its own shared secret.
//!
//! ## Key Concepts
//!
//! - **Installation**: one tenant's deployment of the app, keyed by an
//!   installation identifier
//! - **Shared secret**: per-installation HMAC key, used both to verify
//!   inbound credentials and to sign outbound assertions
//! - **Assertion**: a self-signed token exchanged for a platform access token
//!
//! ## Trust Model
//!
//! A credential is valid iff it was signed with the secret currently on file
//! for the installation named in its `sub` claim. The subject is trusted only
//! far enough to select that secret.
//!
//! Nothing in this crate performs I/O; storage lookups and HTTP live in the
//! receiver and platform crates.

pub mod error;
pub mod token;
pub mod types;

pub use error::{CredentialError, Result};
pub use token::{
    extract_bearer, mint_assertion, mint_assertion_at, peek_subject, verify_with_secret,
    AssertionClaims, InboundClaims, VerificationOptions,
};
pub use types::{AppInfo, Audience, InstallationIdentity, InstallationRecord, SharedSecret};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
