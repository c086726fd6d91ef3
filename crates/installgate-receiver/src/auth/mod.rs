//! Inbound credential verification
//!
//! Resolves which installation a request comes from and proves it: the
//! token's `sub` selects an installation record, and the token must be
//! signed with that record's current shared secret.

mod verifier;

pub use verifier::{AuthError, CredentialVerifier};
