//! Property-Based Tests for the installation credential model
//!
//! These tests check, for arbitrary installations and users:
//! 1. KEY BINDING: a credential verifies only under the secret of the
//!    installation that signed it
//! 2. ROUND TRIP: a minted assertion verifies back to the same identity
//! 3. EXTRACTION: only `Bearer <token>` headers yield a token

use installgate_core::{
    extract_bearer, mint_assertion, peek_subject, verify_with_secret, CredentialError,
    InstallationRecord, SharedSecret, VerificationOptions,
};
use proptest::prelude::*;

// =============================================================================
// Test Helpers
// =============================================================================

fn record(installation_id: &str, key: &[u8]) -> InstallationRecord {
    InstallationRecord {
        installation_id: installation_id.to_string(),
        org_id: "org_prop".to_string(),
        ones_base_url: "https://ones.example.com".to_string(),
        shared_secret: SharedSecret::from_bytes(key),
        callback_type: "install".to_string(),
        time_stamp: 0,
        app: None,
    }
}

// =============================================================================
// KEY BINDING and ROUND TRIP
// =============================================================================

proptest! {
    /// Minting for (I, U) and verifying with I's secret yields identity (I, U)
    #[test]
    fn prop_mint_verify_round_trip(
        installation in "install_[a-z0-9]{8,32}",
        user in "[A-Za-z0-9]{4,16}",
        key in proptest::collection::vec(any::<u8>(), 16..64),
    ) {
        let rec = record(&installation, &key);
        let token = mint_assertion(&rec, &user).expect("minting should succeed");

        prop_assert_eq!(peek_subject(&token).unwrap(), installation.clone());

        let identity = verify_with_secret(&token, &key, &VerificationOptions::default())
            .expect("round trip should verify")
            .into_identity();

        prop_assert_eq!(identity.installation_id, installation);
        prop_assert_eq!(identity.user_id, user);
    }

    /// A credential signed with A's secret never verifies under B's secret
    #[test]
    fn prop_foreign_secret_rejected(
        key_a in proptest::collection::vec(any::<u8>(), 16..64),
        key_b in proptest::collection::vec(any::<u8>(), 16..64),
    ) {
        prop_assume!(key_a != key_b);

        let token = mint_assertion(&record("install_a", &key_a), "user1").unwrap();
        let result = verify_with_secret(&token, &key_b, &VerificationOptions::default());

        prop_assert!(
            matches!(result, Err(CredentialError::SignatureInvalid(_))),
            "expected signature failure, got {:?}",
            result
        );
    }

    /// Flipping any character of the signature invalidates the token
    #[test]
    fn prop_tampered_signature_rejected(
        key in proptest::collection::vec(any::<u8>(), 16..64),
        offset in 0usize..20,
    ) {
        let token = mint_assertion(&record("install_t", &key), "user1").unwrap();
        let sig_start = token.rfind('.').unwrap() + 1;
        let idx = sig_start + offset % (token.len() - sig_start);

        let mut bytes = token.into_bytes();
        bytes[idx] = if bytes[idx] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(bytes).unwrap();

        prop_assert!(verify_with_secret(&tampered, &key, &VerificationOptions::default()).is_err());
    }
}

// =============================================================================
// EXTRACTION
// =============================================================================

proptest! {
    /// Well-formed headers always yield exactly the token
    #[test]
    fn prop_bearer_extracts_token(token in "[A-Za-z0-9._-]{1,64}") {
        let header = format!("Bearer {}", token);
        prop_assert_eq!(extract_bearer(Some(&header)).unwrap(), token.as_str());
    }

    /// Any scheme other than `Bearer` is a malformed header
    #[test]
    fn prop_other_schemes_rejected(scheme in "[A-Za-z]{1,10}", token in "[A-Za-z0-9]{1,32}") {
        prop_assume!(scheme != "Bearer");
        let header = format!("{} {}", scheme, token);
        prop_assert!(matches!(
            extract_bearer(Some(&header)),
            Err(CredentialError::MalformedHeader(_))
        ));
    }

    /// Extra segments are a malformed header, never a token
    #[test]
    fn prop_extra_segments_rejected(a in "[A-Za-z0-9]{1,16}", b in "[A-Za-z0-9]{1,16}") {
        let header = format!("Bearer {} {}", a, b);
        prop_assert!(matches!(
            extract_bearer(Some(&header)),
            Err(CredentialError::MalformedHeader(_))
        ));
    }
}
