//! Credential hashing for the NoteHub server.
//!
//! Passwords are hashed with Argon2id using a per-call random salt; the
//! salt and parameters are embedded in the PHC-format digest, so
//! verification needs nothing but the digest itself. Comparison inside the
//! verifier is constant-time.
//!
//! Stored digests never leave this boundary in plaintext-comparable form:
//! callers get a digest string from [`hash_password`] and a yes/no from
//! [`verify_password`].

use argon2::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur while producing a digest.
///
/// Verification never errors: a malformed or mismatched digest is a
/// verification failure, not a fault.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PasswordError {
    /// The hasher rejected its inputs or parameters.
    #[error("password hashing failed")]
    HashFailed,
}

/// Hashes a plaintext password into a PHC-format Argon2id digest.
///
/// Each call draws a fresh random salt, so hashing the same plaintext
/// twice yields different digests.
pub fn hash_password(plaintext: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let digest = Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map_err(|err| {
            debug!(error = %err, "argon2 hashing failed");
            PasswordError::HashFailed
        })?;
    Ok(digest.to_string())
}

/// Verifies a plaintext password against a stored digest.
///
/// Returns `false` for a mismatched password and for any digest that does
/// not parse as a valid PHC string; the two cases are indistinguishable to
/// the caller.
pub fn verify_password(plaintext: &str, digest: &str) -> bool {
    let parsed = match PasswordHash::new(digest) {
        Ok(parsed) => parsed,
        Err(err) => {
            debug!(error = %err, "stored digest is malformed");
            return false;
        }
    };

    Argon2::default()
        .verify_password(plaintext.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_succeeds_for_the_hashed_password() {
        let digest = hash_password("correct horse battery staple").unwrap();
        assert!(verify_password("correct horse battery staple", &digest));
    }

    #[test]
    fn verify_fails_for_a_different_password() {
        let digest = hash_password("correct horse battery staple").unwrap();
        assert!(!verify_password("incorrect horse", &digest));
    }

    #[test]
    fn hashing_the_same_password_twice_salts_differently() {
        let first = hash_password("same-password").unwrap();
        let second = hash_password("same-password").unwrap();
        assert_ne!(first, second);

        // Both digests still verify.
        assert!(verify_password("same-password", &first));
        assert!(verify_password("same-password", &second));
    }

    #[test]
    fn digest_is_phc_format_argon2id() {
        let digest = hash_password("test-password").unwrap();
        assert!(digest.starts_with("$argon2id$"));
    }

    #[test]
    fn malformed_digest_is_a_verification_failure_not_a_crash() {
        assert!(!verify_password("anything", "not-a-phc-digest"));
        assert!(!verify_password("anything", ""));
        assert!(!verify_password("anything", "$argon2id$v=19$truncated"));
    }

    #[test]
    fn empty_password_round_trips() {
        let digest = hash_password("").unwrap();
        assert!(verify_password("", &digest));
        assert!(!verify_password("x", &digest));
    }
}
