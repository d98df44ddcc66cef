//! Token issuance and verification for the NoteHub server.
//!
//! Sign-in exchanges credentials for a compact signed token (HS256 JWS)
//! embedding the holder's [`Claims`]. The signing key is process-wide
//! configuration: loaded once at startup into a [`TokenAuthority`] and
//! never rotated mid-process.
//!
//! Verification rejects malformed structure, signature mismatch, and
//! expiry in the past, measured against verification-time "now" with no
//! leeway. Tokens are opaque to holders; editing the claims invalidates
//! the signature.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Identity facts a verified token asserts about its holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject identifier: the user id.
    pub sub: String,

    /// Denormalized email for handlers that need it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Issued-at, seconds since the Unix epoch.
    pub iat: i64,

    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
}

/// Reasons a token failed verification.
///
/// The auth gate folds all of these into a single `Unauthenticated`
/// response; the distinction exists for logs and tests only.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The token's expiry is in the past.
    #[error("token expired")]
    Expired,

    /// The signature does not match the claims.
    #[error("invalid token signature")]
    InvalidSignature,

    /// The token is not a structurally valid JWS.
    #[error("malformed token")]
    Malformed,

    /// Signing failed while issuing a token.
    #[error("token signing failed")]
    Signing,
}

/// Issues and verifies tokens with a single process-wide key.
pub struct TokenAuthority {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenAuthority {
    /// Creates an authority from the configured secret and token TTL.
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is exact: a token is invalid the second it expires.
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl,
        }
    }

    /// The configured time-to-live for issued tokens.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issues a signed token for the given subject.
    ///
    /// Issued-at is "now"; expiry is issued-at plus the configured TTL.
    pub fn issue(&self, subject: &str, email: Option<&str>) -> Result<String, TokenError> {
        let iat = Utc::now().timestamp();
        let claims = Claims {
            sub: subject.to_string(),
            email: email.map(str::to_string),
            iat,
            exp: iat + self.ttl.as_secs() as i64,
        };

        encode(&Header::default(), &claims, &self.encoding).map_err(|err| {
            debug!(error = %err, "token signing failed");
            TokenError::Signing
        })
    }

    /// Verifies a token and returns its claims.
    ///
    /// # Errors
    ///
    /// - [`TokenError::Expired`] once current time exceeds the embedded expiry
    /// - [`TokenError::InvalidSignature`] if the claims were tampered with
    ///   or signed with a different key
    /// - [`TokenError::Malformed`] for anything that is not a valid JWS
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                _ => TokenError::Malformed,
            })
    }
}

impl std::fmt::Debug for TokenAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAuthority")
            .field("ttl", &self.ttl)
            .finish()
    }
}
