//! Domain types for the NoteHub server.
//!
//! Request payloads carry their validation constraints as derive
//! attributes; handlers call `validate()` and wrap any violations into the
//! error taxonomy. Stored records and wire responses are separate shapes:
//! a [`UserRecord`] holds the credential digest and never serializes, a
//! [`PublicUser`] is what sign-up returns.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Highest grade a note can receive.
pub const MAX_NOTE_GRADE: u8 = 5;

/// A stored user identity with its credential digest.
///
/// Created at sign-up, read at sign-in for verification. The digest is
/// one-way; it is compared inside the hasher boundary and never exposed.
#[derive(Clone, PartialEq, Eq)]
pub struct UserRecord {
    /// Unique user id.
    pub id: Uuid,

    /// Unique sign-in email.
    pub email: String,

    /// Display name.
    pub name: String,

    /// PHC-format password digest.
    pub password_hash: String,
}

impl UserRecord {
    /// Creates a record with a fresh id.
    pub fn new(
        email: impl Into<String>,
        name: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            name: name.into(),
            password_hash: password_hash.into(),
        }
    }
}

// Keeps credential digests out of logs and error output.
impl fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserRecord")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("name", &self.name)
            .field("password_hash", &"<redacted>")
            .finish()
    }
}

/// The user shape returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicUser {
    /// Unique user id.
    pub id: Uuid,

    /// Sign-in email.
    pub email: String,

    /// Display name.
    pub name: String,
}

impl From<UserRecord> for PublicUser {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.id,
            email: record.email,
            name: record.name,
        }
    }
}

/// A stored note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    /// Unique note id.
    pub id: Uuid,

    /// Note title.
    pub title: String,

    /// Note body.
    pub body: String,

    /// The user who created the note.
    pub author_id: Uuid,

    /// Grade assigned to the note, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade: Option<u8>,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Note {
    /// Creates a note owned by the given author.
    pub fn new(title: impl Into<String>, body: impl Into<String>, author_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            body: body.into(),
            author_id,
            grade: None,
            created_at: Utc::now(),
        }
    }
}

/// Sign-up request payload.
#[derive(Debug, Deserialize, Validate)]
pub struct SignUpRequest {
    /// Sign-in email; must be unique.
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,

    /// Display name.
    #[validate(length(min = 1, max = 120, message = "must be 1 to 120 characters"))]
    pub name: String,

    /// Plaintext password; hashed before storage.
    #[validate(length(min = 8, max = 128, message = "must be 8 to 128 characters"))]
    pub password: String,
}

/// Sign-in request payload.
#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    /// Sign-in email.
    pub email: String,

    /// Plaintext password.
    pub password: String,
}

/// Sign-in response payload.
#[derive(Debug, Serialize, Deserialize)]
pub struct SignInResponse {
    /// Signed bearer token for protected routes.
    pub token: String,
}

/// Note-creation request payload.
#[derive(Debug, Deserialize, Validate)]
pub struct NoteDraft {
    /// Note title.
    #[validate(length(min = 10, max = 500, message = "must be 10 to 500 characters"))]
    pub title: String,

    /// Note body.
    #[validate(length(min = 100, max = 5000, message = "must be 100 to 5000 characters"))]
    pub body: String,
}

/// Note-grading request payload.
#[derive(Debug, Deserialize)]
pub struct GradeRequest {
    /// Grade to assign, at most [`MAX_NOTE_GRADE`].
    pub grade: u8,
}
