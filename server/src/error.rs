//! Error taxonomy for the NoteHub server.
//!
//! This module defines the closed set of request error codes, the
//! [`ApiError`] value that carries a code through request handling, and the
//! typed context payloads attached to individual codes.
//!
//! # Design
//!
//! - [`ErrorCode`] is a closed enumeration. Every code maps to exactly one
//!   HTTP status and a default message via [`ErrorCode::describe`]; codes
//!   serialize by their stable symbolic name so clients can branch on them.
//! - [`ApiError`] is a one-shot value object: constructed at the point of
//!   failure detection, never mutated afterwards, and consumed exactly once
//!   by the dispatcher (see [`crate::dispatch`]).
//! - Context payloads are a tagged union keyed by code ([`ErrorContext`]),
//!   so each code carries only the fields relevant to it.
//!
//! # Example
//!
//! ```rust
//! use notehub_server::error::{ApiError, ErrorCode};
//!
//! fn check_grade(grade: u8) -> Result<(), ApiError> {
//!     if grade > 5 {
//!         return Err(ApiError::maximum_allowed_grade(grade));
//!     }
//!     Ok(())
//! }
//!
//! let err = check_grade(7).unwrap_err();
//! assert_eq!(err.code(), ErrorCode::MaximumAllowedGrade);
//! ```

use std::error::Error;
use std::fmt;

use axum::http::StatusCode;
use serde::Serialize;

use crate::store::StoreError;

/// Stable symbolic identifiers for request failures.
///
/// The set is closed: extending it means adding a new variant together with
/// its entry in [`ErrorCode::describe`]. Existing names are never renamed or
/// renumbered, since clients branch on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorCode {
    /// No valid credentials or token were presented.
    Unauthenticated,

    /// Request input failed field-level validation.
    ValidationError,

    /// An entity with the same unique key already exists.
    DuplicateEntityError,

    /// The addressed entity does not exist.
    EntityNotFoundError,

    /// A note grade above the allowed maximum was submitted.
    MaximumAllowedGrade,

    /// A suspended dependency call completed with a failure.
    AsyncError,

    /// Unclassified fault; internals are logged, never echoed.
    UnknownError,
}

impl ErrorCode {
    /// All registered codes, in registry order.
    pub const ALL: [ErrorCode; 7] = [
        ErrorCode::Unauthenticated,
        ErrorCode::ValidationError,
        ErrorCode::DuplicateEntityError,
        ErrorCode::EntityNotFoundError,
        ErrorCode::MaximumAllowedGrade,
        ErrorCode::AsyncError,
        ErrorCode::UnknownError,
    ];

    /// Looks up the registry entry for this code.
    ///
    /// Total over the enumeration: every code has exactly one status and
    /// one default message.
    pub fn describe(self) -> (StatusCode, &'static str) {
        match self {
            Self::Unauthenticated => (StatusCode::UNAUTHORIZED, "authentication required"),
            Self::ValidationError => (StatusCode::BAD_REQUEST, "request validation failed"),
            Self::DuplicateEntityError => (StatusCode::CONFLICT, "entity already exists"),
            Self::EntityNotFoundError => (StatusCode::NOT_FOUND, "entity not found"),
            Self::MaximumAllowedGrade => {
                (StatusCode::BAD_REQUEST, "maximum allowed grade exceeded")
            }
            Self::AsyncError => (StatusCode::BAD_GATEWAY, "upstream dependency failed"),
            Self::UnknownError => (StatusCode::INTERNAL_SERVER_ERROR, "something went wrong"),
        }
    }

    /// The HTTP status this code renders with.
    pub fn http_status(self) -> StatusCode {
        self.describe().0
    }

    /// The message used when the raising site does not supply one.
    pub fn default_message(self) -> &'static str {
        self.describe().1
    }

    /// The stable wire name of this code.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unauthenticated => "Unauthenticated",
            Self::ValidationError => "ValidationError",
            Self::DuplicateEntityError => "DuplicateEntityError",
            Self::EntityNotFoundError => "EntityNotFoundError",
            Self::MaximumAllowedGrade => "MaximumAllowedGrade",
            Self::AsyncError => "AsyncError",
            Self::UnknownError => "UnknownError",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// The offending input field.
    pub field: String,

    /// The constraint that was not met.
    pub constraint: String,
}

/// Structured context attached to an [`ApiError`], keyed by code.
///
/// Serializes untagged, so the wire shape is just the variant's fields
/// (e.g. `{"email": "a@x.com"}` for a duplicate entity).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ErrorContext {
    /// The unique key that already exists ([`ErrorCode::DuplicateEntityError`]).
    Duplicate {
        /// The conflicting email address.
        email: String,
    },

    /// Field violations ([`ErrorCode::ValidationError`]).
    Violations {
        /// The non-empty list of violations.
        violations: Vec<Violation>,
    },

    /// The rejected grade ([`ErrorCode::MaximumAllowedGrade`]).
    Grade {
        /// The grade the client submitted.
        grade: u8,
    },
}

/// A typed request failure, carrying a registered code and optional context.
///
/// Business logic never formats HTTP responses on failure; it constructs an
/// `ApiError` (or converts a collaborator failure into one) and propagates
/// it with `?`. The dispatcher renders the wire response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    code: ErrorCode,
    context: Option<ErrorContext>,
    message: Option<String>,
}

impl ApiError {
    /// Creates an error with the given code and no context.
    pub fn new(code: ErrorCode) -> Self {
        Self {
            code,
            context: None,
            message: None,
        }
    }

    /// Overrides the registry default message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Creates an authentication failure.
    ///
    /// Deliberately carries no context: a missing token and a tampered
    /// token must be indistinguishable to the caller.
    pub fn unauthenticated() -> Self {
        Self::new(ErrorCode::Unauthenticated)
    }

    /// Creates a duplicate-entity error carrying the conflicting email.
    pub fn duplicate_entity(email: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::DuplicateEntityError,
            context: Some(ErrorContext::Duplicate {
                email: email.into(),
            }),
            message: None,
        }
    }

    /// Creates a not-found error.
    pub fn entity_not_found() -> Self {
        Self::new(ErrorCode::EntityNotFoundError)
    }

    /// Creates a validation error carrying the violation list.
    pub fn validation(violations: Vec<Violation>) -> Self {
        Self {
            code: ErrorCode::ValidationError,
            context: Some(ErrorContext::Violations { violations }),
            message: None,
        }
    }

    /// Creates a grade-limit error carrying the rejected grade.
    pub fn maximum_allowed_grade(grade: u8) -> Self {
        Self {
            code: ErrorCode::MaximumAllowedGrade,
            context: Some(ErrorContext::Grade { grade }),
            message: None,
        }
    }

    /// The registered code of this error.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// The context payload, if the raising site attached one.
    pub fn context(&self) -> Option<&ErrorContext> {
        self.context.as_ref()
    }

    /// The rendered message: the override if present, otherwise the
    /// registry default for the code.
    pub fn message(&self) -> &str {
        self.message
            .as_deref()
            .unwrap_or_else(|| self.code.default_message())
    }

    /// The HTTP status this error renders with.
    pub fn status(&self) -> StatusCode {
        self.code.http_status()
    }

    /// Returns `true` if this error indicates a client-side problem.
    pub fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message())
    }
}

impl Error for ApiError {}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate { key } => Self::duplicate_entity(key),
            StoreError::NotFound => Self::entity_not_found(),
            // Transport-level faults surface as a failed suspended
            // dependency; the detail stays in the logs.
            StoreError::Unavailable(reason) => {
                tracing::error!(error = %reason, "store call failed");
                Self::new(ErrorCode::AsyncError)
            }
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut violations: Vec<Violation> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |err| Violation {
                    field: field.to_string(),
                    constraint: err
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| err.code.to_string()),
                })
            })
            .collect();

        // Field order from the validator is not deterministic.
        violations.sort_by(|a, b| a.field.cmp(&b.field));

        Self::validation(violations)
    }
}
