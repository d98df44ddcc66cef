//! HTTP route handlers for the NoteHub server.
//!
//! This module provides the HTTP API endpoints:
//!
//! - `GET /health` - Health check endpoint
//! - `POST /sign-up` - Create a user account
//! - `POST /sign-in` - Exchange credentials for a bearer token
//! - `GET /me` - Echo the verified claims (protected)
//! - `POST /notes` - Create a note (protected)
//! - `POST /notes/{id}/grade` - Grade a note (protected)
//!
//! # Architecture
//!
//! All routes share application state through [`AppState`]: configuration,
//! the token authority, and the persistence store. Protected routes sit
//! behind the auth gate ([`crate::auth::require_auth`]), which always
//! completes verification before a handler runs.
//!
//! Handlers return `Result<_, ApiError>`. The first failure ends the
//! handler; rendering happens in one place, the dispatcher
//! ([`crate::dispatch`]). No handler formats an error response itself.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::StatusCode;
use axum::middleware;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};
use uuid::Uuid;
use validator::Validate;

use crate::auth::require_auth;
use crate::config::Config;
use crate::dispatch::{handle_panic, track_request};
use crate::error::{ApiError, ErrorCode};
use crate::password;
use crate::store::{MemoryStore, NoteStore};
use crate::token::{Claims, TokenAuthority};
use crate::types::{
    GradeRequest, Note, NoteDraft, PublicUser, SignInRequest, SignInResponse, SignUpRequest,
    UserRecord, MAX_NOTE_GRADE,
};

/// Maximum request body size (64 KB).
const MAX_BODY_SIZE: usize = 64 * 1024;

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for all route handlers.
///
/// Built once at startup and cloned per request; everything inside is
/// either immutable after construction or internally synchronized.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<Config>,

    /// Process-wide token issuer/verifier.
    pub tokens: Arc<TokenAuthority>,

    /// Persistence backend.
    pub store: Arc<dyn NoteStore>,

    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Creates application state backed by an in-memory store.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self::with_store(config, Arc::new(MemoryStore::new()))
    }

    /// Creates application state with a custom persistence backend.
    #[must_use]
    pub fn with_store(config: Config, store: Arc<dyn NoteStore>) -> Self {
        let tokens = TokenAuthority::new(config.token_secret.as_bytes(), config.token_ttl);
        Self {
            config: Arc::new(config),
            tokens: Arc::new(tokens),
            store,
            start_time: Instant::now(),
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &"<Config>")
            .field("tokens", &self.tokens)
            .field("start_time", &self.start_time)
            .finish()
    }
}

// ============================================================================
// Router
// ============================================================================

/// Creates the application router with all routes and layers configured.
///
/// Protected routes are wrapped by the auth gate; the whole stack is
/// wrapped by the dispatch tracker and the panic-catching layer so that
/// unknown faults render the generic body instead of tearing down the
/// connection.
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/me", get(get_me))
        .route("/notes", post(create_note))
        .route("/notes/{id}/grade", post(grade_note))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    Router::new()
        .route("/health", get(get_health))
        .route("/sign-up", post(sign_up))
        .route("/sign-in", post(sign_in))
        .merge(protected)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(middleware::from_fn(track_request))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Unwraps a JSON body, mapping extractor rejections into the taxonomy so
/// the dispatcher stays the only error renderer.
fn require_json<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => {
            debug!(error = %rejection, "request body rejected");
            Err(ApiError::new(ErrorCode::ValidationError).with_message("invalid request body"))
        }
    }
}

// ============================================================================
// GET /health - Health Check
// ============================================================================

/// Response body for the health check endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Server status (always "ok" if responding).
    pub status: String,

    /// Server uptime in seconds.
    pub uptime_seconds: u64,
}

/// GET /health - Health check endpoint. No authentication required.
async fn get_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

// ============================================================================
// POST /sign-up - Account Creation
// ============================================================================

/// POST /sign-up - Create a user account.
///
/// # Responses
///
/// - `201 Created` - Account created; body is the public user shape
/// - `400 Bad Request` - `ValidationError` with the violation list
/// - `409 Conflict` - `DuplicateEntityError` carrying the conflicting email
async fn sign_up(
    State(state): State<AppState>,
    payload: Result<Json<SignUpRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PublicUser>), ApiError> {
    let payload = require_json(payload)?;
    payload.validate()?;

    // First failure ends the handler: a duplicate must never fall through
    // to the insert below.
    if state
        .store
        .find_user_by_email(&payload.email)
        .await?
        .is_some()
    {
        return Err(ApiError::duplicate_entity(payload.email));
    }

    // Hashing is slow on purpose; run it off the async worker.
    let plaintext = payload.password.clone();
    let digest = tokio::task::spawn_blocking(move || password::hash_password(&plaintext))
        .await
        .map_err(|err| {
            error!(error = %err, "hashing task failed");
            ApiError::new(ErrorCode::UnknownError)
        })?
        .map_err(|err| {
            error!(error = %err, "password hashing failed");
            ApiError::new(ErrorCode::UnknownError)
        })?;

    let record = UserRecord::new(payload.email, payload.name, digest);
    state.store.create_user(record.clone()).await?;

    info!(user_id = %record.id, "user created");
    Ok((StatusCode::CREATED, Json(PublicUser::from(record))))
}

// ============================================================================
// POST /sign-in - Token Issuance
// ============================================================================

/// POST /sign-in - Exchange credentials for a bearer token.
///
/// An unknown email and a wrong password produce identical responses; the
/// endpoint never reveals which check failed.
///
/// # Responses
///
/// - `200 OK` - `{token}`
/// - `401 Unauthorized` - `Unauthenticated`
async fn sign_in(
    State(state): State<AppState>,
    payload: Result<Json<SignInRequest>, JsonRejection>,
) -> Result<Json<SignInResponse>, ApiError> {
    let payload = require_json(payload)?;

    let user = state
        .store
        .find_user_by_email(&payload.email)
        .await?
        .ok_or_else(ApiError::unauthenticated)?;

    let plaintext = payload.password;
    let digest = user.password_hash.clone();
    let valid = tokio::task::spawn_blocking(move || password::verify_password(&plaintext, &digest))
        .await
        .map_err(|err| {
            error!(error = %err, "verification task failed");
            ApiError::new(ErrorCode::UnknownError)
        })?;

    if !valid {
        return Err(ApiError::unauthenticated());
    }

    let token = state
        .tokens
        .issue(&user.id.to_string(), Some(&user.email))
        .map_err(|err| {
            error!(error = %err, "token issuance failed");
            ApiError::new(ErrorCode::UnknownError)
        })?;

    info!(user_id = %user.id, "user signed in");
    Ok(Json(SignInResponse { token }))
}

// ============================================================================
// GET /me - Verified Claims
// ============================================================================

/// Response body for the claims echo endpoint.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    /// Subject identifier from the verified token.
    pub subject_id: String,

    /// Email from the verified token, if present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Issued-at, seconds since the Unix epoch.
    pub issued_at: i64,

    /// Expiry, seconds since the Unix epoch.
    pub expires_at: i64,
}

/// GET /me - Echo the claims the auth gate verified.
///
/// The claims come from the gate's output in the request extensions; the
/// handler never re-reads anything the client supplied.
async fn get_me(Extension(claims): Extension<Claims>) -> Json<MeResponse> {
    Json(MeResponse {
        subject_id: claims.sub,
        email: claims.email,
        issued_at: claims.iat,
        expires_at: claims.exp,
    })
}

// ============================================================================
// POST /notes - Note Creation
// ============================================================================

/// POST /notes - Create a note owned by the token's subject.
///
/// # Responses
///
/// - `201 Created` - The stored note
/// - `400 Bad Request` - `ValidationError` with the violation list
async fn create_note(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<NoteDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<Note>), ApiError> {
    let draft = require_json(payload)?;
    draft.validate()?;

    let author_id = Uuid::parse_str(&claims.sub).map_err(|_| {
        debug!("token subject is not a valid user id");
        ApiError::unauthenticated()
    })?;

    let note = Note::new(draft.title, draft.body, author_id);
    state.store.create_note(note.clone()).await?;

    info!(note_id = %note.id, author_id = %author_id, "note created");
    Ok((StatusCode::CREATED, Json(note)))
}

// ============================================================================
// POST /notes/{id}/grade - Note Grading
// ============================================================================

/// POST /notes/{id}/grade - Assign a grade to a note.
///
/// # Responses
///
/// - `200 OK` - The updated note
/// - `400 Bad Request` - `MaximumAllowedGrade` carrying the rejected grade
/// - `404 Not Found` - `EntityNotFoundError`
async fn grade_note(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<GradeRequest>, JsonRejection>,
) -> Result<Json<Note>, ApiError> {
    // An id that is not a well-formed UUID addresses no entity.
    let Path(id) = id.map_err(|rejection| {
        debug!(error = %rejection, "invalid note id");
        ApiError::entity_not_found()
    })?;

    let payload = require_json(payload)?;

    if payload.grade > MAX_NOTE_GRADE {
        return Err(ApiError::maximum_allowed_grade(payload.grade));
    }

    let note = state.store.set_note_grade(id, payload.grade).await?;

    info!(note_id = %note.id, grade = payload.grade, "note graded");
    Ok(Json(note))
}

// ============================================================================
// Tests
// ============================================================================
