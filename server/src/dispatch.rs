//! Terminal error dispatch for the NoteHub server.
//!
//! Every request failure converges here, whatever its origin: a handler
//! returning [`ApiError`] synchronously, a suspended store or hashing call
//! completing with a failure that was propagated with `?`, or a panic
//! caught by the panic layer. The dispatcher classifies the failure and
//! renders the one wire response a request is allowed to get:
//!
//! - a known [`ApiError`] renders `{code, message, context}` with the
//!   status the registry assigns to its code;
//! - anything else renders a fixed generic body. The fault is logged for
//!   operators but never echoed to the client.
//!
//! # One response per request
//!
//! Handlers return `Result<_, ApiError>`, so the type system already makes
//! "signal a failure, then keep writing" unrepresentable: the first `?`
//! ends the handler. On top of that, every request carries a
//! [`DispatchGuard`] tracking the `Pending -> {Succeeded | Failed} ->
//! Dispatched` lifecycle. `Dispatched` is terminal; a second dispatch
//! attempt is a logged anomaly and a no-op. Work spawned from a handler
//! must hold the request's guard and route its failure through
//! [`DispatchGuard::report_late_failure`] instead of dropping it.

use std::any::Any;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::error::{ApiError, ErrorCode, ErrorContext};

/// Wire shape of every error response body.
#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    code: ErrorCode,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<&'a ErrorContext>,
}

/// Renders a known, registered failure.
///
/// The status comes from the registry; the context is echoed verbatim.
pub fn render_known(error: &ApiError) -> Response {
    let status = error.status();

    if status.is_server_error() {
        warn!(code = %error.code(), status = %status, "request failed");
    } else {
        debug!(code = %error.code(), status = %status, "request failed");
    }

    let body = ErrorBody {
        code: error.code(),
        message: error.message(),
        context: error.context(),
    };

    (status, Json(body)).into_response()
}

/// Renders the fixed unknown-fault response.
///
/// The body is constant: no stack traces, no internal messages.
pub fn render_unknown() -> Response {
    let (status, message) = ErrorCode::UnknownError.describe();
    let body = ErrorBody {
        code: ErrorCode::UnknownError,
        message,
        context: None,
    };
    (status, Json(body)).into_response()
}

/// Classifies and renders a fault that is not an [`ApiError`].
///
/// The fault is logged in full for operators; the client gets the fixed
/// generic body.
pub fn render_fault(fault: &dyn std::fmt::Display) -> Response {
    error!(error = %fault, "unclassified fault reached the dispatcher");
    render_unknown()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        render_known(&self)
    }
}

/// Response hook for the panic-catching layer.
///
/// Panic payloads go to the log; the wire gets the generic body.
pub fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    };

    error!(panic = %detail, "handler panicked");
    render_unknown()
}

const PHASE_PENDING: u8 = 0;
const PHASE_SUCCEEDED: u8 = 1;
const PHASE_FAILED: u8 = 2;
const PHASE_DISPATCHED: u8 = 3;

/// Lifecycle of a single request's outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    /// The handler has not produced an outcome yet.
    Pending,

    /// The handler produced a success response.
    Succeeded,

    /// The handler produced a failure.
    Failed,

    /// The response has been written. Terminal.
    Dispatched,
}

/// Per-request outcome tracker.
///
/// Created by [`track_request`] and shared through request extensions, so
/// work spawned from a handler can report a late failure against the
/// request it belongs to.
#[derive(Debug, Default)]
pub struct DispatchGuard {
    phase: AtomicU8,
}

impl DispatchGuard {
    /// Creates a guard in the `Pending` phase.
    pub fn new() -> Self {
        Self {
            phase: AtomicU8::new(PHASE_PENDING),
        }
    }

    /// The current phase.
    pub fn phase(&self) -> RequestPhase {
        match self.phase.load(Ordering::SeqCst) {
            PHASE_SUCCEEDED => RequestPhase::Succeeded,
            PHASE_FAILED => RequestPhase::Failed,
            PHASE_DISPATCHED => RequestPhase::Dispatched,
            _ => RequestPhase::Pending,
        }
    }

    /// Records the handler outcome: `Pending -> Succeeded | Failed`.
    ///
    /// Returns `false` if the request already left `Pending`.
    pub fn record_outcome(&self, failed: bool) -> bool {
        let next = if failed { PHASE_FAILED } else { PHASE_SUCCEEDED };
        self.phase
            .compare_exchange(PHASE_PENDING, next, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Marks the response as written: `-> Dispatched`.
    ///
    /// Returns `false` (and logs the anomaly) if the request was already
    /// dispatched; the caller must not write a second response.
    pub fn mark_dispatched(&self) -> bool {
        let previous = self.phase.swap(PHASE_DISPATCHED, Ordering::SeqCst);
        if previous == PHASE_DISPATCHED {
            warn!("second dispatch attempt for an already-dispatched request");
            return false;
        }
        true
    }

    /// Whether the response has been written.
    pub fn is_dispatched(&self) -> bool {
        self.phase.load(Ordering::SeqCst) == PHASE_DISPATCHED
    }

    /// Captures a failure from a suspended operation that completed after
    /// its handler returned.
    ///
    /// The failure is classified against the registry and logged; it is
    /// never written to the wire once the request is dispatched.
    pub fn report_late_failure(&self, error: &ApiError) {
        if self.is_dispatched() {
            warn!(
                code = %error.code(),
                status = %error.status(),
                "suspended operation failed after its request was dispatched"
            );
        } else {
            error!(
                code = %error.code(),
                status = %error.status(),
                "suspended operation failed before dispatch"
            );
        }
    }
}

/// Middleware that tracks the request lifecycle.
///
/// Installs a shared [`DispatchGuard`] into request extensions, runs the
/// rest of the stack, records the outcome from the response status, and
/// marks the request dispatched.
pub async fn track_request(mut req: Request, next: Next) -> Response {
    let guard = Arc::new(DispatchGuard::new());
    req.extensions_mut().insert(Arc::clone(&guard));

    let response = next.run(req).await;

    let failed = response.status().is_client_error() || response.status().is_server_error();
    guard.record_outcome(failed);
    guard.mark_dispatched();

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Violation;
    use axum::http::StatusCode;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn known_errors_render_registry_status_and_echo_context() {
        let err = ApiError::duplicate_entity("a@x.com");
        let response = render_known(&err);

        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body = body_json(response).await;
        assert_eq!(body["code"], "DuplicateEntityError");
        assert_eq!(body["message"], "entity already exists");
        assert_eq!(body["context"]["email"], "a@x.com");
    }

    #[tokio::test]
    async fn every_registered_code_renders_its_registry_status() {
        for code in ErrorCode::ALL {
            let err = ApiError::new(code);
            let response = render_known(&err);
            assert_eq!(response.status(), code.http_status());

            let body = body_json(response).await;
            assert_eq!(body["code"], code.as_str());
            assert_eq!(body["message"], code.default_message());
        }
    }

    #[tokio::test]
    async fn context_is_omitted_when_absent() {
        let response = render_known(&ApiError::unauthenticated());
        let body = body_json(response).await;
        assert!(body.get("context").is_none());
    }

    #[tokio::test]
    async fn violations_are_echoed_verbatim() {
        let err = ApiError::validation(vec![Violation {
            field: "title".to_string(),
            constraint: "length".to_string(),
        }]);
        let body = body_json(render_known(&err)).await;
        assert_eq!(body["context"]["violations"][0]["field"], "title");
        assert_eq!(body["context"]["violations"][0]["constraint"], "length");
    }

    #[tokio::test]
    async fn unknown_faults_render_fixed_body_without_internals() {
        let fault = std::io::Error::other("secret connection string");
        let response = render_fault(&fault);

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(!text.contains("secret connection string"));

        let body: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(body["code"], "UnknownError");
        assert_eq!(body["message"], "something went wrong");
    }

    #[tokio::test]
    async fn panic_payload_is_not_echoed() {
        let response = handle_panic(Box::new("kaboom with secrets"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(!text.contains("kaboom"));
    }

    #[tokio::test]
    async fn suspended_failure_renders_exactly_like_a_synchronous_one() {
        async fn delayed() -> Result<(), ApiError> {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            Err(ApiError::new(ErrorCode::AsyncError))
        }

        let awaited = delayed().await.unwrap_err();
        let synchronous = ApiError::new(ErrorCode::AsyncError);

        let awaited_body = body_json(render_known(&awaited)).await;
        let sync_body = body_json(render_known(&synchronous)).await;
        assert_eq!(awaited_body, sync_body);
    }

    #[test]
    fn guard_starts_pending() {
        let guard = DispatchGuard::new();
        assert_eq!(guard.phase(), RequestPhase::Pending);
        assert!(!guard.is_dispatched());
    }

    #[test]
    fn guard_records_outcome_once() {
        let guard = DispatchGuard::new();
        assert!(guard.record_outcome(true));
        assert_eq!(guard.phase(), RequestPhase::Failed);

        // Outcome is settled; a second attempt does not overwrite it.
        assert!(!guard.record_outcome(false));
        assert_eq!(guard.phase(), RequestPhase::Failed);
    }

    #[test]
    fn guard_success_path() {
        let guard = DispatchGuard::new();
        assert!(guard.record_outcome(false));
        assert_eq!(guard.phase(), RequestPhase::Succeeded);
    }

    #[test]
    fn dispatched_is_terminal_and_second_dispatch_is_a_noop() {
        let guard = DispatchGuard::new();
        guard.record_outcome(false);

        assert!(guard.mark_dispatched());
        assert_eq!(guard.phase(), RequestPhase::Dispatched);

        assert!(!guard.mark_dispatched());
        assert_eq!(guard.phase(), RequestPhase::Dispatched);

        // No transition leaves Dispatched.
        assert!(!guard.record_outcome(true));
        assert_eq!(guard.phase(), RequestPhase::Dispatched);
    }

    #[test]
    fn late_failure_after_dispatch_leaves_the_phase_terminal() {
        let guard = DispatchGuard::new();
        guard.record_outcome(false);
        guard.mark_dispatched();

        guard.report_late_failure(&ApiError::new(ErrorCode::AsyncError));
        assert_eq!(guard.phase(), RequestPhase::Dispatched);
    }

    #[test]
    fn late_failure_before_dispatch_is_captured() {
        let guard = DispatchGuard::new();
        guard.report_late_failure(&ApiError::new(ErrorCode::AsyncError));
        assert_eq!(guard.phase(), RequestPhase::Pending);
    }

    #[tokio::test]
    async fn api_error_into_response_goes_through_the_dispatcher() {
        let response = ApiError::maximum_allowed_grade(8).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["code"], "MaximumAllowedGrade");
        assert_eq!(body["context"]["grade"], 8);
    }
}
