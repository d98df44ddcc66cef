//! Authentication gate for protected routes.
//!
//! The gate is the one access-control point in the server. It runs as
//! route-layer middleware, strictly before any protected handler:
//!
//! 1. extract the bearer token from the `Authorization` header,
//! 2. verify it against the process-wide [`TokenAuthority`],
//! 3. on success, attach the verified [`Claims`] to the request and
//!    continue; on any failure, raise `Unauthenticated` — the handler
//!    never runs.
//!
//! A missing token, a malformed header, a tampered token and an expired
//! token are externally indistinguishable: all produce the same
//! `Unauthenticated` response, so the gate leaks nothing about why
//! authentication failed. Handlers read identity only from the claims the
//! gate attached; client-supplied identity fields are never trusted.
//!
//! The gate performs no role or permission checks: it answers "does this
//! request hold a currently valid token", nothing more.

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;

use crate::error::ApiError;
use crate::routes::AppState;

/// Scheme prefix of a bearer `Authorization` header.
const BEARER_PREFIX: &str = "Bearer ";

/// Middleware enforcing "must present a currently valid token".
///
/// On success the verified [`crate::token::Claims`] are inserted into the
/// request extensions for the downstream handler.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer(req.headers()).ok_or_else(|| {
        debug!("missing or malformed Authorization header");
        ApiError::unauthenticated()
    })?;

    let claims = state.tokens.verify(token).map_err(|err| {
        // The reason stays in the logs; the response never distinguishes.
        debug!(error = %err, "token verification failed");
        ApiError::unauthenticated()
    })?;

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// Pulls the token out of a `Bearer <token>` authorization header.
///
/// Returns `None` for a missing header, a non-bearer scheme, or an empty
/// token.
fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix(BEARER_PREFIX)?.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn extracts_a_bearer_token() {
        let headers = headers_with("Bearer abc.def.ghi");
        assert_eq!(extract_bearer(&headers), Some("abc.def.ghi"));
    }

    #[test]
    fn missing_header_yields_none() {
        assert_eq!(extract_bearer(&HeaderMap::new()), None);
    }

    #[test]
    fn non_bearer_scheme_yields_none() {
        let headers = headers_with("Basic dXNlcjpwYXNz");
        assert_eq!(extract_bearer(&headers), None);
    }

    #[test]
    fn empty_token_yields_none() {
        let headers = headers_with("Bearer ");
        assert_eq!(extract_bearer(&headers), None);

        let headers = headers_with("Bearer    ");
        assert_eq!(extract_bearer(&headers), None);
    }

    #[test]
    fn scheme_is_case_sensitive() {
        let headers = headers_with("bearer abc.def.ghi");
        assert_eq!(extract_bearer(&headers), None);
    }

    #[test]
    fn surrounding_whitespace_is_trimmed() {
        let headers = headers_with("Bearer   abc.def.ghi  ");
        assert_eq!(extract_bearer(&headers), Some("abc.def.ghi"));
    }
}
