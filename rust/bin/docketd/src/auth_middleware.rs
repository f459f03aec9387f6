//! JWT authentication middleware.
//!
//! Extracts the access token from `Authorization: Bearer <token>`, verifies
//! it against the session table, and provides `Claims` and `Actor` to
//! downstream handlers.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use docket::model::{Actor, TokenKind};
use docket::service::DocketService;
use docket_core::ServiceError;

/// Paths reachable without a token.
const PUBLIC_PATHS: &[&str] = &[
    "/health",
    "/version",
    "/api/auth/signup",
    "/api/auth/login",
    "/api/auth/refresh",
];

pub async fn auth_middleware(
    State(svc): State<Arc<DocketService>>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path();
    if is_public_path(path) {
        return next.run(request).await;
    }

    let Some(token) = extract_bearer(request.headers()) else {
        return ServiceError::Unauthorized("missing authorization token".into()).into_response();
    };

    match svc.verify_token(token, TokenKind::Access) {
        Ok(claims) => {
            request.extensions_mut().insert(Actor::from(&claims));
            request.extensions_mut().insert(claims);
            next.run(request).await
        }
        Err(e) => {
            tracing::debug!(path = %request.uri().path(), error = %e, "rejected token");
            e.into_response()
        }
    }
}

fn extract_bearer(headers: &axum::http::HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn is_public_path(path: &str) -> bool {
    PUBLIC_PATHS.contains(&path) || path.starts_with("/uploads/")
}
