use std::sync::atomic::{AtomicBool, Ordering};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

// ── Error codes ─────────────────────────────────────────────────────
//
// Stable, machine-readable identifiers. Clients match on these,
// never on the human-readable message string.

/// Stable error code constants.
///
/// Clients should match on `code` from
/// `{"success": false, "code": "NOT_FOUND", "message": "..."}`.
pub mod error_code {
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const ALREADY_EXISTS: &str = "ALREADY_EXISTS";
    pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";
    pub const UNAUTHENTICATED: &str = "UNAUTHENTICATED";
    pub const PERMISSION_DENIED: &str = "PERMISSION_DENIED";
    pub const PAYMENT_VERIFICATION_FAILED: &str = "PAYMENT_VERIFICATION_FAILED";
    pub const GATEWAY_ERROR: &str = "GATEWAY_ERROR";
    pub const CONFIGURATION_ERROR: &str = "CONFIGURATION_ERROR";
    pub const INTERNAL: &str = "INTERNAL";
    pub const STORAGE_ERROR: &str = "STORAGE_ERROR";
}

/// Message sent in place of server-side failure details unless
/// [`expose_internal_details`] has been switched on.
pub const GENERIC_SERVER_ERROR: &str = "internal server error";

static EXPOSE_DETAILS: AtomicBool = AtomicBool::new(false);

/// Toggle whether 5xx responses carry the underlying error text.
///
/// Off by default. `docketd` turns it on when running in development mode.
pub fn expose_internal_details(on: bool) {
    EXPOSE_DETAILS.store(on, Ordering::Relaxed);
}

fn details_exposed() -> bool {
    EXPOSE_DETAILS.load(Ordering::Relaxed)
}

// ── ServiceError ────────────────────────────────────────────────────

/// Unified service error type used across all modules.
///
/// Each variant maps to a stable error code (see [`error_code`]) and an
/// HTTP status code. The JSON response always includes both:
///
/// ```json
/// {"success": false, "code": "NOT_FOUND", "message": "submission 'abc' not found"}
/// ```
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Resource does not exist. HTTP 404.
    #[error("{0}")]
    NotFound(String),

    /// Duplicate key, or a write lost a version race. HTTP 409.
    #[error("{0}")]
    Conflict(String),

    /// Input data is invalid. HTTP 400.
    #[error("{0}")]
    Validation(String),

    /// Missing or invalid authentication credentials. HTTP 401.
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated but lacks required permission. HTTP 403.
    #[error("{0}")]
    PermissionDenied(String),

    /// Gateway callback signature did not match. HTTP 400.
    #[error("{0}")]
    PaymentVerification(String),

    /// Payment gateway call failed or answered with an unexpected shape. HTTP 502.
    #[error("{0}")]
    Gateway(String),

    /// Admin-managed configuration is missing or inconsistent. HTTP 422.
    #[error("{0}")]
    Configuration(String),

    /// Storage backend failure. HTTP 500.
    #[error("{0}")]
    Storage(String),

    /// Unexpected internal error. HTTP 500.
    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    /// Stable, machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            ServiceError::NotFound(_) => error_code::NOT_FOUND,
            ServiceError::Conflict(_) => error_code::ALREADY_EXISTS,
            ServiceError::Validation(_) => error_code::VALIDATION_FAILED,
            ServiceError::Unauthorized(_) => error_code::UNAUTHENTICATED,
            ServiceError::PermissionDenied(_) => error_code::PERMISSION_DENIED,
            ServiceError::PaymentVerification(_) => error_code::PAYMENT_VERIFICATION_FAILED,
            ServiceError::Gateway(_) => error_code::GATEWAY_ERROR,
            ServiceError::Configuration(_) => error_code::CONFIGURATION_ERROR,
            ServiceError::Storage(_) => error_code::STORAGE_ERROR,
            ServiceError::Internal(_) => error_code::INTERNAL,
        }
    }

    /// HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServiceError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            ServiceError::PaymentVerification(_) => StatusCode::BAD_REQUEST,
            ServiceError::Gateway(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Configuration(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// JSON body sent to clients.
    ///
    /// Server-side failures (5xx) are reduced to a generic message unless
    /// detail exposure is on, in which case the raw text travels in `error`.
    pub fn to_body(&self) -> serde_json::Value {
        let status = self.status_code();
        if status.is_server_error() && status != StatusCode::BAD_GATEWAY {
            if details_exposed() {
                return serde_json::json!({
                    "success": false,
                    "code": self.error_code(),
                    "message": GENERIC_SERVER_ERROR,
                    "error": self.to_string(),
                });
            }
            return serde_json::json!({
                "success": false,
                "code": self.error_code(),
                "message": GENERIC_SERVER_ERROR,
            });
        }
        serde_json::json!({
            "success": false,
            "code": self.error_code(),
            "message": self.to_string(),
        })
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.error_code(), "{}", self);
        }
        (status, axum::Json(self.to_body())).into_response()
    }
}
