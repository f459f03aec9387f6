use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use docket_core::ServiceError;

use crate::model::Actor;

/// The authenticated caller, placed in request extensions by the server's
/// token middleware.
#[derive(Debug, Clone)]
pub struct Caller(pub Actor);

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Actor>()
            .cloned()
            .map(Caller)
            .ok_or_else(|| ServiceError::Unauthorized("authentication required".into()))
    }
}
