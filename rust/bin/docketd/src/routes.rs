//! Route registration: module routes, account endpoints and system endpoints.

use std::path::Path;
use std::sync::Arc;

use axum::response::IntoResponse;
use axum::routing::get;
use axum::{middleware, Router};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use docket::service::DocketService;

use crate::{auth_middleware, login};

/// Build the complete router.
///
/// Module routers arrive with their state applied and are nested under
/// `/api/{name}`. Stored uploads are served read-only from `/uploads`.
pub fn build_router(
    svc: Arc<DocketService>,
    module_routes: Vec<(&str, Router)>,
    upload_dir: &Path,
) -> Router {
    let mut app: Router = Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
        .merge(login::routes().with_state(svc.clone()));

    for (name, router) in module_routes {
        app = app.nest(&format!("/api/{name}"), router);
    }

    app.nest_service("/uploads", ServeDir::new(upload_dir))
        .layer(middleware::from_fn_with_state(
            svc,
            auth_middleware::auth_middleware,
        ))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
}

async fn health() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "ok",
    }))
}

async fn version() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "name": "docketd",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
