mod caller;
mod forms;
mod payments;
mod services;
mod setup;
mod submissions;
mod users;

use std::sync::Arc;

use axum::Router;

use crate::service::DocketService;

pub use caller::Caller;

/// Shared application state.
pub type AppState = Arc<DocketService>;

/// Build the docket API router.
///
/// Routes are relative; the server nests them under `/api/admin` and puts
/// the authenticated [`Actor`](crate::model::Actor) into request extensions.
pub fn build_router(svc: Arc<DocketService>) -> Router {
    Router::new()
        .merge(services::routes())
        .merge(forms::routes())
        .merge(setup::routes())
        .merge(submissions::routes())
        .merge(payments::routes())
        .merge(users::routes())
        .with_state(svc)
}
