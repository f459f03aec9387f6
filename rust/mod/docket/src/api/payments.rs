use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};

use docket_core::ServiceError;

use crate::api::{AppState, Caller};
use crate::model::Submission;
use crate::service::{CreateOrder, OrderCreated, VerifyPayment};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/payments/orders", post(create_order))
        .route("/payments/verify", post(verify_payment))
}

async fn create_order(
    State(svc): State<AppState>,
    Caller(actor): Caller,
    Json(input): Json<CreateOrder>,
) -> Result<(StatusCode, Json<OrderCreated>), ServiceError> {
    let order = svc.create_order(&actor, input).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn verify_payment(
    State(svc): State<AppState>,
    Caller(actor): Caller,
    Json(input): Json<VerifyPayment>,
) -> Result<Json<Submission>, ServiceError> {
    Ok(Json(svc.verify_payment(&actor, input)?))
}
