use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};

use docket_core::{ListParams, ListResult, ServiceError};

use crate::api::{AppState, Caller};
use crate::model::Submission;
use crate::service::{ManualPayment, StatusUpdate, SubmissionQuery, SubmissionView};
use crate::template::Certificate;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/submissions", get(list_submissions))
        .route("/submissions/{id}", get(get_submission))
        .route(
            "/submissions/{id}/status",
            axum::routing::put(update_status).patch(update_status),
        )
        .route("/submissions/{id}/@payment", post(set_payment_status))
        .route("/submissions/{id}/@certificate", get(certificate))
}

async fn list_submissions(
    State(svc): State<AppState>,
    Caller(actor): Caller,
    Query(query): Query<SubmissionQuery>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResult<SubmissionView>>, ServiceError> {
    Ok(Json(svc.list_submissions(&actor, &query, &params)?))
}

async fn get_submission(
    State(svc): State<AppState>,
    Caller(actor): Caller,
    Path(id): Path<String>,
) -> Result<Json<Submission>, ServiceError> {
    Ok(Json(svc.get_submission(&actor, &id)?))
}

async fn update_status(
    State(svc): State<AppState>,
    Caller(actor): Caller,
    Path(id): Path<String>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<Submission>, ServiceError> {
    Ok(Json(svc.update_status(&actor, &id, update)?))
}

async fn set_payment_status(
    State(svc): State<AppState>,
    Caller(actor): Caller,
    Path(id): Path<String>,
    Json(input): Json<ManualPayment>,
) -> Result<Json<Submission>, ServiceError> {
    Ok(Json(svc.set_payment_status(&actor, &id, input)?))
}

async fn certificate(
    State(svc): State<AppState>,
    Caller(actor): Caller,
    Path(id): Path<String>,
) -> Result<Json<Certificate>, ServiceError> {
    Ok(Json(svc.certificate(&actor, &id)?))
}
