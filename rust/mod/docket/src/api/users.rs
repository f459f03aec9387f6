use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

use docket_core::{ListParams, ListResult, ServiceError};

use crate::api::{AppState, Caller};
use crate::model::{CreateUser, UserProfile};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/me", get(me))
}

async fn list_users(
    State(svc): State<AppState>,
    Caller(actor): Caller,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResult<UserProfile>>, ServiceError> {
    Ok(Json(svc.list_users(&actor, &params)?))
}

async fn create_user(
    State(svc): State<AppState>,
    Caller(actor): Caller,
    Json(input): Json<CreateUser>,
) -> Result<(StatusCode, Json<UserProfile>), ServiceError> {
    let user = svc.create_user(&actor, input)?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn me(
    State(svc): State<AppState>,
    Caller(actor): Caller,
) -> Result<Json<UserProfile>, ServiceError> {
    Ok(Json(svc.profile(&actor.id)?))
}
