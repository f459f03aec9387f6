use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use docket_core::{ListParams, ListResult, ServiceError};

use crate::api::{AppState, Caller};
use crate::model::{
    AuthorizationStep, CreateAuthorizationStep, CreateServiceConfig, CreateSubzone,
    FormAvailability, ServiceConfig, SetAvailability, Subzone,
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetupFilter {
    #[serde(default)]
    service_id: Option<String>,
    #[serde(default)]
    zone_id: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/service-configs",
            get(list_service_configs).post(create_service_config),
        )
        .route("/service-configs/{id}", axum::routing::patch(update_service_config))
        .route(
            "/form-availability",
            get(list_availability).post(set_availability),
        )
        .route(
            "/authorization-steps",
            get(list_authorization_steps).post(create_authorization_step),
        )
        .route("/subzones", get(list_subzones).post(create_subzone))
}

async fn list_service_configs(
    State(svc): State<AppState>,
    _caller: Caller,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResult<ServiceConfig>>, ServiceError> {
    Ok(Json(svc.list_service_configs(&params)?))
}

async fn create_service_config(
    State(svc): State<AppState>,
    Caller(actor): Caller,
    Json(input): Json<CreateServiceConfig>,
) -> Result<(StatusCode, Json<ServiceConfig>), ServiceError> {
    let config = svc.create_service_config(&actor, input)?;
    Ok((StatusCode::CREATED, Json(config)))
}

async fn update_service_config(
    State(svc): State<AppState>,
    Caller(actor): Caller,
    Path(id): Path<String>,
    Json(patch): Json<serde_json::Value>,
) -> Result<Json<ServiceConfig>, ServiceError> {
    Ok(Json(svc.update_service_config(&actor, &id, patch)?))
}

async fn list_availability(
    State(svc): State<AppState>,
    _caller: Caller,
    Query(filter): Query<SetupFilter>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResult<FormAvailability>>, ServiceError> {
    Ok(Json(svc.list_availability(filter.service_id.as_deref(), &params)?))
}

async fn set_availability(
    State(svc): State<AppState>,
    Caller(actor): Caller,
    Json(input): Json<SetAvailability>,
) -> Result<(StatusCode, Json<FormAvailability>), ServiceError> {
    let record = svc.set_availability(&actor, input)?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn list_authorization_steps(
    State(svc): State<AppState>,
    _caller: Caller,
    Query(filter): Query<SetupFilter>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResult<AuthorizationStep>>, ServiceError> {
    Ok(Json(
        svc.list_authorization_steps(filter.service_id.as_deref(), &params)?,
    ))
}

async fn create_authorization_step(
    State(svc): State<AppState>,
    Caller(actor): Caller,
    Json(input): Json<CreateAuthorizationStep>,
) -> Result<(StatusCode, Json<AuthorizationStep>), ServiceError> {
    let step = svc.create_authorization_step(&actor, input)?;
    Ok((StatusCode::CREATED, Json(step)))
}

async fn list_subzones(
    State(svc): State<AppState>,
    _caller: Caller,
    Query(filter): Query<SetupFilter>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResult<Subzone>>, ServiceError> {
    Ok(Json(svc.list_subzones(filter.zone_id.as_deref(), &params)?))
}

async fn create_subzone(
    State(svc): State<AppState>,
    Caller(actor): Caller,
    Json(input): Json<CreateSubzone>,
) -> Result<(StatusCode, Json<Subzone>), ServiceError> {
    let subzone = svc.create_subzone(&actor, input)?;
    Ok((StatusCode::CREATED, Json(subzone)))
}
