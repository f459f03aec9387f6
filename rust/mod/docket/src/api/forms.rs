use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use docket_core::{ListParams, ListResult, ServiceError};

use crate::api::{AppState, Caller};
use crate::model::{
    CreateFormField, CreateOptionList, CreateOptionListEntry, EntryCreated, FormField, OptionList,
    OptionListEntry,
};
use crate::service::forms::{field_types, FieldTypeInfo};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FieldFilter {
    #[serde(default)]
    service_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EntryFilter {
    #[serde(default)]
    list_id: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/field-types", get(list_field_types))
        .route("/form-fields", get(list_form_fields).post(create_form_field))
        .route("/option-lists", get(list_option_lists).post(create_option_list))
        .route("/option-lists/{id}", get(get_option_list))
        .route("/option-lists/{id}/@resync", post(resync_option_list))
        .route(
            "/option-list-entries",
            get(list_option_list_entries).post(create_option_list_entry),
        )
}

async fn list_field_types(_caller: Caller) -> Json<Vec<FieldTypeInfo>> {
    Json(field_types())
}

async fn list_form_fields(
    State(svc): State<AppState>,
    _caller: Caller,
    Query(filter): Query<FieldFilter>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResult<FormField>>, ServiceError> {
    Ok(Json(svc.list_form_fields(filter.service_id.as_deref(), &params)?))
}

async fn create_form_field(
    State(svc): State<AppState>,
    Caller(actor): Caller,
    Json(input): Json<CreateFormField>,
) -> Result<(StatusCode, Json<FormField>), ServiceError> {
    let field = svc.create_form_field(&actor, input)?;
    Ok((StatusCode::CREATED, Json(field)))
}

async fn list_option_lists(
    State(svc): State<AppState>,
    _caller: Caller,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResult<OptionList>>, ServiceError> {
    Ok(Json(svc.list_option_lists(&params)?))
}

async fn create_option_list(
    State(svc): State<AppState>,
    Caller(actor): Caller,
    Json(input): Json<CreateOptionList>,
) -> Result<(StatusCode, Json<OptionList>), ServiceError> {
    let list = svc.create_option_list(&actor, input)?;
    Ok((StatusCode::CREATED, Json(list)))
}

async fn get_option_list(
    State(svc): State<AppState>,
    _caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<OptionList>, ServiceError> {
    Ok(Json(svc.get_option_list(&id)?))
}

async fn resync_option_list(
    State(svc): State<AppState>,
    Caller(actor): Caller,
    Path(id): Path<String>,
) -> Result<Json<OptionList>, ServiceError> {
    Ok(Json(svc.resync_option_list(&actor, &id)?))
}

async fn list_option_list_entries(
    State(svc): State<AppState>,
    _caller: Caller,
    Query(filter): Query<EntryFilter>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResult<OptionListEntry>>, ServiceError> {
    Ok(Json(svc.list_option_list_entries(filter.list_id.as_deref(), &params)?))
}

async fn create_option_list_entry(
    State(svc): State<AppState>,
    Caller(actor): Caller,
    Json(input): Json<CreateOptionListEntry>,
) -> Result<(StatusCode, Json<EntryCreated>), ServiceError> {
    let created = svc.create_option_list_entry(&actor, input)?;
    Ok((StatusCode::CREATED, Json(created)))
}
