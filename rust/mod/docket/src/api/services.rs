use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use docket_core::{ListParams, ListResult, ServiceError};

use crate::api::{AppState, Caller};
use crate::model::{CreateService, FormData, FormField, Service, Submission};
use crate::schema::FormSchema;
use crate::service::{SubmissionQuery, SubmissionView, UploadedFile};

/// Multipart bodies may carry several scanned documents.
const UPLOAD_BODY_LIMIT: usize = 10 * 1024 * 1024;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/services", get(list_services).post(create_service))
        .route("/services/{id}", get(get_service))
        .route("/services/{id}/form", get(form))
        .route("/services/{id}/fields", get(fields))
        .route("/services/{id}/status", get(status))
        .route("/services/{id}/amount", get(amount))
        .route("/services/{id}/certificate-template", get(certificate_template))
        .route("/services/{id}/submissions", get(list_submissions).post(submit))
        .route(
            "/services/{id}/submissions/@upload",
            post(submit_upload).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
}

async fn list_services(
    State(svc): State<AppState>,
    _caller: Caller,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResult<Service>>, ServiceError> {
    Ok(Json(svc.list_services(&params)?))
}

async fn create_service(
    State(svc): State<AppState>,
    Caller(actor): Caller,
    Json(input): Json<CreateService>,
) -> Result<(StatusCode, Json<Service>), ServiceError> {
    let service = svc.create_service(&actor, input)?;
    Ok((StatusCode::CREATED, Json(service)))
}

async fn get_service(
    State(svc): State<AppState>,
    _caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<Service>, ServiceError> {
    Ok(Json(svc.get_service(&id)?))
}

async fn form(
    State(svc): State<AppState>,
    _caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<FormSchema>, ServiceError> {
    Ok(Json(svc.form_schema(&id)?))
}

async fn fields(
    State(svc): State<AppState>,
    _caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    svc.get_service(&id)?;
    let fields: Vec<FormField> = svc.fields_for(&id)?;
    Ok(Json(json!({ "items": fields, "total": fields.len() })))
}

async fn status(
    State(svc): State<AppState>,
    _caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let status = svc.availability(&id)?;
    Ok(Json(json!({ "serviceId": id, "status": status })))
}

async fn amount(
    State(svc): State<AppState>,
    _caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let amount = svc.service_amount(&id)?;
    Ok(Json(json!({
        "serviceId": id,
        "amount": amount,
        "currency": svc.config().currency,
    })))
}

async fn certificate_template(
    State(svc): State<AppState>,
    _caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let template = svc.certificate_template(&id)?;
    Ok(Json(json!({ "serviceId": id, "certificateData": template })))
}

async fn list_submissions(
    State(svc): State<AppState>,
    Caller(actor): Caller,
    Path(id): Path<String>,
    Query(mut query): Query<SubmissionQuery>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResult<SubmissionView>>, ServiceError> {
    svc.get_service(&id)?;
    query.service_id = Some(id);
    Ok(Json(svc.list_submissions(&actor, &query, &params)?))
}

async fn submit(
    State(svc): State<AppState>,
    Caller(actor): Caller,
    Path(id): Path<String>,
    Json(form_data): Json<FormData>,
) -> Result<(StatusCode, Json<Submission>), ServiceError> {
    let sub = svc.submit(&actor, &id, form_data)?;
    Ok((StatusCode::CREATED, Json(sub)))
}

/// Multipart submission. File parts are stored and referenced by URL; text
/// parts become string values. A `formData` text part holding a JSON object
/// is merged in as typed values.
async fn submit_upload(
    State(svc): State<AppState>,
    Caller(actor): Caller,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Submission>), ServiceError> {
    let mut form_data = FormData::new();
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::Validation(format!("malformed multipart body: {e}")))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if let Some(filename) = field.file_name().map(str::to_string) {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ServiceError::Validation(format!("failed to read {name}: {e}")))?;
            if bytes.is_empty() {
                continue;
            }
            files.push(UploadedFile {
                field: name,
                filename,
                bytes: bytes.to_vec(),
            });
            continue;
        }

        let text = field
            .text()
            .await
            .map_err(|e| ServiceError::Validation(format!("failed to read {name}: {e}")))?;
        if name == "formData" {
            let parsed: FormData = serde_json::from_str(&text)
                .map_err(|e| ServiceError::Validation(format!("formData is not a JSON object: {e}")))?;
            form_data.extend(parsed);
        } else {
            form_data.insert(name, serde_json::Value::String(text));
        }
    }

    let sub = svc.submit_with_files(&actor, &id, form_data, files)?;
    Ok((StatusCode::CREATED, Json(sub)))
}
