//! Account endpoints under `/api/auth`: signup, login, refresh, logout, check.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};

use docket::model::{Claims, CreateUser, TokenPair, UserProfile};
use docket::service::DocketService;
use docket_core::ServiceError;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    #[serde(flatten)]
    pub tokens: TokenPair,
    pub user: UserProfile,
}

pub fn routes() -> Router<Arc<DocketService>> {
    Router::new()
        .route("/api/auth/signup", post(signup))
        .route("/api/auth/login", post(login))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/check", get(check))
}

async fn signup(
    State(svc): State<Arc<DocketService>>,
    Json(input): Json<CreateUser>,
) -> Result<(StatusCode, Json<UserProfile>), ServiceError> {
    let user = svc.signup(input)?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn login(
    State(svc): State<Arc<DocketService>>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ServiceError> {
    let (tokens, user) = svc.login(&body.email, &body.password)?;
    tracing::info!(user = %user.id, role = %user.role, "login");
    Ok(Json(LoginResponse { tokens, user }))
}

async fn refresh(
    State(svc): State<Arc<DocketService>>,
    Json(body): Json<RefreshRequest>,
) -> Result<Json<TokenPair>, ServiceError> {
    Ok(Json(svc.refresh_tokens(&body.refresh_token)?))
}

async fn logout(
    State(svc): State<Arc<DocketService>>,
    Extension(claims): Extension<Claims>,
) -> Result<StatusCode, ServiceError> {
    svc.revoke_session(&claims.sid)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn check(
    State(svc): State<Arc<DocketService>>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<UserProfile>, ServiceError> {
    Ok(Json(svc.profile(&claims.sub)?))
}
