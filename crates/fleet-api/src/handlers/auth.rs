//! Authentication API handlers
//!
//! Author: hephaex@gmail.com

use super::TokenResponse;
use crate::audit::ClientInfo;
use crate::auth::{AuthService, Identity};
use crate::error::AppError;
use crate::extract::JsonBody;
use crate::state::AppState;
use axum::{extract::State, http::HeaderMap, Extension, Json};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(default, alias = "email", alias = "identifier")]
    pub email_or_phone: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
}

/// Login with email/phone and password
///
/// The reserved bootstrap identifier provisions the default administrator
/// on first use.
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = TokenResponse),
        (status = 400, description = "Missing identifier or password", body = crate::error::ApiError),
        (status = 401, description = "Invalid credentials", body = crate::error::ApiError),
        (status = 403, description = "Account inactive", body = crate::error::ApiError),
    )
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    JsonBody(request): JsonBody<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let client = ClientInfo::from_headers(&headers);
    let (token, user) = AuthService::new(&state)
        .login(&request.email_or_phone, &request.password, &client)
        .await?;

    Ok(Json(TokenResponse::new(token, user)))
}

/// Change the caller's password
///
/// Returns a new token with the forced-change flag cleared.
#[utoipa::path(
    post,
    path = "/auth/change-password",
    tag = "auth",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = TokenResponse),
        (status = 400, description = "Password too short", body = crate::error::ApiError),
        (status = 401, description = "Current password is wrong", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    JsonBody(request): JsonBody<ChangePasswordRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let (token, user) = AuthService::new(&state)
        .change_password(&identity, &request.current_password, &request.new_password)
        .await?;

    Ok(Json(TokenResponse::new(token, user)))
}
