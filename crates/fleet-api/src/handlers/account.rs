//! Self-service account handlers

use super::{DeleteResponse, TokenResponse, UserPublic};
use crate::auth::{AuthService, Identity};
use crate::error::AppError;
use crate::extract::JsonBody;
use crate::services::UserService;
use crate::state::AppState;
use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyPasswordRequest {
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyPasswordResponse {
    pub valid: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProfileResponse {
    pub user: UserPublic,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PatchProfileRequest {
    pub full_name: Option<String>,
    pub email_or_phone: Option<String>,
}

/// Re-check the caller's password before a sensitive action
#[utoipa::path(
    post,
    path = "/account/verify-password",
    tag = "account",
    request_body = VerifyPasswordRequest,
    responses(
        (status = 200, description = "Password matches", body = VerifyPasswordResponse),
        (status = 401, description = "Password does not match", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn verify_password(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    JsonBody(request): JsonBody<VerifyPasswordRequest>,
) -> Result<Json<VerifyPasswordResponse>, AppError> {
    if request.password.is_empty() {
        return Err(AppError::InvalidInput("Password is required".to_string()));
    }
    AuthService::new(&state)
        .verify_current_password(&identity.user_id, &request.password, "VERIFY_PASSWORD_FAILED")
        .await?;
    Ok(Json(VerifyPasswordResponse { valid: true }))
}

/// Erase the caller's personal data
#[utoipa::path(
    delete,
    path = "/account/data",
    tag = "account",
    responses(
        (status = 200, description = "Personal data erased", body = ProfileResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_data(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<ProfileResponse>, AppError> {
    let user = UserService::new(&state)
        .erase_personal_data(&identity.user_id)
        .await?;
    Ok(Json(ProfileResponse { user: user.into() }))
}

/// Delete the caller's account
#[utoipa::path(
    delete,
    path = "/account",
    tag = "account",
    responses(
        (status = 200, description = "Account deleted or anonymized", body = DeleteResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_account(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<DeleteResponse>, AppError> {
    let outcome = UserService::new(&state)
        .delete_user(&identity.user_id, &identity.user_id, "DELETE_ACCOUNT_FAILED")
        .await?;
    Ok(Json(DeleteResponse {
        success: true,
        outcome: outcome.as_str().to_string(),
    }))
}

/// Read the caller's stored profile
#[utoipa::path(
    get,
    path = "/account/profile",
    tag = "account",
    responses(
        (status = 200, description = "Current profile", body = ProfileResponse),
        (status = 404, description = "User no longer exists", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<ProfileResponse>, AppError> {
    let user = UserService::new(&state).get(&identity.user_id).await?;
    Ok(Json(ProfileResponse { user: user.into() }))
}

/// Update the caller's profile and re-issue the token
#[utoipa::path(
    patch,
    path = "/account/profile",
    tag = "account",
    request_body = PatchProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = TokenResponse),
        (status = 409, description = "Identifier already in use", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    JsonBody(request): JsonBody<PatchProfileRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let user = UserService::new(&state)
        .update_profile(
            &identity.user_id,
            request.full_name,
            request.email_or_phone,
            "UPDATE_PROFILE_FAILED",
        )
        .await?;
    let token = AuthService::new(&state).issue_token(&user)?;
    Ok(Json(TokenResponse::new(token, user)))
}
