//! Administrator API handlers
//!
//! Author: hephaex@gmail.com

use super::{DeleteResponse, StopListResponse, UserPublic};
use crate::auth::Identity;
use crate::error::AppError;
use crate::extract::{JsonBody, QueryParams};
use crate::services::{NewAccount, StopService, UserService};
use crate::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    Extension, Json,
};
use fleet_core::Role;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email_or_phone: String,
    #[serde(default)]
    pub password: String,
    /// `admin` or `driver`
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub user: UserPublic,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DriverListResponse {
    pub drivers: Vec<UserPublic>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct DriverQuery {
    pub driver_id: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceStopsRequest {
    #[serde(default)]
    pub driver_id: String,
    /// Newline-delimited string or array of strings
    #[serde(default)]
    #[schema(value_type = Object)]
    pub addresses: Value,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetPasswordRequest {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub new_password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub user_id: String,
    pub full_name: Option<String>,
    pub email_or_phone: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteUserRequest {
    #[serde(default)]
    pub user_id: String,
}

fn require_user_id(user_id: &str) -> Result<&str, AppError> {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        return Err(AppError::InvalidInput("userId is required".to_string()));
    }
    Ok(user_id)
}

/// Create a user
#[utoipa::path(
    post,
    path = "/admin/create-user",
    tag = "admin",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 409, description = "Identifier already in use", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    JsonBody(request): JsonBody<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    let role: Role = request
        .role
        .parse()
        .map_err(|err: fleet_core::UnknownRole| AppError::InvalidInput(err.to_string()))?;

    let account = NewAccount {
        full_name: request.full_name,
        email_or_phone: request.email_or_phone,
        password: request.password,
        role,
    };
    let user = UserService::new(&state)
        .create(account, &identity.user_id)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(UserResponse { user: user.into() }),
    ))
}

/// List active drivers ordered by name
#[utoipa::path(
    get,
    path = "/admin/drivers",
    tag = "admin",
    responses(
        (status = 200, description = "Driver roster", body = DriverListResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_drivers(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DriverListResponse>, AppError> {
    let drivers = UserService::new(&state).list_drivers().await?;
    Ok(Json(DriverListResponse {
        drivers: drivers.into_iter().map(UserPublic::from).collect(),
    }))
}

/// List one driver's stops
#[utoipa::path(
    get,
    path = "/admin/driver-stops",
    tag = "admin",
    params(DriverQuery),
    responses(
        (status = 200, description = "Stops ordered by sortOrder", body = StopListResponse),
        (status = 400, description = "driverId missing", body = crate::error::ApiError),
        (status = 404, description = "No such driver", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_driver_stops(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    QueryParams(query): QueryParams<DriverQuery>,
) -> Result<Json<StopListResponse>, AppError> {
    let stops = StopService::new(&state)
        .list_for(&identity, query.driver_id.as_deref())
        .await?;
    Ok(Json(stops.into()))
}

/// Replace a driver's stops with freshly geocoded addresses
#[utoipa::path(
    post,
    path = "/admin/driver-stops",
    tag = "admin",
    request_body = ReplaceStopsRequest,
    responses(
        (status = 200, description = "Stops replaced", body = StopListResponse),
        (status = 400, description = "Invalid or too many addresses", body = crate::error::ApiError),
        (status = 404, description = "No such driver", body = crate::error::ApiError),
        (status = 502, description = "Some addresses could not be geocoded; nothing changed", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn replace_driver_stops(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    JsonBody(request): JsonBody<ReplaceStopsRequest>,
) -> Result<Json<StopListResponse>, AppError> {
    let stops = StopService::new(&state)
        .replace(&request.driver_id, &request.addresses, &identity.user_id)
        .await?;
    Ok(Json(stops.into()))
}

/// Set a new password that must be changed at next login
#[utoipa::path(
    post,
    path = "/admin/users/reset-password",
    tag = "admin",
    request_body = SetPasswordRequest,
    responses(
        (status = 200, description = "Password reset", body = UserResponse),
        (status = 404, description = "No such user", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    JsonBody(request): JsonBody<SetPasswordRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let user_id = require_user_id(&request.user_id)?;
    let user = UserService::new(&state)
        .set_password(
            user_id,
            &request.new_password,
            true,
            &identity.user_id,
            "RESET_PASSWORD_FAILED",
        )
        .await?;
    Ok(Json(UserResponse { user: user.into() }))
}

/// Set a new password without forcing a change
#[utoipa::path(
    post,
    path = "/admin/users/update-password",
    tag = "admin",
    request_body = SetPasswordRequest,
    responses(
        (status = 200, description = "Password updated", body = UserResponse),
        (status = 404, description = "No such user", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_password(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    JsonBody(request): JsonBody<SetPasswordRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let user_id = require_user_id(&request.user_id)?;
    let user = UserService::new(&state)
        .set_password(
            user_id,
            &request.new_password,
            false,
            &identity.user_id,
            "UPDATE_PASSWORD_FAILED",
        )
        .await?;
    Ok(Json(UserResponse { user: user.into() }))
}

/// Update another user's name or identifier
#[utoipa::path(
    post,
    path = "/admin/users/update-profile",
    tag = "admin",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = UserResponse),
        (status = 404, description = "No such user", body = crate::error::ApiError),
        (status = 409, description = "Identifier already in use", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    JsonBody(request): JsonBody<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let user_id = require_user_id(&request.user_id)?;
    let user = UserService::new(&state)
        .update_profile(
            user_id,
            request.full_name,
            request.email_or_phone,
            "UPDATE_PROFILE_FAILED",
        )
        .await?;
    Ok(Json(UserResponse { user: user.into() }))
}

/// Delete a user, anonymizing when the row cannot be removed
#[utoipa::path(
    delete,
    path = "/admin/users",
    tag = "admin",
    request_body = DeleteUserRequest,
    responses(
        (status = 200, description = "User deleted or anonymized", body = DeleteResponse),
        (status = 400, description = "Missing userId or self-deletion", body = crate::error::ApiError),
        (status = 404, description = "No such user", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    JsonBody(request): JsonBody<DeleteUserRequest>,
) -> Result<Json<DeleteResponse>, AppError> {
    let user_id = require_user_id(&request.user_id)?;
    if user_id == identity.user_id {
        return Err(AppError::InvalidInput(
            "Use DELETE /account to delete your own account".to_string(),
        ));
    }

    let outcome = UserService::new(&state)
        .delete_user(user_id, &identity.user_id, "DELETE_USER_FAILED")
        .await?;
    Ok(Json(DeleteResponse {
        success: true,
        outcome: outcome.as_str().to_string(),
    }))
}
