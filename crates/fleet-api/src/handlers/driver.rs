//! Driver stop handlers

use super::{admin::DriverQuery, StopListResponse, StopView};
use crate::auth::Identity;
use crate::error::AppError;
use crate::extract::{PathParams, QueryParams};
use crate::services::{StopAction, StopService};
use crate::state::AppState;
use axum::{
    extract::State,
    Extension, Json,
};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct StopResponse {
    pub stop: StopView,
}

/// List stops for the caller, or for `driverId` when called by an admin
#[utoipa::path(
    get,
    path = "/driver/stops",
    tag = "driver",
    params(DriverQuery),
    responses(
        (status = 200, description = "Stops ordered by sortOrder", body = StopListResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_stops(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    QueryParams(query): QueryParams<DriverQuery>,
) -> Result<Json<StopListResponse>, AppError> {
    let stops = StopService::new(&state)
        .list_for(&identity, query.driver_id.as_deref())
        .await?;
    Ok(Json(stops.into()))
}

/// Mark a stop complete, or undo that
#[utoipa::path(
    post,
    path = "/driver/stops/{id}/{action}",
    tag = "driver",
    params(
        ("id" = String, Path, description = "Stop id"),
        ("action" = String, Path, description = "`complete` or `undo`"),
    ),
    responses(
        (status = 200, description = "Updated stop", body = StopResponse),
        (status = 404, description = "Unknown action, or stop missing or out of scope", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_stop_status(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    PathParams((stop_id, action)): PathParams<(String, String)>,
) -> Result<Json<StopResponse>, AppError> {
    let action = StopAction::parse(&action).ok_or(AppError::NotFound)?;
    let stop = StopService::new(&state)
        .update_status(&identity, &stop_id, action)
        .await?;
    Ok(Json(StopResponse { stop: stop.into() }))
}
