//! Ad-hoc geocoding handler

use crate::error::AppError;
use crate::extract::JsonBody;
use crate::services::geocode_failure_details;
use crate::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use fleet_geocode::{enforce_limit, normalize_addresses, GeocodeFailure, GeocodeOutcome, Pin};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct GeocodeRequest {
    /// Newline-delimited string or array of strings
    #[serde(default)]
    #[schema(value_type = Object)]
    pub addresses: Value,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PinView {
    pub address: String,
    pub lat: f64,
    pub lng: f64,
}

impl From<Pin> for PinView {
    fn from(pin: Pin) -> Self {
        Self {
            address: pin.address,
            lat: pin.lat,
            lng: pin.lng,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FailureView {
    pub address: String,
    pub message: String,
}

impl From<GeocodeFailure> for FailureView {
    fn from(failure: GeocodeFailure) -> Self {
        Self {
            address: failure.address,
            message: failure.message,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GeocodeResponse {
    pub pins: Vec<PinView>,
    pub failures: Vec<FailureView>,
}

/// Geocode a list of addresses
///
/// Answers 200 when every address resolved and 207 when only some did.
#[utoipa::path(
    post,
    path = "/geocode",
    tag = "geocode",
    request_body = GeocodeRequest,
    responses(
        (status = 200, description = "All addresses resolved", body = GeocodeResponse),
        (status = 207, description = "Some addresses resolved", body = GeocodeResponse),
        (status = 400, description = "Invalid or too many addresses", body = crate::error::ApiError),
        (status = 500, description = "Geocoder not configured", body = crate::error::ApiError),
        (status = 502, description = "Geocoder failed", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn geocode(
    State(state): State<Arc<AppState>>,
    JsonBody(request): JsonBody<GeocodeRequest>,
) -> Result<Response, AppError> {
    let addresses = normalize_addresses(&request.addresses)?;
    enforce_limit(&addresses, state.config.geocoding.max_addresses)?;

    let report = state.geocoder()?.geocode(&addresses).await?;
    let status = match report.outcome() {
        GeocodeOutcome::Complete => StatusCode::OK,
        GeocodeOutcome::Partial => StatusCode::MULTI_STATUS,
        GeocodeOutcome::Failed => {
            return Err(AppError::geocode(
                "No address could be geocoded",
                Some(geocode_failure_details(&report.failures)),
            ));
        }
    };

    let body = GeocodeResponse {
        pins: report.pins.into_iter().map(PinView::from).collect(),
        failures: report.failures.into_iter().map(FailureView::from).collect(),
    };
    Ok((status, Json(body)).into_response())
}
