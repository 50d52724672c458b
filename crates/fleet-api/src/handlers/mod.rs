//! API handlers
//!
//! Request and response bodies are camelCase JSON; rows in the store stay
//! snake_case and are converted at this boundary.
//!
//! Author: hephaex@gmail.com

pub mod account;
pub mod admin;
pub mod auth;
pub mod driver;
pub mod geocode;
pub mod health;

use fleet_core::{DriverStop, User};
use serde::Serialize;
use utoipa::ToSchema;

/// User as returned by the API; never includes the password hash
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserPublic {
    pub id: String,
    pub full_name: Option<String>,
    pub email_or_phone: String,
    /// `admin` or `driver`
    #[schema(value_type = String)]
    pub role: fleet_core::Role,
    /// `active` or `deleted`
    #[schema(value_type = String)]
    pub status: fleet_core::UserStatus,
    pub must_change_password: bool,
}

impl From<User> for UserPublic {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            full_name: user.full_name,
            email_or_phone: user.email_or_phone,
            role: user.role,
            status: user.status,
            must_change_password: user.must_change_password,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StopView {
    pub id: String,
    pub driver_id: String,
    pub address_text: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub sort_order: i32,
    /// `pending` or `complete`
    #[schema(value_type = String)]
    pub status: fleet_core::StopStatus,
}

impl From<DriverStop> for StopView {
    fn from(stop: DriverStop) -> Self {
        Self {
            id: stop.id,
            driver_id: stop.driver_id,
            address_text: stop.address_text,
            lat: stop.lat,
            lng: stop.lng,
            sort_order: stop.sort_order,
            status: stop.status,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StopListResponse {
    pub stops: Vec<StopView>,
}

impl From<Vec<DriverStop>> for StopListResponse {
    fn from(stops: Vec<DriverStop>) -> Self {
        Self {
            stops: stops.into_iter().map(StopView::from).collect(),
        }
    }
}

/// A fresh token together with the user it describes
#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    pub token: String,
    pub user: UserPublic,
}

impl TokenResponse {
    pub fn new(token: String, user: User) -> Self {
        Self {
            token,
            user: user.into(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteResponse {
    pub success: bool,
    /// `deleted` or `anonymized`
    pub outcome: String,
}

/// Fallback for any unmatched method and path
pub async fn not_found() -> crate::error::AppError {
    crate::error::AppError::NotFound
}
