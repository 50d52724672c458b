//! API error handling
//!
//! Every failure leaves the server as `{"error": CODE, "message": text}`,
//! optionally with `details`. Codes form a closed set and each maps to
//! exactly one HTTP status.
//!
//! Author: hephaex@gmail.com

use crate::auth::password::PasswordError;
use crate::auth::token::TokenError;
use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use fleet_geocode::GeocodeError;
use fleet_store::StoreError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{error, warn};
use utoipa::ToSchema;

/// API error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Error code
    pub error: String,
    /// Human-readable message
    pub message: String,
    /// Additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<Value>,
}

/// Application error type
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Request body is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    TooManyAddresses(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid email/phone or password")]
    InvalidCredentials,

    #[error("Current password is incorrect")]
    InvalidPassword,

    #[error("Insufficient permissions")]
    Forbidden,

    #[error("Account is not active")]
    UserInactive,

    #[error("Not found")]
    NotFound,

    #[error("User not found")]
    UserNotFound,

    #[error("Driver not found")]
    DriverNotFound,

    #[error("Stop not found")]
    StopNotFound,

    #[error("A user with this email or phone already exists")]
    UserExists,

    #[error("{0}")]
    Config(String),

    /// A named operation failed upstream; `code` ends in `_FAILED`
    #[error("{message}")]
    Operation { code: &'static str, message: String },

    #[error("{message}")]
    Geocode {
        message: String,
        details: Option<Value>,
    },
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidJson(_) => "INVALID_JSON",
            AppError::InvalidInput(_) => "INVALID_INPUT",
            AppError::TooManyAddresses(_) => "TOO_MANY_ADDRESSES",
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::TokenExpired => "TOKEN_EXPIRED",
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::InvalidPassword => "INVALID_PASSWORD",
            AppError::Forbidden => "FORBIDDEN",
            AppError::UserInactive => "USER_INACTIVE",
            AppError::NotFound => "NOT_FOUND",
            AppError::UserNotFound => "USER_NOT_FOUND",
            AppError::DriverNotFound => "DRIVER_NOT_FOUND",
            AppError::StopNotFound => "STOP_NOT_FOUND",
            AppError::UserExists => "USER_EXISTS",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Operation { code, .. } => *code,
            AppError::Geocode { .. } => "MAPBOX_GEOCODE_FAILED",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidJson(_) | AppError::InvalidInput(_) | AppError::TooManyAddresses(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Unauthorized
            | AppError::TokenExpired
            | AppError::InvalidCredentials
            | AppError::InvalidPassword => StatusCode::UNAUTHORIZED,
            AppError::Forbidden | AppError::UserInactive => StatusCode::FORBIDDEN,
            AppError::NotFound
            | AppError::UserNotFound
            | AppError::DriverNotFound
            | AppError::StopNotFound => StatusCode::NOT_FOUND,
            AppError::UserExists => StatusCode::CONFLICT,
            AppError::Config(_) | AppError::Operation { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Geocode { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    /// Wrap an upstream failure of the operation named by `code`
    ///
    /// The cause is logged here; the client only sees the operation name.
    pub fn operation(code: &'static str, cause: impl std::fmt::Display) -> Self {
        error!(code, error = %cause, "operation failed");
        let action = code
            .trim_end_matches("_FAILED")
            .replace('_', " ")
            .to_lowercase();
        AppError::Operation {
            code,
            message: format!("Failed to {action}"),
        }
    }

    pub fn geocode(message: impl Into<String>, details: Option<Value>) -> Self {
        AppError::Geocode {
            message: message.into(),
            details,
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            AppError::Geocode { details, .. } => details.clone(),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let AppError::Config(message) = &self {
            error!(message = %message, "configuration error");
        }

        let body = ApiError {
            error: self.code().to_string(),
            message: self.to_string(),
            details: self.details(),
        };

        (status, Json(body)).into_response()
    }
}

/// Attach an operation code to a fallible upstream call
pub trait OrFail<T> {
    fn or_fail(self, code: &'static str) -> Result<T, AppError>;
}

impl<T, E: std::fmt::Display> OrFail<T> for Result<T, E> {
    fn or_fail(self, code: &'static str) -> Result<T, AppError> {
        self.map_err(|e| AppError::operation(code, e))
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::operation("ROW_STORE_FAILED", err)
    }
}

impl From<GeocodeError> for AppError {
    fn from(err: GeocodeError) -> Self {
        match err {
            GeocodeError::InvalidInput(message) => AppError::InvalidInput(message),
            err @ (GeocodeError::TooMany { .. } | GeocodeError::BatchTooLarge { .. }) => {
                AppError::TooManyAddresses(err.to_string())
            }
            err @ (GeocodeError::Upstream { .. }
            | GeocodeError::NoMatch { .. }
            | GeocodeError::Unusable(_)) => {
                warn!(error = %err, "geocoding failed");
                AppError::geocode(err.to_string(), None)
            }
        }
    }
}

impl From<PasswordError> for AppError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::TooShort { .. } => AppError::InvalidInput(err.to_string()),
            PasswordError::HashingFailed(_) => AppError::operation("PASSWORD_HASH_FAILED", err),
        }
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        AppError::operation("TOKEN_ISSUE_FAILED", err)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidJson(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::InvalidInput(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::InvalidInput(rejection.body_text())
    }
}
