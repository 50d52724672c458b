//! OpenAPI document

use crate::error::ApiError;
use crate::handlers::{self, account, admin, auth, driver, geocode, health};
use axum::Json;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Fleet Dispatch API",
        description = "Driver accounts, stop assignment and geocoding"
    ),
    paths(
        health::health_check,
        auth::login,
        auth::change_password,
        admin::create_user,
        admin::list_drivers,
        admin::list_driver_stops,
        admin::replace_driver_stops,
        admin::reset_password,
        admin::update_password,
        admin::update_profile,
        admin::delete_user,
        account::verify_password,
        account::delete_data,
        account::delete_account,
        account::get_profile,
        account::update_profile,
        driver::list_stops,
        driver::update_stop_status,
        geocode::geocode,
    ),
    components(schemas(
        ApiError,
        handlers::UserPublic,
        handlers::StopView,
        handlers::StopListResponse,
        handlers::TokenResponse,
        handlers::DeleteResponse,
        health::HealthResponse,
        auth::LoginRequest,
        auth::ChangePasswordRequest,
        admin::CreateUserRequest,
        admin::UserResponse,
        admin::DriverListResponse,
        admin::ReplaceStopsRequest,
        admin::SetPasswordRequest,
        admin::UpdateProfileRequest,
        admin::DeleteUserRequest,
        account::VerifyPasswordRequest,
        account::VerifyPasswordResponse,
        account::ProfileResponse,
        account::PatchProfileRequest,
        driver::StopResponse,
        geocode::GeocodeRequest,
        geocode::GeocodeResponse,
        geocode::PinView,
        geocode::FailureView,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Liveness"),
        (name = "auth", description = "Login and password change"),
        (name = "admin", description = "User and stop administration"),
        (name = "account", description = "Self-service account management"),
        (name = "driver", description = "Driver stop lists"),
        (name = "geocode", description = "Address geocoding"),
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by protected paths
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Serve the generated document
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_routes_and_security() {
        let doc = serde_json::to_value(ApiDoc::openapi()).unwrap();

        assert!(doc["paths"]["/auth/login"]["post"].is_object());
        assert!(doc["paths"]["/driver/stops/{id}/{action}"]["post"].is_object());
        assert_eq!(
            doc["components"]["securitySchemes"]["bearer_auth"]["scheme"],
            "bearer"
        );
    }
}
