//! API route table
//!
//! Every route is declared once with its method, path and the roles allowed
//! to call it. Role gates are attached per method so a public and a
//! protected method can share a path.
//!
//! Author: hephaex@gmail.com

use crate::auth::require_roles;
use crate::handlers::{self, account, admin, auth, driver, geocode, health};
use crate::openapi;
use crate::state::AppState;
use axum::{
    handler::Handler,
    http::Method,
    middleware,
    routing::{self, MethodRouter},
    Router,
};
use fleet_core::Role;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const ADMIN: &[Role] = &[Role::Admin];
pub const ANY_USER: &[Role] = &Role::ALL;

/// Who may call a route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Roles(&'static [Role]),
}

/// One row of the route table
pub struct Route {
    pub method: Method,
    pub path: &'static str,
    pub access: Access,
    handler: MethodRouter<Arc<AppState>>,
}

impl Route {
    fn new(
        method: Method,
        path: &'static str,
        access: Access,
        handler: MethodRouter<Arc<AppState>>,
    ) -> Self {
        Self {
            method,
            path,
            access,
            handler,
        }
    }

    pub fn get<H, T>(path: &'static str, access: Access, handler: H) -> Self
    where
        H: Handler<T, Arc<AppState>>,
        T: 'static,
    {
        Self::new(Method::GET, path, access, routing::get(handler))
    }

    pub fn post<H, T>(path: &'static str, access: Access, handler: H) -> Self
    where
        H: Handler<T, Arc<AppState>>,
        T: 'static,
    {
        Self::new(Method::POST, path, access, routing::post(handler))
    }

    pub fn patch<H, T>(path: &'static str, access: Access, handler: H) -> Self
    where
        H: Handler<T, Arc<AppState>>,
        T: 'static,
    {
        Self::new(Method::PATCH, path, access, routing::patch(handler))
    }

    pub fn delete<H, T>(path: &'static str, access: Access, handler: H) -> Self
    where
        H: Handler<T, Arc<AppState>>,
        T: 'static,
    {
        Self::new(Method::DELETE, path, access, routing::delete(handler))
    }

    fn into_method_router(self) -> MethodRouter<Arc<AppState>> {
        match self.access {
            Access::Public => self.handler,
            Access::Roles(roles) => self
                .handler
                .route_layer(middleware::from_fn_with_state(roles, require_roles)),
        }
    }
}

/// The full route table
pub fn route_table() -> Vec<Route> {
    use Access::{Public, Roles};

    vec![
        Route::get("/health", Public, health::health_check),
        Route::get("/api-docs/openapi.json", Public, openapi::openapi_json),
        // Auth
        Route::post("/auth/login", Public, auth::login),
        Route::post("/auth/change-password", Roles(ANY_USER), auth::change_password),
        // Administration
        Route::post("/admin/create-user", Roles(ADMIN), admin::create_user),
        Route::get("/admin/drivers", Roles(ADMIN), admin::list_drivers),
        Route::get("/admin/driver-stops", Roles(ADMIN), admin::list_driver_stops),
        Route::post("/admin/driver-stops", Roles(ADMIN), admin::replace_driver_stops),
        Route::post("/admin/users/reset-password", Roles(ADMIN), admin::reset_password),
        Route::post("/admin/users/update-profile", Roles(ADMIN), admin::update_profile),
        Route::post("/admin/users/update-password", Roles(ADMIN), admin::update_password),
        Route::delete("/admin/users", Roles(ADMIN), admin::delete_user),
        // Self-service account
        Route::post("/account/verify-password", Roles(ANY_USER), account::verify_password),
        Route::delete("/account/data", Roles(ANY_USER), account::delete_data),
        Route::delete("/account", Roles(ANY_USER), account::delete_account),
        Route::get("/account/profile", Roles(ANY_USER), account::get_profile),
        Route::patch("/account/profile", Roles(ANY_USER), account::update_profile),
        // Driver stops
        Route::get("/driver/stops", Roles(ANY_USER), driver::list_stops),
        Route::post("/driver/stops/:id/:action", Roles(ANY_USER), driver::update_stop_status),
        // Geocoding
        Route::post("/geocode", Roles(ANY_USER), geocode::geocode),
    ]
}

/// Build a router from a route table
///
/// Methods sharing a path are merged into one method router. A known path
/// called with an unlisted method answers `NOT_FOUND` like an unknown path.
pub fn build(table: Vec<Route>) -> Router<Arc<AppState>> {
    let mut by_path: BTreeMap<&'static str, Vec<MethodRouter<Arc<AppState>>>> = BTreeMap::new();
    for route in table {
        by_path
            .entry(route.path)
            .or_default()
            .push(route.into_method_router());
    }

    by_path
        .into_iter()
        .fold(Router::new(), |router, (path, methods)| {
            let method_router = methods
                .into_iter()
                .fold(MethodRouter::new(), MethodRouter::merge)
                .fallback(handlers::not_found);
            router.route(path, method_router)
        })
}
