//! API Integration Tests
//!
//! Every test drives the full router (CORS, auth, role gates, handlers)
//! against an in-memory row store and a scripted geocoder.
//!
//! Author: hephaex@gmail.com

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use fleet_api::auth::Claims;
use fleet_api::routes::{route_table, Access};
use fleet_api::testing::{test_config, TestApp};
use fleet_core::Role;
use fleet_geocode::ScriptedProvider;
use serde_json::{json, Value};
use std::time::{SystemTime, UNIX_EPOCH};
use tower::ServiceExt;

const ADMIN_IDENTIFIER: &str = "admin@example.com";
const ADMIN_PASSWORD: &str = "changeme123";
const DRIVER_PASSWORD: &str = "driverpass1";

/// Helper to create a test request
fn create_json_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    match body {
        Some(json_body) => builder
            .body(Body::from(serde_json::to_string(&json_body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

async fn call(
    app: &TestApp,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    send(app.router(), create_json_request(method, uri, token, body)).await
}

async fn login(app: &TestApp, identifier: &str, password: &str) -> (StatusCode, Value) {
    call(
        app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({"emailOrPhone": identifier, "password": password})),
    )
    .await
}

async fn admin_token(app: &TestApp) -> String {
    let (status, json) = login(app, ADMIN_IDENTIFIER, ADMIN_PASSWORD).await;
    assert_eq!(status, StatusCode::OK, "{json}");
    json["token"].as_str().unwrap().to_string()
}

/// Create a driver through the API; returns (id, token)
async fn create_driver(app: &TestApp, admin: &str, identifier: &str, name: &str) -> (String, String) {
    let (status, json) = call(
        app,
        Method::POST,
        "/admin/create-user",
        Some(admin),
        Some(json!({
            "fullName": name,
            "emailOrPhone": identifier,
            "password": DRIVER_PASSWORD,
            "role": "driver",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    let id = json["user"]["id"].as_str().unwrap().to_string();

    let (status, json) = login(app, identifier, DRIVER_PASSWORD).await;
    assert_eq!(status, StatusCode::OK, "{json}");
    (id, json["token"].as_str().unwrap().to_string())
}

fn geocoder() -> ScriptedProvider {
    ScriptedProvider::new()
        .with_point("123 Main St", 40.7128, -74.0060)
        .with_point("456 Oak Ave", 34.0522, -118.2437)
        .with_point("789 Pine Rd", 41.8781, -87.6298)
}

fn stops_payload(driver_id: &str, addresses: &[&str]) -> Value {
    json!({"driverId": driver_id, "addresses": addresses})
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

// =============================================================================
// Health and routing
// =============================================================================

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new(Some(geocoder()));

    let (status, json) = call(&app, Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert_eq!(json["geocoding"], true);
}

#[tokio::test]
async fn test_health_reports_missing_geocoder() {
    let app = TestApp::new(None);

    let (_, json) = call(&app, Method::GET, "/health", None, None).await;

    assert_eq!(json["geocoding"], false);
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let app = TestApp::new(None);

    let (status, json) = call(&app, Method::GET, "/nope", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "NOT_FOUND");

    // Known path, wrong method
    let (status, json) = call(&app, Method::PUT, "/auth/login", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "NOT_FOUND");
}

#[tokio::test]
async fn test_security_headers_on_responses() {
    let app = TestApp::new(None);

    let response = app
        .router()
        .oneshot(create_json_request(Method::GET, "/health", None, None))
        .await
        .unwrap();

    assert_eq!(
        response.headers().get(header::X_CONTENT_TYPE_OPTIONS).unwrap(),
        "nosniff"
    );
    assert_eq!(response.headers().get(header::CACHE_CONTROL).unwrap(), "no-store");
}

#[tokio::test]
async fn test_cors_preflight_short_circuits() {
    let app = TestApp::new(None);

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/admin/create-user")
        .header(header::ORIGIN, "https://dispatch.example.com")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization,content-type")
        .body(Body::empty())
        .unwrap();
    let response = app.router().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "https://dispatch.example.com"
    );
}

#[tokio::test]
async fn test_openapi_document_is_public() {
    let app = TestApp::new(None);

    let (status, json) = call(&app, Method::GET, "/api-docs/openapi.json", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["paths"]["/geocode"].is_object());
}

// =============================================================================
// Authentication and authorization
// =============================================================================

#[tokio::test]
async fn test_bootstrap_admin_login() {
    let app = TestApp::new(None);

    let (status, json) = login(&app, ADMIN_IDENTIFIER, ADMIN_PASSWORD).await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["token"].is_string());
    assert_eq!(json["user"]["role"], "admin");
    assert_eq!(json["user"]["emailOrPhone"], ADMIN_IDENTIFIER);
    assert_eq!(json["user"]["mustChangePassword"], true);
    assert!(json["user"].get("passwordHash").is_none());

    // A second login reuses the provisioned row
    let (status, _) = login(&app, ADMIN_IDENTIFIER, ADMIN_PASSWORD).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.store.rows("users").len(), 1);
}

#[tokio::test]
async fn test_bootstrap_identifier_case_does_not_reprovision() {
    let app = TestApp::new(None);
    let admin = admin_token(&app).await;

    let (status, json) = call(
        &app,
        Method::POST,
        "/auth/change-password",
        Some(&admin),
        Some(json!({"currentPassword": ADMIN_PASSWORD, "newPassword": "rotated-secret9"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");

    for identifier in [ADMIN_IDENTIFIER, "ADMIN@example.com", "Admin@Example.com"] {
        let (status, json) = login(&app, identifier, ADMIN_PASSWORD).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{identifier}: {json}");
        assert_eq!(json["error"], "INVALID_CREDENTIALS");
    }
    assert_eq!(app.store.rows("users").len(), 1);

    let (status, _) = login(&app, ADMIN_IDENTIFIER, "rotated-secret9").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_login_rejects_bad_credentials() {
    let app = TestApp::new(None);
    admin_token(&app).await;

    let (status, json) = login(&app, ADMIN_IDENTIFIER, "wrong-password").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "INVALID_CREDENTIALS");

    let (status, json) = login(&app, "nobody@example.com", "whatever1").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "INVALID_CREDENTIALS");
}

#[tokio::test]
async fn test_login_requires_identifier_and_password() {
    let app = TestApp::new(None);

    let (status, json) = call(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({"emailOrPhone": "someone@example.com"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "INVALID_INPUT");
}

#[tokio::test]
async fn test_malformed_json_body() {
    let app = TestApp::new(None);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, json) = send(app.router(), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "INVALID_JSON");
}

#[tokio::test]
async fn test_protected_routes_reject_anonymous_callers() {
    let app = TestApp::new(Some(geocoder()));

    for route in route_table() {
        if route.access == Access::Public {
            continue;
        }
        let uri = route
            .path
            .replace(":id", "stop-1")
            .replace(":action", "complete");
        let (status, json) = call(&app, route.method.clone(), &uri, None, Some(json!({}))).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED, "{} {}", route.method, uri);
        assert_eq!(json["error"], "UNAUTHORIZED");
    }
}

#[tokio::test]
async fn test_role_gate_and_token_failures() {
    let app = TestApp::new(None);
    let admin = admin_token(&app).await;
    let (_, driver) = create_driver(&app, &admin, "driver@example.com", "Dana").await;

    let (status, json) = call(&app, Method::GET, "/admin/drivers", Some(&driver), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"], "FORBIDDEN");

    let (status, json) = call(&app, Method::GET, "/admin/drivers", Some("not.a.token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "UNAUTHORIZED");

    let issued = now() - 7200;
    let expired = app
        .state
        .tokens
        .sign(&Claims {
            sub: "someone".to_string(),
            role: Role::Admin,
            full_name: None,
            email_or_phone: None,
            must_change_password: false,
            iat: issued,
            exp: issued + 3600,
        })
        .unwrap();
    let (status, json) = call(&app, Method::GET, "/admin/drivers", Some(&expired), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "TOKEN_EXPIRED");

    // Public routes still work with a bad token
    let (status, _) = call(&app, Method::GET, "/health", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_change_password_flow() {
    let app = TestApp::new(None);
    let admin = admin_token(&app).await;
    let (_, driver) = create_driver(&app, &admin, "driver@example.com", "Dana").await;

    let (status, json) = call(
        &app,
        Method::POST,
        "/auth/change-password",
        Some(&driver),
        Some(json!({"currentPassword": "not-it-at-all", "newPassword": "brandnew99"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "INVALID_PASSWORD");

    let (status, json) = call(
        &app,
        Method::POST,
        "/auth/change-password",
        Some(&driver),
        Some(json!({"currentPassword": DRIVER_PASSWORD, "newPassword": "short"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "INVALID_INPUT");

    let (status, json) = call(
        &app,
        Method::POST,
        "/auth/change-password",
        Some(&driver),
        Some(json!({"currentPassword": DRIVER_PASSWORD, "newPassword": "brandnew99"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert!(json["token"].is_string());
    assert_eq!(json["user"]["mustChangePassword"], false);

    let (status, _) = login(&app, "driver@example.com", DRIVER_PASSWORD).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = login(&app, "driver@example.com", "brandnew99").await;
    assert_eq!(status, StatusCode::OK);
}

// =============================================================================
// Geocoding
// =============================================================================

#[tokio::test]
async fn test_geocode_two_addresses() {
    let app = TestApp::new(Some(geocoder()));
    let admin = admin_token(&app).await;

    let (status, json) = call(
        &app,
        Method::POST,
        "/geocode",
        Some(&admin),
        Some(json!({"addresses": "123 Main St\n456 Oak Ave"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{json}");
    let pins = json["pins"].as_array().unwrap();
    assert_eq!(pins.len(), 2);
    assert_eq!(pins[0]["address"], "123 Main St");
    assert!(pins[0]["lat"].is_f64());
    assert!(pins[0]["lng"].is_f64());
    assert_eq!(pins[1]["lat"], 34.0522);

    let provider = app.geocoder.as_ref().unwrap();
    assert_eq!(provider.batch_calls(), 1);
    assert_eq!(provider.forward_calls(), 0);
}

#[tokio::test]
async fn test_geocode_single_address_uses_forward() {
    let app = TestApp::new(Some(geocoder()));
    let admin = admin_token(&app).await;

    let (status, json) = call(
        &app,
        Method::POST,
        "/geocode",
        Some(&admin),
        Some(json!({"addresses": ["  123 Main St  "]})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["pins"][0]["address"], "123 Main St");
    assert_eq!(app.geocoder.as_ref().unwrap().forward_calls(), 1);
}

#[tokio::test]
async fn test_geocode_too_many_addresses() {
    let app = TestApp::new(Some(geocoder()));
    let admin = admin_token(&app).await;
    let addresses: Vec<String> = (0..151).map(|i| format!("{i} Main St")).collect();

    let (status, json) = call(
        &app,
        Method::POST,
        "/geocode",
        Some(&admin),
        Some(json!({"addresses": addresses})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "TOO_MANY_ADDRESSES");
    let provider = app.geocoder.as_ref().unwrap();
    assert_eq!(provider.forward_calls() + provider.batch_calls(), 0);
}

#[tokio::test]
async fn test_geocode_rejects_bad_shapes() {
    let app = TestApp::new(Some(geocoder()));
    let admin = admin_token(&app).await;

    for addresses in [json!(42), json!("   \n  "), json!(null)] {
        let (status, json) = call(
            &app,
            Method::POST,
            "/geocode",
            Some(&admin),
            Some(json!({"addresses": addresses})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{addresses}");
        assert_eq!(json["error"], "INVALID_INPUT");
    }
}

#[tokio::test]
async fn test_geocode_partial_result() {
    let app = TestApp::new(Some(geocoder()));
    let admin = admin_token(&app).await;

    let (status, json) = call(
        &app,
        Method::POST,
        "/geocode",
        Some(&admin),
        Some(json!({"addresses": ["123 Main St", "1 Nowhere Ln"]})),
    )
    .await;

    assert_eq!(status, StatusCode::MULTI_STATUS);
    assert_eq!(json["pins"].as_array().unwrap().len(), 1);
    assert_eq!(json["failures"][0]["address"], "1 Nowhere Ln");
    assert!(json["failures"][0]["message"].is_string());
}

#[tokio::test]
async fn test_geocode_total_failure() {
    let app = TestApp::new(Some(geocoder()));
    let admin = admin_token(&app).await;

    let (status, json) = call(
        &app,
        Method::POST,
        "/geocode",
        Some(&admin),
        Some(json!({"addresses": ["1 Nowhere Ln", "2 Nowhere Ln"]})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["error"], "MAPBOX_GEOCODE_FAILED");
    assert_eq!(json["details"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_geocode_without_token_is_config_error() {
    let app = TestApp::new(None);
    let admin = admin_token(&app).await;

    let (status, json) = call(
        &app,
        Method::POST,
        "/geocode",
        Some(&admin),
        Some(json!({"addresses": "123 Main St"})),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "CONFIG_ERROR");
}

// =============================================================================
// Driver stops
// =============================================================================

#[tokio::test]
async fn test_replace_driver_stops() {
    let app = TestApp::new(Some(geocoder()));
    let admin = admin_token(&app).await;
    let (driver_id, driver) = create_driver(&app, &admin, "driver@example.com", "Dana").await;

    let (status, json) = call(
        &app,
        Method::POST,
        "/admin/driver-stops",
        Some(&admin),
        Some(stops_payload(&driver_id, &["123 Main St", "456 Oak Ave", "789 Pine Rd"])),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    let stops = json["stops"].as_array().unwrap();
    let orders: Vec<i64> = stops.iter().map(|s| s["sortOrder"].as_i64().unwrap()).collect();
    assert_eq!(orders, vec![0, 1, 2]);
    assert!(stops.iter().all(|s| s["status"] == "pending"));
    assert_eq!(stops[2]["addressText"], "789 Pine Rd");

    // A second replace drops the previous list
    let (status, _) = call(
        &app,
        Method::POST,
        "/admin/driver-stops",
        Some(&admin),
        Some(stops_payload(&driver_id, &["456 Oak Ave"])),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.store.rows("driver_stops").len(), 1);

    let (status, json) = call(&app, Method::GET, "/driver/stops", Some(&driver), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["stops"][0]["addressText"], "456 Oak Ave");
    assert_eq!(json["stops"][0]["sortOrder"], 0);
}

#[tokio::test]
async fn test_replace_aborts_on_geocode_failure() {
    let app = TestApp::new(Some(geocoder()));
    let admin = admin_token(&app).await;
    let (driver_id, _) = create_driver(&app, &admin, "driver@example.com", "Dana").await;

    let (status, _) = call(
        &app,
        Method::POST,
        "/admin/driver-stops",
        Some(&admin),
        Some(stops_payload(&driver_id, &["123 Main St", "456 Oak Ave"])),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = call(
        &app,
        Method::POST,
        "/admin/driver-stops",
        Some(&admin),
        Some(stops_payload(&driver_id, &["789 Pine Rd", "1 Nowhere Ln"])),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["error"], "MAPBOX_GEOCODE_FAILED");
    assert_eq!(json["details"][0]["address"], "1 Nowhere Ln");

    let stored = app.store.rows("driver_stops");
    assert_eq!(stored.len(), 2);
    assert!(stored.iter().any(|s| s["address_text"] == "123 Main St"));
}

#[tokio::test]
async fn test_replace_requires_existing_driver() {
    let app = TestApp::new(Some(geocoder()));
    let admin = admin_token(&app).await;

    let (status, json) = call(
        &app,
        Method::POST,
        "/admin/driver-stops",
        Some(&admin),
        Some(stops_payload("no-such-driver", &["123 Main St"])),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "DRIVER_NOT_FOUND");

    // An admin is not a driver
    let (_, me) = call(&app, Method::GET, "/account/profile", Some(&admin), None).await;
    let admin_id = me["user"]["id"].as_str().unwrap();
    let (status, json) = call(
        &app,
        Method::POST,
        "/admin/driver-stops",
        Some(&admin),
        Some(stops_payload(admin_id, &["123 Main St"])),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "DRIVER_NOT_FOUND");
}

#[tokio::test]
async fn test_concurrent_replaces_do_not_interleave() {
    let app = TestApp::yielding(Some(geocoder()));
    let admin = admin_token(&app).await;
    let (driver_id, _) = create_driver(&app, &admin, "driver@example.com", "Dana").await;

    let first = send(
        app.router(),
        create_json_request(
            Method::POST,
            "/admin/driver-stops",
            Some(&admin),
            Some(stops_payload(&driver_id, &["123 Main St", "456 Oak Ave", "789 Pine Rd"])),
        ),
    );
    let second = send(
        app.router(),
        create_json_request(
            Method::POST,
            "/admin/driver-stops",
            Some(&admin),
            Some(stops_payload(&driver_id, &["456 Oak Ave", "789 Pine Rd"])),
        ),
    );
    let ((first_status, _), (second_status, _)) = tokio::join!(first, second);

    assert_eq!(first_status, StatusCode::OK);
    assert_eq!(second_status, StatusCode::OK);

    // Exactly one of the two lists survives, with its own sortOrder run
    let stored = app.store.rows("driver_stops");
    assert!(
        stored.len() == 3 || stored.len() == 2,
        "interleaved replace left {} stops",
        stored.len()
    );
    let mut orders: Vec<i64> = stored
        .iter()
        .map(|s| s["sort_order"].as_i64().unwrap())
        .collect();
    orders.sort_unstable();
    assert_eq!(orders, (0..stored.len() as i64).collect::<Vec<_>>());
    assert_eq!(app.state.driver_locks.active(), 0);
}

#[tokio::test]
async fn test_stop_status_scoping() {
    let app = TestApp::new(Some(geocoder()));
    let admin = admin_token(&app).await;
    let (dana_id, dana) = create_driver(&app, &admin, "dana@example.com", "Dana").await;
    let (_, eli) = create_driver(&app, &admin, "eli@example.com", "Eli").await;

    let (_, json) = call(
        &app,
        Method::POST,
        "/admin/driver-stops",
        Some(&admin),
        Some(stops_payload(&dana_id, &["123 Main St", "456 Oak Ave"])),
    )
    .await;
    let stop_id = json["stops"][0]["id"].as_str().unwrap().to_string();
    let complete = format!("/driver/stops/{stop_id}/complete");
    let undo = format!("/driver/stops/{stop_id}/undo");

    // Another driver's stop looks exactly like a missing one
    let (status, json) = call(&app, Method::POST, &complete, Some(&eli), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "STOP_NOT_FOUND");

    let (status, json) = call(&app, Method::POST, &complete, Some(&dana), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["stop"]["status"], "complete");

    // Admins reach any stop
    let (status, json) = call(&app, Method::POST, &undo, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["stop"]["status"], "pending");

    let (status, json) = call(
        &app,
        Method::POST,
        &format!("/driver/stops/{stop_id}/skip"),
        Some(&dana),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "NOT_FOUND");

    let (status, json) = call(
        &app,
        Method::POST,
        "/driver/stops/missing-stop/complete",
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "STOP_NOT_FOUND");
}

#[tokio::test]
async fn test_stop_listing_scope() {
    let app = TestApp::new(Some(geocoder()));
    let admin = admin_token(&app).await;
    let (dana_id, _) = create_driver(&app, &admin, "dana@example.com", "Dana").await;
    let (_, eli) = create_driver(&app, &admin, "eli@example.com", "Eli").await;

    call(
        &app,
        Method::POST,
        "/admin/driver-stops",
        Some(&admin),
        Some(stops_payload(&dana_id, &["123 Main St"])),
    )
    .await;

    // Drivers always get their own list, whatever they ask for
    let (status, json) = call(
        &app,
        Method::GET,
        &format!("/driver/stops?driverId={dana_id}"),
        Some(&eli),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["stops"].as_array().unwrap().is_empty());

    let (status, json) = call(&app, Method::GET, "/driver/stops", Some(&admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "INVALID_INPUT");

    let (status, json) = call(
        &app,
        Method::GET,
        &format!("/admin/driver-stops?driverId={dana_id}"),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["stops"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_malformed_query_and_path_use_error_envelope() {
    let app = TestApp::new(Some(geocoder()));
    let admin = admin_token(&app).await;

    for (method, uri) in [
        (Method::GET, "/admin/driver-stops?driverId=a&driverId=b"),
        (Method::GET, "/driver/stops?driverId=a&driverId=b"),
        (Method::POST, "/driver/stops/%FF/complete"),
    ] {
        let response = app
            .router()
            .oneshot(create_json_request(method, uri, Some(&admin), None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json",
            "{uri}"
        );
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "INVALID_INPUT", "{uri}");
        assert!(json["message"].is_string());
    }
}

// =============================================================================
// User administration
// =============================================================================

#[tokio::test]
async fn test_create_user_validation() {
    let app = TestApp::new(None);
    let admin = admin_token(&app).await;
    create_driver(&app, &admin, "driver@example.com", "Dana").await;

    let cases = [
        (
            json!({"emailOrPhone": "driver@example.com", "password": "longenough", "role": "driver"}),
            StatusCode::CONFLICT,
            "USER_EXISTS",
        ),
        (
            json!({"emailOrPhone": "new@example.com", "password": "short", "role": "driver"}),
            StatusCode::BAD_REQUEST,
            "INVALID_INPUT",
        ),
        (
            json!({"emailOrPhone": "new@example.com", "password": "longenough", "role": "pilot"}),
            StatusCode::BAD_REQUEST,
            "INVALID_INPUT",
        ),
        (
            json!({"emailOrPhone": "  ", "password": "longenough", "role": "driver"}),
            StatusCode::BAD_REQUEST,
            "INVALID_INPUT",
        ),
    ];

    for (body, expected_status, expected_code) in cases {
        let (status, json) = call(&app, Method::POST, "/admin/create-user", Some(&admin), Some(body)).await;
        assert_eq!(status, expected_status, "{json}");
        assert_eq!(json["error"], expected_code);
    }
}

#[tokio::test]
async fn test_list_drivers_ordered_by_name() {
    let app = TestApp::new(None);
    let admin = admin_token(&app).await;
    create_driver(&app, &admin, "zoe@example.com", "Zoe").await;
    create_driver(&app, &admin, "ann@example.com", "Ann").await;

    let (status, json) = call(&app, Method::GET, "/admin/drivers", Some(&admin), None).await;

    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = json["drivers"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["fullName"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Ann", "Zoe"]);
}

#[tokio::test]
async fn test_admin_password_reset_and_update() {
    let app = TestApp::new(None);
    let admin = admin_token(&app).await;
    let (driver_id, _) = create_driver(&app, &admin, "driver@example.com", "Dana").await;

    let (status, json) = call(
        &app,
        Method::POST,
        "/admin/users/update-password",
        Some(&admin),
        Some(json!({"userId": driver_id, "newPassword": "updated-pass"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["user"]["mustChangePassword"], false);

    let (status, json) = call(
        &app,
        Method::POST,
        "/admin/users/reset-password",
        Some(&admin),
        Some(json!({"userId": driver_id, "newPassword": "reset-pass1"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["user"]["mustChangePassword"], true);

    let (status, json) = login(&app, "driver@example.com", "reset-pass1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["user"]["mustChangePassword"], true);

    let (status, json) = call(
        &app,
        Method::POST,
        "/admin/users/reset-password",
        Some(&admin),
        Some(json!({"userId": "missing", "newPassword": "reset-pass1"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "USER_NOT_FOUND");
}

#[tokio::test]
async fn test_admin_update_profile_uniqueness() {
    let app = TestApp::new(None);
    let admin = admin_token(&app).await;
    let (dana_id, _) = create_driver(&app, &admin, "dana@example.com", "Dana").await;
    create_driver(&app, &admin, "eli@example.com", "Eli").await;

    let (status, json) = call(
        &app,
        Method::POST,
        "/admin/users/update-profile",
        Some(&admin),
        Some(json!({"userId": dana_id, "emailOrPhone": "eli@example.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "USER_EXISTS");

    let (status, json) = call(
        &app,
        Method::POST,
        "/admin/users/update-profile",
        Some(&admin),
        Some(json!({"userId": dana_id, "fullName": "Dana Scully", "emailOrPhone": "+15551234567"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["user"]["fullName"], "Dana Scully");
    assert_eq!(json["user"]["emailOrPhone"], "+15551234567");
}

#[tokio::test]
async fn test_delete_user_with_stops() {
    let app = TestApp::new(Some(geocoder()));
    let admin = admin_token(&app).await;
    let (driver_id, _) = create_driver(&app, &admin, "driver@example.com", "Dana").await;
    call(
        &app,
        Method::POST,
        "/admin/driver-stops",
        Some(&admin),
        Some(stops_payload(&driver_id, &["123 Main St", "456 Oak Ave"])),
    )
    .await;

    let (status, json) = call(
        &app,
        Method::DELETE,
        "/admin/users",
        Some(&admin),
        Some(json!({"userId": driver_id})),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["outcome"], "deleted");
    assert!(app.store.rows("driver_stops").is_empty());
    assert_eq!(app.store.rows("users").len(), 1);
}

#[tokio::test]
async fn test_delete_user_falls_back_to_anonymize() {
    let app = TestApp::new(Some(geocoder()));
    let admin = admin_token(&app).await;
    let (driver_id, _) = create_driver(&app, &admin, "driver@example.com", "Dana").await;
    let (status, _) = call(
        &app,
        Method::POST,
        "/admin/driver-stops",
        Some(&admin),
        Some(stops_payload(&driver_id, &["123 Main St", "456 Oak Ave"])),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.store.rows("driver_stops").len(), 2);
    app.store.reject_deletes_on("users");

    let (status, json) = call(
        &app,
        Method::DELETE,
        "/admin/users",
        Some(&admin),
        Some(json!({"userId": driver_id})),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["outcome"], "anonymized");
    assert!(app.store.rows("driver_stops").is_empty());

    let users = app.store.rows("users");
    let row = users.iter().find(|u| u["id"] == driver_id.as_str()).unwrap();
    assert_eq!(row["status"], "deleted");
    assert!(row["full_name"].is_null());
    assert!(row["email_or_phone"]
        .as_str()
        .unwrap()
        .starts_with("deleted-"));

    let (status, _) = login(&app, "driver@example.com", DRIVER_PASSWORD).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_cannot_delete_self() {
    let app = TestApp::new(None);
    let admin = admin_token(&app).await;
    let (_, me) = call(&app, Method::GET, "/account/profile", Some(&admin), None).await;

    let (status, json) = call(
        &app,
        Method::DELETE,
        "/admin/users",
        Some(&admin),
        Some(json!({"userId": me["user"]["id"]})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "INVALID_INPUT");
}

// =============================================================================
// Self-service account
// =============================================================================

#[tokio::test]
async fn test_verify_password() {
    let app = TestApp::new(None);
    let admin = admin_token(&app).await;
    let (_, driver) = create_driver(&app, &admin, "driver@example.com", "Dana").await;

    let (status, json) = call(
        &app,
        Method::POST,
        "/account/verify-password",
        Some(&driver),
        Some(json!({"password": DRIVER_PASSWORD})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["valid"], true);

    let (status, json) = call(
        &app,
        Method::POST,
        "/account/verify-password",
        Some(&driver),
        Some(json!({"password": "definitely-wrong"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "INVALID_PASSWORD");
}

#[tokio::test]
async fn test_profile_read_and_update() {
    let app = TestApp::new(None);
    let admin = admin_token(&app).await;
    let (driver_id, driver) = create_driver(&app, &admin, "driver@example.com", "Dana").await;

    let (status, json) = call(&app, Method::GET, "/account/profile", Some(&driver), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["user"]["id"], driver_id.as_str());
    assert_eq!(json["user"]["fullName"], "Dana");

    let (status, json) = call(
        &app,
        Method::PATCH,
        "/account/profile",
        Some(&driver),
        Some(json!({"fullName": "Dana K"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["user"]["fullName"], "Dana K");

    let claims = app
        .state
        .tokens
        .verify(json["token"].as_str().unwrap())
        .unwrap();
    assert_eq!(claims.full_name.as_deref(), Some("Dana K"));
}

#[tokio::test]
async fn test_delete_my_data_and_account() {
    let app = TestApp::new(None);
    let admin = admin_token(&app).await;
    let (driver_id, driver) = create_driver(&app, &admin, "driver@example.com", "Dana").await;

    let (status, json) = call(&app, Method::DELETE, "/account/data", Some(&driver), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["user"]["fullName"].is_null());
    assert_eq!(json["user"]["status"], "active");

    let (status, json) = call(&app, Method::DELETE, "/account", Some(&driver), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["outcome"], "deleted");
    assert!(app
        .store
        .rows("users")
        .iter()
        .all(|u| u["id"] != driver_id.as_str()));
}

#[tokio::test]
async fn test_custom_address_cap() {
    let mut config = test_config();
    config.geocoding.max_addresses = 2;
    let app = TestApp::with_config(config, Some(geocoder()));
    let admin = admin_token(&app).await;

    let (status, json) = call(
        &app,
        Method::POST,
        "/geocode",
        Some(&admin),
        Some(json!({"addresses": ["123 Main St", "456 Oak Ave", "789 Pine Rd"]})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "TOO_MANY_ADDRESSES");
}
