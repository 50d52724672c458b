//! Fleet Core - Domain models and shared types
//!
//! This crate defines the records shared by every other crate in the workspace:
//! - Users (administrators and drivers) and their lifecycle status
//! - Driver stops and their completion status
//! - The closed role set used at the authorization boundary
//! - Configuration management
//!
//! Author: hephaex@gmail.com

pub mod config;

pub use config::{
    AppConfig, AuthConfig, ConfigError, GeocodingConfig, LoggingConfig, RowStoreConfig,
    ServerConfig,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Row-store table holding user accounts
pub const USERS_TABLE: &str = "users";

/// Row-store table holding driver stops
pub const DRIVER_STOPS_TABLE: &str = "driver_stops";

// ============================================================================
// Roles
// ============================================================================

/// Closed set of account roles
///
/// Every authorization decision matches on this enum exhaustively; roles are
/// never compared as free-form strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Driver,
}

impl Role {
    /// Every role, in display order
    pub const ALL: [Role; 2] = [Role::Admin, Role::Driver];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Driver => "driver",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "driver" => Ok(Role::Driver),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Returned when a role string is outside the closed set
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

// ============================================================================
// Users
// ============================================================================

/// Account lifecycle status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Active,
    /// Anonymized account kept because physical deletion was blocked
    Deleted,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Deleted => "deleted",
        }
    }
}

/// User record as stored in the `users` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,

    #[serde(default)]
    pub full_name: Option<String>,

    /// Login identifier (email address or phone number), unique
    pub email_or_phone: String,

    /// Argon2 PHC string; never leaves the API layer
    #[serde(default, skip_serializing)]
    pub password_hash: String,

    pub role: Role,

    #[serde(default)]
    pub status: UserStatus,

    #[serde(default)]
    pub must_change_password: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    pub fn is_driver(&self) -> bool {
        self.role == Role::Driver
    }
}

/// Insert payload for a new user row
#[derive(Debug, Clone, Serialize)]
pub struct NewUser {
    pub id: String,
    pub full_name: Option<String>,
    pub email_or_phone: String,
    pub password_hash: String,
    pub role: Role,
    pub status: UserStatus,
    pub must_change_password: bool,
    pub created_at: DateTime<Utc>,
}

impl NewUser {
    /// Build an active user with a freshly generated id
    pub fn new(
        full_name: Option<String>,
        email_or_phone: impl Into<String>,
        password_hash: impl Into<String>,
        role: Role,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            full_name,
            email_or_phone: email_or_phone.into(),
            password_hash: password_hash.into(),
            role,
            status: UserStatus::Active,
            must_change_password: false,
            created_at: Utc::now(),
        }
    }

    pub fn must_change_password(mut self, value: bool) -> Self {
        self.must_change_password = value;
        self
    }
}

// ============================================================================
// Driver stops
// ============================================================================

/// Completion state of a single stop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopStatus {
    #[default]
    Pending,
    Complete,
}

impl StopStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopStatus::Pending => "pending",
            StopStatus::Complete => "complete",
        }
    }
}

/// Stop record as stored in the `driver_stops` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverStop {
    pub id: String,
    pub driver_id: String,
    pub address_text: String,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    pub sort_order: i32,
    #[serde(default)]
    pub status: StopStatus,
}

/// Insert payload for a stop; `sort_order` is assigned by the caller
#[derive(Debug, Clone, Serialize)]
pub struct NewDriverStop {
    pub id: String,
    pub driver_id: String,
    pub address_text: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub sort_order: i32,
    pub status: StopStatus,
}

impl NewDriverStop {
    /// A pending stop at the given route position
    pub fn pending(
        driver_id: impl Into<String>,
        address_text: impl Into<String>,
        coordinates: Option<(f64, f64)>,
        sort_order: i32,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            driver_id: driver_id.into(),
            address_text: address_text.into(),
            lat: coordinates.map(|(lat, _)| lat),
            lng: coordinates.map(|(_, lng)| lng),
            sort_order,
            status: StopStatus::Pending,
        }
    }
}
