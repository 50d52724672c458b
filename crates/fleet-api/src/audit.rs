//! Security audit logging
//!
//! Account and dispatch events that matter for later review are logged at
//! INFO level with the "audit" target, making them easy to filter and route
//! separately from application logs. Each record carries the serialized event
//! as a structured field.
//!
//! # Example
//!
//! ```ignore
//! use fleet_api::audit::{audit_log, AuditEvent};
//!
//! audit_log(&AuditEvent::StopsReplaced {
//!     driver_id: "d1".to_string(),
//!     count: 12,
//!     replaced_by: "admin-1".to_string(),
//! });
//! ```
//!
//! Author: hephaex@gmail.com

use axum::http::HeaderMap;
use chrono::Utc;
use fleet_core::Role;
use serde::Serialize;
use tracing::info;

/// Audit events
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    LoginSuccess {
        user_id: String,
        identifier: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    LoginFailure {
        identifier: String,
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// The bootstrap administrator was provisioned on first login
    AdminBootstrapped { user_id: String, identifier: String },

    UserCreated {
        user_id: String,
        role: Role,
        created_by: String,
    },

    PasswordChanged {
        user_id: String,
        changed_by: String,
        must_change_password: bool,
    },

    UserDeleted {
        user_id: String,
        deleted_by: String,
        /// True when hard deletion failed and the account was anonymized
        anonymized: bool,
    },

    PersonalDataErased { user_id: String },

    StopsReplaced {
        driver_id: String,
        count: usize,
        replaced_by: String,
    },

    AccessDenied {
        user_id: String,
        role: Role,
        resource: String,
        ip_address: Option<String>,
    },

    InvalidToken {
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },
}

impl AuditEvent {
    fn summary(&self) -> &'static str {
        match self {
            AuditEvent::LoginSuccess { .. } => "Login successful",
            AuditEvent::LoginFailure { .. } => "Login failed",
            AuditEvent::AdminBootstrapped { .. } => "Bootstrap administrator provisioned",
            AuditEvent::UserCreated { .. } => "User created",
            AuditEvent::PasswordChanged { .. } => "Password changed",
            AuditEvent::UserDeleted { anonymized: false, .. } => "User deleted",
            AuditEvent::UserDeleted { anonymized: true, .. } => "User anonymized",
            AuditEvent::PersonalDataErased { .. } => "Personal data erased",
            AuditEvent::StopsReplaced { .. } => "Driver stops replaced",
            AuditEvent::AccessDenied { .. } => "Access denied",
            AuditEvent::InvalidToken { .. } => "Invalid token",
        }
    }
}

/// Log an audit event
pub fn audit_log(event: &AuditEvent) {
    let event_json = serde_json::to_string(event)
        .unwrap_or_else(|e| format!("{{\"error\":\"Failed to serialize audit event: {e}\"}}"));

    info!(
        target: "audit",
        timestamp = %Utc::now(),
        event = %event_json,
        "{}",
        event.summary()
    );
}

/// Client address and agent for audit records
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientInfo {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            ip_address: extract_ip_address(headers),
            user_agent: extract_user_agent(headers),
        }
    }
}

/// Client IP from proxy headers
///
/// Checks X-Forwarded-For (first hop), CF-Connecting-IP, then X-Real-IP.
pub fn extract_ip_address(headers: &HeaderMap) -> Option<String> {
    if let Some(first) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return Some(first.to_string());
    }

    ["cf-connecting-ip", "x-real-ip"]
        .iter()
        .find_map(|name| headers.get(*name).and_then(|v| v.to_str().ok()))
        .map(|v| v.trim().to_string())
}

pub fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|ua| ua.to_str().ok())
        .map(|s| s.to_string())
}
