//! Authentication and authorization module
//!
//! - Token signing and verification (HMAC-SHA256)
//! - Password hashing with Argon2
//! - Middleware resolving bearer tokens and gating routes by role
//! - Login, bootstrap provisioning and password changes

pub mod middleware;
pub mod password;
pub mod service;
pub mod token;

pub use middleware::{authenticate, authorize, require_roles, resolve, AuthOutcome, Identity};
pub use password::{validate_password_policy, CredentialHasher, PasswordError};
pub use service::AuthService;
pub use token::{Claims, TokenCodec, TokenError};
