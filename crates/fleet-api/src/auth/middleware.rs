//! Request authentication and role gating
//!
//! Authentication runs on every request, public routes included. It never
//! rejects: it resolves the `Authorization` header into an [`AuthOutcome`]
//! and stores it in the request extensions. Rejection happens per route in
//! [`require_roles`], before the handler runs, which also inserts the
//! caller's [`Identity`] for handlers to extract with `Extension<Identity>`.

use super::token::{Claims, TokenCodec, TokenError};
use crate::audit::{audit_log, extract_ip_address, extract_user_agent, AuditEvent};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use fleet_core::Role;
use std::sync::Arc;

/// The authenticated caller
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub user_id: String,
    pub role: Role,
    pub full_name: Option<String>,
    pub email_or_phone: Option<String>,
    pub must_change_password: bool,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            role: claims.role,
            full_name: claims.full_name,
            email_or_phone: claims.email_or_phone,
            must_change_password: claims.must_change_password,
        }
    }
}

/// Result of resolving a request's credential
#[derive(Debug, Clone, PartialEq)]
pub enum AuthOutcome {
    Authenticated(Identity),
    /// No `Authorization` header; anonymous, not an error by itself
    NoCredential,
    InvalidToken(String),
    ExpiredToken,
}

/// Resolve the bearer credential in `headers`
///
/// Pure apart from the token clock.
pub fn resolve(headers: &HeaderMap, codec: &TokenCodec) -> AuthOutcome {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return AuthOutcome::NoCredential;
    };

    let Ok(value) = value.to_str() else {
        return AuthOutcome::InvalidToken("authorization header is not valid text".to_string());
    };

    let token = match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") => token.trim(),
        _ => return AuthOutcome::InvalidToken("expected a Bearer token".to_string()),
    };
    if token.is_empty() {
        return AuthOutcome::InvalidToken("empty bearer token".to_string());
    }

    match codec.verify(token) {
        Ok(claims) => AuthOutcome::Authenticated(claims.into()),
        Err(TokenError::Expired) => AuthOutcome::ExpiredToken,
        Err(err) => AuthOutcome::InvalidToken(err.to_string()),
    }
}

/// Decide whether `outcome` may use a route open to `allowed`
pub fn authorize<'a>(outcome: &'a AuthOutcome, allowed: &[Role]) -> Result<&'a Identity, AppError> {
    match outcome {
        AuthOutcome::Authenticated(identity) if allowed.contains(&identity.role) => Ok(identity),
        AuthOutcome::Authenticated(_) => Err(AppError::Forbidden),
        AuthOutcome::ExpiredToken => Err(AppError::TokenExpired),
        AuthOutcome::NoCredential | AuthOutcome::InvalidToken(_) => Err(AppError::Unauthorized),
    }
}

/// Global middleware: resolve the credential and record the outcome
pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let outcome = resolve(request.headers(), &state.tokens);

    if let AuthOutcome::InvalidToken(reason) = &outcome {
        audit_log(&AuditEvent::InvalidToken {
            reason: reason.clone(),
            ip_address: extract_ip_address(request.headers()),
            user_agent: extract_user_agent(request.headers()),
        });
    }

    request.extensions_mut().insert(outcome);
    next.run(request).await
}

/// Per-route gate; the state is the route's allowed role set
pub async fn require_roles(
    State(allowed): State<&'static [Role]>,
    mut request: Request,
    next: Next,
) -> Response {
    let outcome = request
        .extensions()
        .get::<AuthOutcome>()
        .cloned()
        .unwrap_or(AuthOutcome::NoCredential);

    match authorize(&outcome, allowed) {
        Ok(identity) => {
            let identity = identity.clone();
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(err) => {
            if let AuthOutcome::Authenticated(identity) = &outcome {
                audit_log(&AuditEvent::AccessDenied {
                    user_id: identity.user_id.clone(),
                    role: identity.role,
                    resource: format!("{} {}", request.method(), request.uri().path()),
                    ip_address: extract_ip_address(request.headers()),
                });
            }
            err.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use chrono::Utc;

    const ADMIN_ONLY: &[Role] = &[Role::Admin];
    const ANYONE: &[Role] = &[Role::Admin, Role::Driver];

    fn codec() -> TokenCodec {
        TokenCodec::new("middleware-secret", 3600)
    }

    fn claims(role: Role, exp: i64) -> Claims {
        Claims {
            sub: "u1".to_string(),
            role,
            full_name: None,
            email_or_phone: None,
            must_change_password: false,
            iat: 0,
            exp,
        }
    }

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_no_header_is_anonymous() {
        assert_eq!(resolve(&HeaderMap::new(), &codec()), AuthOutcome::NoCredential);
    }

    #[test]
    fn test_valid_bearer_authenticates() {
        let later = Utc::now().timestamp() + 600;
        let token = codec().sign(&claims(Role::Driver, later)).unwrap();

        match resolve(&headers_with(&format!("Bearer {token}")), &codec()) {
            AuthOutcome::Authenticated(identity) => {
                assert_eq!(identity.user_id, "u1");
                assert_eq!(identity.role, Role::Driver);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        // scheme is case-insensitive
        assert!(matches!(
            resolve(&headers_with(&format!("bearer {token}")), &codec()),
            AuthOutcome::Authenticated(_)
        ));
    }

    #[test]
    fn test_expired_and_invalid() {
        let token = codec().sign(&claims(Role::Driver, 10)).unwrap();
        assert_eq!(
            resolve(&headers_with(&format!("Bearer {token}")), &codec()),
            AuthOutcome::ExpiredToken
        );

        assert!(matches!(
            resolve(&headers_with("Basic dXNlcjpwYXNz"), &codec()),
            AuthOutcome::InvalidToken(_)
        ));
        assert!(matches!(
            resolve(&headers_with("Bearer not.a.token"), &codec()),
            AuthOutcome::InvalidToken(_)
        ));
        assert!(matches!(
            resolve(&headers_with("Bearer "), &codec()),
            AuthOutcome::InvalidToken(_)
        ));
    }

    #[test]
    fn test_authorize_matrix() {
        let driver = AuthOutcome::Authenticated(claims(Role::Driver, 0).into());
        let admin = AuthOutcome::Authenticated(claims(Role::Admin, 0).into());

        assert!(authorize(&driver, ANYONE).is_ok());
        assert!(authorize(&admin, ADMIN_ONLY).is_ok());
        assert!(matches!(authorize(&driver, ADMIN_ONLY), Err(AppError::Forbidden)));
        assert!(matches!(
            authorize(&AuthOutcome::NoCredential, ANYONE),
            Err(AppError::Unauthorized)
        ));
        assert!(matches!(
            authorize(&AuthOutcome::InvalidToken("x".into()), ANYONE),
            Err(AppError::Unauthorized)
        ));
        assert!(matches!(
            authorize(&AuthOutcome::ExpiredToken, ANYONE),
            Err(AppError::TokenExpired)
        ));
    }
}
