//! Bearer token signing and verification
//!
//! Tokens are compact HS256 JWTs built directly on HMAC-SHA256:
//! `base64url(header) "." base64url(claims) "." base64url(mac)`, with the
//! constant header `{"alg":"HS256","typ":"JWT"}` and no padding. Signatures are
//! compared in constant time. Tokens are not stored server-side and there is
//! no revocation list; expiry is the only lifetime bound.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use fleet_core::{Role, User};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

/// Signed token payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - user ID
    pub sub: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_or_phone: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub must_change_password: bool,
    /// Issued at (Unix seconds)
    pub iat: i64,
    /// Expiration (Unix seconds)
    pub exp: i64,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl Claims {
    /// Claims describing `user`, valid for `ttl_secs` from `issued_at`
    pub fn for_user(user: &User, issued_at: i64, ttl_secs: i64) -> Self {
        Self {
            sub: user.id.clone(),
            role: user.role,
            full_name: user.full_name.clone(),
            email_or_phone: Some(user.email_or_phone.clone()),
            must_change_password: user.must_change_password,
            iat: issued_at,
            exp: issued_at + ttl_secs,
        }
    }
}

/// Token failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Malformed token: {0}")]
    Malformed(String),

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Token has expired")]
    Expired,

    #[error("Failed to encode token: {0}")]
    Encoding(String),
}

fn mac(secret: &[u8]) -> Result<HmacSha256, TokenError> {
    HmacSha256::new_from_slice(secret).map_err(|e| TokenError::Encoding(e.to_string()))
}

/// Sign `claims` with `secret`
pub fn sign(claims: &Claims, secret: &[u8]) -> Result<String, TokenError> {
    let payload = serde_json::to_vec(claims).map_err(|e| TokenError::Encoding(e.to_string()))?;
    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(HEADER),
        URL_SAFE_NO_PAD.encode(payload)
    );

    let signature = mac(secret)?
        .chain_update(signing_input.as_bytes())
        .finalize()
        .into_bytes();

    Ok(format!(
        "{signing_input}.{}",
        URL_SAFE_NO_PAD.encode(signature)
    ))
}

/// Verify `token` against `secret` at time `now` (Unix seconds)
///
/// The signature is checked before the payload is interpreted, so a forged
/// token never reaches JSON parsing.
///
/// # Errors
///
/// * `Malformed` - wrong segment count, bad encoding, non-JSON payload, missing subject
/// * `InvalidSignature` - MAC mismatch (wrong secret or tampered token)
/// * `Expired` - valid token whose `exp` is not after `now`
pub fn verify(token: &str, secret: &[u8], now: i64) -> Result<Claims, TokenError> {
    let mut segments = token.split('.');
    let (Some(header), Some(payload), Some(signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(TokenError::Malformed("expected three segments".to_string()));
    };

    let signature = URL_SAFE_NO_PAD
        .decode(signature)
        .map_err(|_| TokenError::Malformed("signature is not base64url".to_string()))?;

    let mut mac = mac(secret)?;
    mac.update(header.as_bytes());
    mac.update(b".");
    mac.update(payload.as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| TokenError::InvalidSignature)?;

    let header: serde_json::Value = decode_segment(header, "header")?;
    if header.get("alg").and_then(|a| a.as_str()) != Some("HS256") {
        return Err(TokenError::Malformed("unsupported algorithm".to_string()));
    }

    let claims: Claims = decode_segment(payload, "payload")?;
    if claims.sub.trim().is_empty() {
        return Err(TokenError::Malformed("missing subject".to_string()));
    }
    if claims.exp <= now {
        return Err(TokenError::Expired);
    }

    Ok(claims)
}

fn decode_segment<T: serde::de::DeserializeOwned>(
    segment: &str,
    name: &str,
) -> Result<T, TokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| TokenError::Malformed(format!("{name} is not base64url")))?;
    serde_json::from_slice(&bytes).map_err(|e| TokenError::Malformed(format!("{name}: {e}")))
}

/// Token codec bound to the configured secret and lifetime
#[derive(Clone)]
pub struct TokenCodec {
    secret: Vec<u8>,
    ttl_secs: i64,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("secret", &"<redacted>")
            .field("ttl_secs", &self.ttl_secs)
            .finish()
    }
}

impl TokenCodec {
    pub fn new(secret: impl AsRef<[u8]>, ttl_secs: u64) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            ttl_secs: i64::try_from(ttl_secs).unwrap_or(i64::MAX / 2),
        }
    }

    /// Issue a token for `user`, valid from now
    pub fn issue(&self, user: &User) -> Result<String, TokenError> {
        let claims = Claims::for_user(user, Utc::now().timestamp(), self.ttl_secs);
        sign(&claims, &self.secret)
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        sign(claims, &self.secret)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, Utc::now().timestamp())
    }

    pub fn verify_at(&self, token: &str, now: i64) -> Result<Claims, TokenError> {
        verify(token, &self.secret, now)
    }
}
