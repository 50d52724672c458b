//! Password hashing and verification using Argon2id
//!
//! Hashing is CPU- and memory-bound, so the async entry points run it on the
//! blocking pool. The PHC string carries algorithm, parameters and salt, so
//! verification needs only the stored hash.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use fleet_core::AuthConfig;
use rand::rngs::OsRng;
use thiserror::Error;

/// Password hashing errors
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    HashingFailed(String),

    #[error("Password must be at least {min_length} characters")]
    TooShort { min_length: usize },
}

/// Argon2id hasher with configured cost parameters
#[derive(Debug, Clone)]
pub struct CredentialHasher {
    params: Params,
}

impl CredentialHasher {
    /// Create a hasher from raw Argon2 costs
    pub fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self, PasswordError> {
        let params = Params::new(memory_kib, iterations, parallelism, Some(32))
            .map_err(|e| PasswordError::HashingFailed(e.to_string()))?;
        Ok(Self { params })
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self, PasswordError> {
        Self::new(
            config.hash_memory_kib,
            config.hash_iterations,
            config.hash_parallelism,
        )
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash on the current thread
    ///
    /// Two hashes of the same password differ because each gets a fresh salt.
    pub fn hash_blocking(&self, password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| PasswordError::HashingFailed(e.to_string()))
    }

    /// Hash on the blocking pool
    pub async fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let hasher = self.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.hash_blocking(&password))
            .await
            .map_err(|e| PasswordError::HashingFailed(e.to_string()))?
    }

    /// Verify on the blocking pool
    ///
    /// A malformed stored hash verifies as `false`; only a failure of the
    /// blocking task itself is an error.
    pub async fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordError> {
        let password = password.to_string();
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || verify_blocking(&password, &hash))
            .await
            .map_err(|e| PasswordError::HashingFailed(e.to_string()))
    }
}

/// Verify a password against a PHC string on the current thread
pub fn verify_blocking(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Enforce the minimum length policy, counted in characters
pub fn validate_password_policy(password: &str, min_length: usize) -> Result<(), PasswordError> {
    if password.chars().count() < min_length {
        return Err(PasswordError::TooShort { min_length });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_hasher() -> CredentialHasher {
        CredentialHasher::new(1024, 1, 1).unwrap()
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = fast_hasher();
        let hash = hasher.hash_blocking("correct horse").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_blocking("correct horse", &hash));
        assert!(!verify_blocking("wrong horse", &hash));
    }

    #[test]
    fn test_hashes_are_salted() {
        let hasher = fast_hasher();
        let a = hasher.hash_blocking("same-password").unwrap();
        let b = hasher.hash_blocking("same-password").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_hash_is_false() {
        assert!(!verify_blocking("anything", ""));
        assert!(!verify_blocking("anything", "not-a-phc-string"));
        assert!(!verify_blocking("anything", "!deleted"));
    }

    #[test]
    fn test_invalid_params_rejected() {
        assert!(CredentialHasher::new(0, 0, 0).is_err());
    }

    #[tokio::test]
    async fn test_async_round_trip() {
        let hasher = fast_hasher();
        let hash = hasher.hash("async-secret").await.unwrap();
        assert!(hasher.verify("async-secret", &hash).await.unwrap());
        assert!(!hasher.verify("nope", &hash).await.unwrap());
    }

    #[test]
    fn test_password_policy() {
        assert!(validate_password_policy("12345678", 8).is_ok());
        assert!(matches!(
            validate_password_policy("1234567", 8),
            Err(PasswordError::TooShort { min_length: 8 })
        ));
        // multi-byte characters count once
        assert!(validate_password_policy("pässwörd", 8).is_ok());
    }
}
