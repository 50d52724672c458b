//! Authentication service
//!
//! Login (with lazy bootstrap of the first administrator), password change
//! and current-password verification.

use super::middleware::Identity;
use super::password::validate_password_policy;
use crate::audit::{audit_log, AuditEvent, ClientInfo};
use crate::error::{AppError, OrFail};
use crate::repository::UserPatch;
use crate::state::AppState;
use fleet_core::{NewUser, Role, User};
use tracing::{info, warn};

/// Authentication service bound to the shared state
pub struct AuthService<'a> {
    state: &'a AppState,
}

impl<'a> AuthService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    pub fn issue_token(&self, user: &User) -> Result<String, AppError> {
        Ok(self.state.tokens.issue(user)?)
    }

    /// Authenticate by identifier and password
    ///
    /// Unknown identifiers and wrong passwords are indistinguishable to the
    /// caller. The password is checked before account status so an inactive
    /// account is only revealed to someone holding its password.
    pub async fn login(
        &self,
        identifier: &str,
        password: &str,
        client: &ClientInfo,
    ) -> Result<(String, User), AppError> {
        let identifier = identifier.trim();
        if identifier.is_empty() || password.is_empty() {
            return Err(AppError::InvalidInput(
                "Email/phone and password are required".to_string(),
            ));
        }

        let users = self.state.users();
        let mut user = users
            .find_by_identifier(identifier)
            .await
            .or_fail("LOGIN_FAILED")?;

        if user.is_none() && self.is_bootstrap_identifier(identifier) {
            user = Some(self.provision_bootstrap_admin().await?);
        }

        let Some(user) = user else {
            self.login_failed(identifier, "unknown identifier", client);
            return Err(AppError::InvalidCredentials);
        };

        let valid = self
            .state
            .hasher
            .verify(password, &user.password_hash)
            .await?;
        if !valid {
            self.login_failed(identifier, "wrong password", client);
            return Err(AppError::InvalidCredentials);
        }

        if !user.is_active() {
            self.login_failed(identifier, "inactive account", client);
            return Err(AppError::UserInactive);
        }

        let token = self.issue_token(&user)?;
        audit_log(&AuditEvent::LoginSuccess {
            user_id: user.id.clone(),
            identifier: user.email_or_phone.clone(),
            ip_address: client.ip_address.clone(),
            user_agent: client.user_agent.clone(),
        });

        Ok((token, user))
    }

    /// Exact match, same as the identifier lookup
    fn is_bootstrap_identifier(&self, identifier: &str) -> bool {
        let reserved = self.state.config.auth.bootstrap_admin_identifier.trim();
        !reserved.is_empty() && identifier == reserved
    }

    /// Create the default administrator
    ///
    /// A concurrent login may win the insert; the row it created is used.
    async fn provision_bootstrap_admin(&self) -> Result<User, AppError> {
        let auth = &self.state.config.auth;
        let identifier = auth.bootstrap_admin_identifier.trim();
        let hash = self.state.hasher.hash(&auth.bootstrap_admin_password).await?;

        let new_admin = NewUser::new(
            Some("Administrator".to_string()),
            identifier,
            hash,
            Role::Admin,
        )
        .must_change_password(true);

        let users = self.state.users();
        match users.insert(&new_admin).await {
            Ok(admin) => {
                info!(user_id = %admin.id, "bootstrap administrator provisioned");
                audit_log(&AuditEvent::AdminBootstrapped {
                    user_id: admin.id.clone(),
                    identifier: admin.email_or_phone.clone(),
                });
                Ok(admin)
            }
            Err(err) => {
                warn!(error = %err, "bootstrap insert failed, re-reading");
                users
                    .find_by_identifier(identifier)
                    .await
                    .or_fail("LOGIN_FAILED")?
                    .ok_or_else(|| AppError::operation("LOGIN_FAILED", err))
            }
        }
    }

    fn login_failed(&self, identifier: &str, reason: &str, client: &ClientInfo) {
        audit_log(&AuditEvent::LoginFailure {
            identifier: identifier.to_string(),
            reason: reason.to_string(),
            ip_address: client.ip_address.clone(),
            user_agent: client.user_agent.clone(),
        });
    }

    /// Check `password` against the stored hash of `user_id`
    pub async fn verify_current_password(
        &self,
        user_id: &str,
        password: &str,
        code: &'static str,
    ) -> Result<User, AppError> {
        let user = self
            .state
            .users()
            .find_by_id(user_id)
            .await
            .or_fail(code)?
            .ok_or(AppError::UserNotFound)?;

        if !self.state.hasher.verify(password, &user.password_hash).await? {
            return Err(AppError::InvalidPassword);
        }
        Ok(user)
    }

    /// Change the caller's own password and re-issue their token
    pub async fn change_password(
        &self,
        identity: &Identity,
        current_password: &str,
        new_password: &str,
    ) -> Result<(String, User), AppError> {
        if current_password.is_empty() {
            return Err(AppError::InvalidInput(
                "Current password is required".to_string(),
            ));
        }
        validate_password_policy(new_password, self.state.config.auth.password_min_length)?;

        self.verify_current_password(&identity.user_id, current_password, "CHANGE_PASSWORD_FAILED")
            .await?;

        let hash = self.state.hasher.hash(new_password).await?;
        let user = self
            .state
            .users()
            .update(
                &identity.user_id,
                &UserPatch::new()
                    .password_hash(hash)
                    .must_change_password(false),
            )
            .await
            .or_fail("CHANGE_PASSWORD_FAILED")?
            .ok_or(AppError::UserNotFound)?;

        audit_log(&AuditEvent::PasswordChanged {
            user_id: user.id.clone(),
            changed_by: identity.user_id.clone(),
            must_change_password: false,
        });

        let token = self.issue_token(&user)?;
        Ok((token, user))
    }
}
