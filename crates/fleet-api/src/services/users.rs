//! User administration and self-service account operations

use crate::audit::{audit_log, AuditEvent};
use crate::auth::password::validate_password_policy;
use crate::error::{AppError, OrFail};
use crate::repository::UserPatch;
use crate::state::AppState;
use fleet_core::{NewUser, Role, User, UserStatus};
use tracing::{info, warn};
use uuid::Uuid;

/// Stored in place of the password hash of an anonymized account; never a
/// valid PHC string, so no password verifies against it
pub const DELETED_PASSWORD_HASH: &str = "!deleted";

/// Input for a new account
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub full_name: Option<String>,
    pub email_or_phone: String,
    pub password: String,
    pub role: Role,
}

/// How a deletion was carried out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionOutcome {
    /// Stops and user row physically removed
    Deleted,
    /// Hard delete failed; personal fields nulled and the account marked deleted
    Anonymized,
}

impl DeletionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeletionOutcome::Deleted => "deleted",
            DeletionOutcome::Anonymized => "anonymized",
        }
    }
}

pub struct UserService<'a> {
    state: &'a AppState,
}

fn normalize_name(full_name: Option<String>) -> Option<String> {
    full_name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
}

impl<'a> UserService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    async fn require_user(&self, user_id: &str, code: &'static str) -> Result<User, AppError> {
        self.state
            .users()
            .find_by_id(user_id)
            .await
            .or_fail(code)?
            .ok_or(AppError::UserNotFound)
    }

    /// Create an account; it must change its password on first login
    pub async fn create(&self, account: NewAccount, created_by: &str) -> Result<User, AppError> {
        let identifier = account.email_or_phone.trim();
        if identifier.is_empty() {
            return Err(AppError::InvalidInput("Email or phone is required".to_string()));
        }
        validate_password_policy(&account.password, self.state.config.auth.password_min_length)?;

        let users = self.state.users();
        if users
            .identifier_taken(identifier, None)
            .await
            .or_fail("CREATE_USER_FAILED")?
        {
            return Err(AppError::UserExists);
        }

        let hash = self.state.hasher.hash(&account.password).await?;
        let new_user = NewUser::new(
            normalize_name(account.full_name),
            identifier,
            hash,
            account.role,
        )
        .must_change_password(true);

        let user = users
            .insert(&new_user)
            .await
            .map_err(|err| match err.status() {
                Some(409) => AppError::UserExists,
                _ => AppError::operation("CREATE_USER_FAILED", err),
            })?;

        audit_log(&AuditEvent::UserCreated {
            user_id: user.id.clone(),
            role: user.role,
            created_by: created_by.to_string(),
        });
        Ok(user)
    }

    /// Replace a user's password
    ///
    /// An admin reset forces a change at next login; an admin update does not.
    pub async fn set_password(
        &self,
        user_id: &str,
        new_password: &str,
        must_change_password: bool,
        changed_by: &str,
        code: &'static str,
    ) -> Result<User, AppError> {
        validate_password_policy(new_password, self.state.config.auth.password_min_length)?;
        self.require_user(user_id, code).await?;

        let hash = self.state.hasher.hash(new_password).await?;
        let user = self
            .state
            .users()
            .update(
                user_id,
                &UserPatch::new()
                    .password_hash(hash)
                    .must_change_password(must_change_password),
            )
            .await
            .or_fail(code)?
            .ok_or(AppError::UserNotFound)?;

        audit_log(&AuditEvent::PasswordChanged {
            user_id: user.id.clone(),
            changed_by: changed_by.to_string(),
            must_change_password,
        });
        Ok(user)
    }

    /// Update name and/or identifier
    ///
    /// `full_name` of `Some("")` clears the name; the identifier must stay
    /// unique across users.
    pub async fn update_profile(
        &self,
        user_id: &str,
        full_name: Option<String>,
        email_or_phone: Option<String>,
        code: &'static str,
    ) -> Result<User, AppError> {
        let mut patch = UserPatch::new();
        if let Some(name) = full_name {
            patch = patch.full_name(normalize_name(Some(name)));
        }

        let identifier = email_or_phone.map(|id| id.trim().to_string());
        if let Some(identifier) = &identifier {
            if identifier.is_empty() {
                return Err(AppError::InvalidInput(
                    "Email or phone cannot be empty".to_string(),
                ));
            }
        }

        let existing = self.require_user(user_id, code).await?;
        if patch.is_empty() && identifier.is_none() {
            return Ok(existing);
        }

        if let Some(identifier) = identifier {
            if identifier != existing.email_or_phone
                && self
                    .state
                    .users()
                    .identifier_taken(&identifier, Some(user_id))
                    .await
                    .or_fail(code)?
            {
                return Err(AppError::UserExists);
            }
            patch = patch.email_or_phone(identifier);
        }

        self.state
            .users()
            .update(user_id, &patch)
            .await
            .map_err(|err| match err.status() {
                Some(409) => AppError::UserExists,
                _ => AppError::operation(code, err),
            })?
            .ok_or(AppError::UserNotFound)
    }

    /// Delete a user and their stops, anonymizing when deletion is blocked
    pub async fn delete_user(
        &self,
        user_id: &str,
        deleted_by: &str,
        code: &'static str,
    ) -> Result<DeletionOutcome, AppError> {
        self.require_user(user_id, code).await?;

        let outcome = match self.hard_delete(user_id).await {
            Ok(()) => {
                info!(user_id, "user deleted");
                DeletionOutcome::Deleted
            }
            Err(err) => {
                warn!(user_id, error = %err, "hard delete failed, anonymizing");
                self.anonymize(user_id).await.or_fail(code)?;
                DeletionOutcome::Anonymized
            }
        };

        audit_log(&AuditEvent::UserDeleted {
            user_id: user_id.to_string(),
            deleted_by: deleted_by.to_string(),
            anonymized: outcome == DeletionOutcome::Anonymized,
        });
        Ok(outcome)
    }

    async fn hard_delete(&self, user_id: &str) -> Result<(), fleet_store::StoreError> {
        self.state.stops().delete_for_driver(user_id).await?;
        self.state.users().delete(user_id).await
    }

    async fn anonymize(&self, user_id: &str) -> Result<(), String> {
        let patch = UserPatch::new()
            .full_name(None)
            .email_or_phone(format!("deleted-{}@deleted.invalid", Uuid::new_v4()))
            .password_hash(DELETED_PASSWORD_HASH)
            .must_change_password(false)
            .status(UserStatus::Deleted);

        match self.state.users().update(user_id, &patch).await {
            Ok(Some(_)) => Ok(()),
            Ok(None) => Err(format!("no user row {user_id} to anonymize")),
            Err(err) => Err(err.to_string()),
        }
    }

    /// Null the caller's personal fields, keeping the account usable
    pub async fn erase_personal_data(&self, user_id: &str) -> Result<User, AppError> {
        let user = self
            .state
            .users()
            .update(user_id, &UserPatch::new().full_name(None))
            .await
            .or_fail("DELETE_DATA_FAILED")?
            .ok_or(AppError::UserNotFound)?;

        audit_log(&AuditEvent::PersonalDataErased {
            user_id: user_id.to_string(),
        });
        Ok(user)
    }

    pub async fn get(&self, user_id: &str) -> Result<User, AppError> {
        self.require_user(user_id, "GET_PROFILE_FAILED").await
    }

    pub async fn list_drivers(&self) -> Result<Vec<User>, AppError> {
        self.state
            .users()
            .list_active_drivers()
            .await
            .or_fail("LIST_DRIVERS_FAILED")
    }
}
