//! User repository

use fleet_core::{NewUser, Role, User, UserStatus, USERS_TABLE};
use fleet_store::{decode_rows, encode_row, Filter, Order, RowStore, Select, StoreError};
use serde::Serialize;
use std::sync::Arc;

/// Partial update of a user row; unset fields are left untouched
#[derive(Debug, Default, Clone, Serialize)]
pub struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    full_name: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email_or_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    must_change_password: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<UserStatus>,
}

impl UserPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` clears the stored name
    pub fn full_name(mut self, full_name: Option<String>) -> Self {
        self.full_name = Some(full_name);
        self
    }

    pub fn email_or_phone(mut self, identifier: impl Into<String>) -> Self {
        self.email_or_phone = Some(identifier.into());
        self
    }

    pub fn password_hash(mut self, hash: impl Into<String>) -> Self {
        self.password_hash = Some(hash.into());
        self
    }

    pub fn must_change_password(mut self, value: bool) -> Self {
        self.must_change_password = Some(value);
        self
    }

    pub fn status(mut self, status: UserStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.email_or_phone.is_none()
            && self.password_hash.is_none()
            && self.must_change_password.is_none()
            && self.status.is_none()
    }
}

#[derive(Clone)]
pub struct UserRepository {
    store: Arc<dyn RowStore>,
}

impl UserRepository {
    pub fn new(store: Arc<dyn RowStore>) -> Self {
        Self { store }
    }

    async fn first(&self, query: Select) -> Result<Option<User>, StoreError> {
        let rows = self.store.select(USERS_TABLE, &query.limit(1)).await?;
        Ok(decode_rows(rows)?.into_iter().next())
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        self.first(Select::new().filter(Filter::eq("id", id))).await
    }

    /// Exact-match lookup on the login identifier
    pub async fn find_by_identifier(&self, identifier: &str) -> Result<Option<User>, StoreError> {
        self.first(Select::new().filter(Filter::eq("email_or_phone", identifier)))
            .await
    }

    /// Whether another user already holds `identifier`
    pub async fn identifier_taken(
        &self,
        identifier: &str,
        except_id: Option<&str>,
    ) -> Result<bool, StoreError> {
        let mut query = Select::new().filter(Filter::eq("email_or_phone", identifier));
        if let Some(id) = except_id {
            query = query.filter(Filter::neq("id", id));
        }
        Ok(self.first(query).await?.is_some())
    }

    pub async fn insert(&self, user: &NewUser) -> Result<User, StoreError> {
        let row = self.store.insert_one(USERS_TABLE, encode_row(user)?).await?;
        serde_json::from_value(row).map_err(|e| StoreError::Decode(e.to_string()))
    }

    /// Apply `patch`; `None` when no row has this id
    pub async fn update(&self, id: &str, patch: &UserPatch) -> Result<Option<User>, StoreError> {
        let rows = self
            .store
            .patch(USERS_TABLE, &[Filter::eq("id", id)], encode_row(patch)?)
            .await?;
        Ok(decode_rows(rows)?.into_iter().next())
    }

    /// Active drivers ordered by name
    pub async fn list_active_drivers(&self) -> Result<Vec<User>, StoreError> {
        let rows = self
            .store
            .select(
                USERS_TABLE,
                &Select::new()
                    .filter(Filter::eq("role", Role::Driver.as_str()))
                    .filter(Filter::eq("status", UserStatus::Active.as_str()))
                    .order(Order::asc("full_name")),
            )
            .await?;
        decode_rows(rows)
    }

    pub async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.store.delete(USERS_TABLE, &[Filter::eq("id", id)]).await
    }
}
