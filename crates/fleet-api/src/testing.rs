//! Test helpers: an in-memory application with cheap password hashing

use crate::{create_router, AppState};
use async_trait::async_trait;
use axum::Router;
use fleet_core::config::AppConfig;
use fleet_geocode::{GeocodeProvider, ScriptedProvider};
use fleet_store::{Filter, InMemoryRowStore, RowStore, Select, StoreError};
use serde_json::Value;
use std::sync::Arc;

pub const TEST_JWT_SECRET: &str = "integration-test-secret";

/// Valid configuration with argon2 cost turned down for test speed
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.auth.jwt_secret = TEST_JWT_SECRET.to_string();
    config.auth.hash_memory_kib = 1024;
    config.auth.hash_iterations = 1;
    config.row_store.url = "http://row-store.invalid".to_string();
    config.row_store.service_key = "test-service-key".to_string();
    config.server.cors_origins = vec!["https://dispatch.example.com".to_string()];
    config
}

/// In-memory store that suspends once before every call, so concurrent
/// requests can interleave between store calls as they would over the network
pub struct YieldingRowStore {
    inner: Arc<InMemoryRowStore>,
}

impl YieldingRowStore {
    pub fn new(inner: Arc<InMemoryRowStore>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl RowStore for YieldingRowStore {
    async fn select(&self, table: &str, query: &Select) -> Result<Vec<Value>, StoreError> {
        tokio::task::yield_now().await;
        self.inner.select(table, query).await
    }

    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>, StoreError> {
        tokio::task::yield_now().await;
        self.inner.insert(table, rows).await
    }

    async fn patch(
        &self,
        table: &str,
        filters: &[Filter],
        changes: Value,
    ) -> Result<Vec<Value>, StoreError> {
        tokio::task::yield_now().await;
        self.inner.patch(table, filters, changes).await
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<(), StoreError> {
        tokio::task::yield_now().await;
        self.inner.delete(table, filters).await
    }
}

/// Application under test with handles to its collaborators
pub struct TestApp {
    pub state: Arc<AppState>,
    pub store: Arc<InMemoryRowStore>,
    pub geocoder: Option<Arc<ScriptedProvider>>,
}

impl TestApp {
    pub fn new(geocoder: Option<ScriptedProvider>) -> Self {
        Self::with_config(test_config(), geocoder)
    }

    pub fn with_config(config: AppConfig, geocoder: Option<ScriptedProvider>) -> Self {
        let store = Arc::new(InMemoryRowStore::new());
        Self::build(config, store.clone(), store, geocoder)
    }

    /// Same as [`TestApp::new`], but every store call suspends first
    pub fn yielding(geocoder: Option<ScriptedProvider>) -> Self {
        let store = Arc::new(InMemoryRowStore::new());
        let yielding = Arc::new(YieldingRowStore::new(store.clone()));
        Self::build(test_config(), yielding, store, geocoder)
    }

    fn build(
        config: AppConfig,
        backend: Arc<dyn RowStore>,
        store: Arc<InMemoryRowStore>,
        geocoder: Option<ScriptedProvider>,
    ) -> Self {
        let geocoder = geocoder.map(Arc::new);
        let provider = geocoder
            .clone()
            .map(|provider| provider as Arc<dyn GeocodeProvider>);
        let state = AppState::new(config, backend, provider)
            .expect("test hashing parameters are valid");

        Self {
            state: Arc::new(state),
            store,
            geocoder,
        }
    }

    /// A fresh router over the shared state
    pub fn router(&self) -> Router {
        create_router(self.state.clone())
    }
}
