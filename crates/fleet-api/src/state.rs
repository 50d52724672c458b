//! Application state management
//!
//! Author: hephaex@gmail.com

use crate::auth::password::{CredentialHasher, PasswordError};
use crate::auth::token::TokenCodec;
use crate::error::AppError;
use crate::locks::DriverLocks;
use crate::repository::{StopRepository, UserRepository};
use fleet_core::config::AppConfig;
use fleet_geocode::{GeocodeOrchestrator, GeocodeProvider, MapboxClient};
use fleet_store::{RestRowStore, RowStore};
use std::sync::Arc;
use std::time::Instant;

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Row store behind every repository
    pub store: Arc<dyn RowStore>,
    pub tokens: TokenCodec,
    pub hasher: CredentialHasher,
    /// Absent when no geocoder token is configured
    geocoder: Option<GeocodeOrchestrator>,
    pub driver_locks: DriverLocks,
    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    /// Assemble state from already-built collaborators
    pub fn new(
        config: AppConfig,
        store: Arc<dyn RowStore>,
        geocode_provider: Option<Arc<dyn GeocodeProvider>>,
    ) -> Result<Self, PasswordError> {
        Ok(Self {
            tokens: TokenCodec::new(&config.auth.jwt_secret, config.auth.token_ttl_secs),
            hasher: CredentialHasher::from_config(&config.auth)?,
            geocoder: geocode_provider.map(GeocodeOrchestrator::new),
            driver_locks: DriverLocks::new(),
            start_time: Instant::now(),
            store,
            config,
        })
    }

    /// Build the production collaborators described by `config`
    pub fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn RowStore> = Arc::new(RestRowStore::new(
            &config.row_store.url,
            &config.row_store.service_key,
        ));

        let provider = config
            .geocoding
            .access_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(|token| {
                Arc::new(MapboxClient::with_base_url(token, &config.geocoding.base_url))
                    as Arc<dyn GeocodeProvider>
            });

        if provider.is_none() {
            tracing::warn!("MAPBOX_ACCESS_TOKEN not set; geocoding routes will answer CONFIG_ERROR");
        }

        Ok(Self::new(config, store, provider)?)
    }

    /// The geocoder, or `CONFIG_ERROR` when it is not configured
    pub fn geocoder(&self) -> Result<&GeocodeOrchestrator, AppError> {
        self.geocoder
            .as_ref()
            .ok_or_else(|| AppError::Config("Geocoding is not configured".to_string()))
    }

    pub fn has_geocoder(&self) -> bool {
        self.geocoder.is_some()
    }

    pub fn users(&self) -> UserRepository {
        UserRepository::new(self.store.clone())
    }

    pub fn stops(&self) -> StopRepository {
        StopRepository::new(self.store.clone())
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
