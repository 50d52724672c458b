//! Fleet Geocode - Address normalization and geocoding orchestration
//!
//! Turns free-text address input into an ordered list of addresses, picks a
//! single-address or batch strategy against the geocoding provider, and
//! aggregates per-address successes and failures into a [`GeocodeReport`].
//!
//! A batch with some failures is a partial outcome in its own right; it is
//! never collapsed into plain success or plain failure.
//!
//! Author: hephaex@gmail.com

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub mod extract;
pub mod mapbox;
pub mod normalize;
pub mod orchestrator;

#[cfg(any(test, feature = "test-utils"))]
pub mod scripted;

pub use extract::{extract_coordinates, Coordinates};
pub use mapbox::MapboxClient;
pub use normalize::{enforce_limit, normalize_addresses};
pub use orchestrator::{GeocodeOrchestrator, GeocodeOutcome, GeocodeReport};

#[cfg(any(test, feature = "test-utils"))]
pub use scripted::ScriptedProvider;

/// Geocoding errors
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// Input was not a string or an array of strings, or held no addresses
    #[error("{0}")]
    InvalidInput(String),

    /// More addresses than the caller allows per request
    #[error("Too many addresses: {count} provided, maximum is {max}")]
    TooMany { count: usize, max: usize },

    /// More addresses than the provider accepts in one batch
    #[error("Batch of {count} addresses exceeds the geocoder limit of {limit}")]
    BatchTooLarge { count: usize, limit: usize },

    /// Transport failure or non-2xx answer from the provider
    #[error("Geocoder request failed: {message}")]
    Upstream {
        status: Option<u16>,
        message: String,
    },

    /// Single-address lookup produced no match
    #[error("No match found for \"{address}\"")]
    NoMatch { address: String },

    /// Provider answered with data no extractor understands
    #[error("Geocoder returned unusable data: {0}")]
    Unusable(String),
}

/// A successfully resolved address
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pin {
    pub address: String,
    pub lat: f64,
    pub lng: f64,
}

/// An address the provider could not resolve
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeocodeFailure {
    pub address: String,
    pub message: String,
}

/// Forward-geocoding provider
///
/// Implementations return raw features; coordinate extraction and
/// aggregation belong to the orchestrator.
#[async_trait]
pub trait GeocodeProvider: Send + Sync {
    /// Look up one address, returning its best feature if any
    async fn forward(&self, address: &str) -> Result<Option<Value>, GeocodeError>;

    /// Look up many addresses in one request; the result is index-aligned
    /// with `addresses`
    async fn batch(&self, addresses: &[String]) -> Result<Vec<Option<Value>>, GeocodeError>;

    /// Largest batch the provider accepts
    fn batch_limit(&self) -> usize;

    /// Provider name for logging
    fn name(&self) -> &str;
}
