//! Scripted provider for tests
//!
//! Answers from a fixed address table and counts calls, so tests can assert
//! which dispatch path ran and that rejected input never reached the network.

use crate::{GeocodeError, GeocodeProvider};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

pub struct ScriptedProvider {
    features: HashMap<String, Value>,
    batch_limit: usize,
    forward_calls: AtomicUsize,
    batch_calls: AtomicUsize,
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            features: HashMap::new(),
            batch_limit: crate::mapbox::BATCH_LIMIT,
            forward_calls: AtomicUsize::new(0),
            batch_calls: AtomicUsize::new(0),
        }
    }

    /// Resolve `address` to a GeoJSON point
    pub fn with_point(self, address: &str, lat: f64, lng: f64) -> Self {
        self.with_feature(
            address,
            json!({"type": "Feature", "geometry": {"type": "Point", "coordinates": [lng, lat]}}),
        )
    }

    /// Answer `address` with an arbitrary feature
    pub fn with_feature(mut self, address: &str, feature: Value) -> Self {
        self.features.insert(address.to_string(), feature);
        self
    }

    pub fn with_batch_limit(mut self, limit: usize) -> Self {
        self.batch_limit = limit;
        self
    }

    pub fn forward_calls(&self) -> usize {
        self.forward_calls.load(Ordering::SeqCst)
    }

    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GeocodeProvider for ScriptedProvider {
    async fn forward(&self, address: &str) -> Result<Option<Value>, GeocodeError> {
        self.forward_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.features.get(address).cloned())
    }

    async fn batch(&self, addresses: &[String]) -> Result<Vec<Option<Value>>, GeocodeError> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        Ok(addresses
            .iter()
            .map(|a| self.features.get(a).cloned())
            .collect())
    }

    fn batch_limit(&self) -> usize {
        self.batch_limit
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
