//! Single-vs-batch dispatch and per-address aggregation

use crate::extract::extract_coordinates;
use crate::{GeocodeError, GeocodeFailure, GeocodeProvider, Pin};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Overall shape of a geocode run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GeocodeOutcome {
    /// Every address resolved
    Complete,
    /// Some addresses resolved, some did not
    Partial,
    /// No address resolved
    Failed,
}

/// Per-address results, in input order
#[derive(Debug, Clone, Default, Serialize)]
pub struct GeocodeReport {
    pub pins: Vec<Pin>,
    pub failures: Vec<GeocodeFailure>,
}

impl GeocodeReport {
    pub fn outcome(&self) -> GeocodeOutcome {
        match (self.pins.is_empty(), self.failures.is_empty()) {
            (_, true) => GeocodeOutcome::Complete,
            (true, false) => GeocodeOutcome::Failed,
            (false, false) => GeocodeOutcome::Partial,
        }
    }
}

/// Drives a [`GeocodeProvider`]
#[derive(Clone)]
pub struct GeocodeOrchestrator {
    provider: Arc<dyn GeocodeProvider>,
}

impl GeocodeOrchestrator {
    pub fn new(provider: Arc<dyn GeocodeProvider>) -> Self {
        Self { provider }
    }

    /// Geocode an already-normalized address list
    ///
    /// One address goes through the forward endpoint and any failure is an
    /// error. More than one goes through a single batch request and failures
    /// are reported per address.
    ///
    /// # Errors
    ///
    /// * `InvalidInput` - empty list
    /// * `BatchTooLarge` - more addresses than the provider batch ceiling
    /// * `NoMatch` / `Unusable` - single address did not resolve
    /// * `Unusable` - batch result not aligned with the input
    /// * `Upstream` - the provider request itself failed
    pub async fn geocode(&self, addresses: &[String]) -> Result<GeocodeReport, GeocodeError> {
        match addresses {
            [] => Err(GeocodeError::InvalidInput("No addresses provided".to_string())),
            [address] => self.geocode_one(address).await,
            _ => self.geocode_batch(addresses).await,
        }
    }

    async fn geocode_one(&self, address: &str) -> Result<GeocodeReport, GeocodeError> {
        let feature = self
            .provider
            .forward(address)
            .await?
            .ok_or_else(|| GeocodeError::NoMatch {
                address: address.to_string(),
            })?;

        let coords = extract_coordinates(&feature).map_err(GeocodeError::Unusable)?;
        Ok(GeocodeReport {
            pins: vec![Pin {
                address: address.to_string(),
                lat: coords.lat,
                lng: coords.lng,
            }],
            failures: Vec::new(),
        })
    }

    async fn geocode_batch(&self, addresses: &[String]) -> Result<GeocodeReport, GeocodeError> {
        let limit = self.provider.batch_limit();
        if addresses.len() > limit {
            return Err(GeocodeError::BatchTooLarge {
                count: addresses.len(),
                limit,
            });
        }

        let features = self.provider.batch(addresses).await?;
        if features.len() != addresses.len() {
            return Err(GeocodeError::Unusable(format!(
                "{} returned {} results for {} addresses",
                self.provider.name(),
                features.len(),
                addresses.len()
            )));
        }

        let mut report = GeocodeReport::default();

        for (address, feature) in addresses.iter().zip(features) {
            let result = match feature {
                Some(feature) => extract_coordinates(&feature),
                None => Err(format!("No match found for \"{}\"", address)),
            };
            match result {
                Ok(coords) => report.pins.push(Pin {
                    address: address.clone(),
                    lat: coords.lat,
                    lng: coords.lng,
                }),
                Err(message) => report.failures.push(GeocodeFailure {
                    address: address.clone(),
                    message,
                }),
            }
        }

        if report.failures.is_empty() {
            info!(
                provider = self.provider.name(),
                count = addresses.len(),
                "batch geocode complete"
            );
        } else {
            warn!(
                provider = self.provider.name(),
                resolved = report.pins.len(),
                failed = report.failures.len(),
                "batch geocode had failures"
            );
        }
        Ok(report)
    }
}
