//! Business operations composed from repositories, hasher, tokens and geocoder

pub mod stops;
pub mod users;

pub use stops::{StopAction, StopService};
pub use users::{DeletionOutcome, NewAccount, UserService};

use fleet_geocode::GeocodeFailure;
use serde_json::{json, Value};

/// Per-address failures as the `details` of an error response
pub fn geocode_failure_details(failures: &[GeocodeFailure]) -> Value {
    Value::Array(
        failures
            .iter()
            .map(|f| json!({ "address": f.address, "message": f.message }))
            .collect(),
    )
}
