//! Driver stop assignment and completion

use super::geocode_failure_details;
use crate::audit::{audit_log, AuditEvent};
use crate::auth::Identity;
use crate::error::{AppError, OrFail};
use crate::state::AppState;
use fleet_core::{DriverStop, NewDriverStop, Role, StopStatus, User};
use fleet_geocode::{enforce_limit, normalize_addresses};
use serde_json::Value;
use tracing::{info, warn};

/// Stop status transition requested through the API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopAction {
    Complete,
    Undo,
}

impl StopAction {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "complete" => Some(StopAction::Complete),
            "undo" => Some(StopAction::Undo),
            _ => None,
        }
    }

    pub fn target_status(self) -> StopStatus {
        match self {
            StopAction::Complete => StopStatus::Complete,
            StopAction::Undo => StopStatus::Pending,
        }
    }
}

pub struct StopService<'a> {
    state: &'a AppState,
}

impl<'a> StopService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// The active driver with this id, or `DRIVER_NOT_FOUND`
    pub async fn require_driver(&self, driver_id: &str, code: &'static str) -> Result<User, AppError> {
        match self
            .state
            .users()
            .find_by_id(driver_id)
            .await
            .or_fail(code)?
        {
            Some(user) if user.is_driver() && user.is_active() => Ok(user),
            _ => Err(AppError::DriverNotFound),
        }
    }

    /// Replace a driver's whole stop list
    ///
    /// Input is validated and every address geocoded before anything is
    /// written. Any geocode failure aborts with the stored stops untouched.
    /// The delete and insert then run under the driver's lock and stops get
    /// `sort_order` 0..n in input order.
    pub async fn replace(
        &self,
        driver_id: &str,
        raw_addresses: &Value,
        replaced_by: &str,
    ) -> Result<Vec<DriverStop>, AppError> {
        let driver_id = driver_id.trim();
        if driver_id.is_empty() {
            return Err(AppError::InvalidInput("driverId is required".to_string()));
        }
        let addresses = normalize_addresses(raw_addresses)?;
        enforce_limit(&addresses, self.state.config.geocoding.max_addresses)?;

        let geocoder = self.state.geocoder()?;
        self.require_driver(driver_id, "REPLACE_STOPS_FAILED").await?;

        let report = geocoder.geocode(&addresses).await?;
        if !report.failures.is_empty() {
            warn!(
                driver_id,
                failed = report.failures.len(),
                total = addresses.len(),
                "stop replacement aborted by geocode failures"
            );
            return Err(AppError::geocode(
                format!(
                    "{} of {} addresses could not be geocoded",
                    report.failures.len(),
                    addresses.len()
                ),
                Some(geocode_failure_details(&report.failures)),
            ));
        }

        let new_stops: Vec<NewDriverStop> = report
            .pins
            .iter()
            .zip(0..)
            .map(|(pin, sort_order)| {
                NewDriverStop::pending(driver_id, &pin.address, Some((pin.lat, pin.lng)), sort_order)
            })
            .collect();

        let stops = self.state.stops();
        let _guard = self.state.driver_locks.lock(driver_id).await;

        stops
            .delete_for_driver(driver_id)
            .await
            .or_fail("REPLACE_STOPS_FAILED")?;
        let mut inserted = stops
            .insert_many(&new_stops)
            .await
            .or_fail("REPLACE_STOPS_FAILED")?;
        inserted.sort_by_key(|stop| stop.sort_order);

        info!(driver_id, count = inserted.len(), "driver stops replaced");
        audit_log(&AuditEvent::StopsReplaced {
            driver_id: driver_id.to_string(),
            count: inserted.len(),
            replaced_by: replaced_by.to_string(),
        });
        Ok(inserted)
    }

    /// Stops of the driver a caller may see
    ///
    /// Drivers always get their own list; admins must name a driver.
    pub async fn list_for(
        &self,
        identity: &Identity,
        requested_driver: Option<&str>,
    ) -> Result<Vec<DriverStop>, AppError> {
        let driver_id = match identity.role {
            Role::Driver => identity.user_id.clone(),
            Role::Admin => {
                let driver_id = requested_driver
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .ok_or_else(|| AppError::InvalidInput("driverId is required".to_string()))?;
                self.require_driver(driver_id, "LIST_STOPS_FAILED").await?;
                driver_id.to_string()
            }
        };

        self.state
            .stops()
            .list_for_driver(&driver_id)
            .await
            .or_fail("LIST_STOPS_FAILED")
    }

    /// Apply `action` to a stop in the caller's scope
    ///
    /// Drivers reach only their own stops; a stop outside that scope is
    /// reported exactly like a missing one.
    pub async fn update_status(
        &self,
        identity: &Identity,
        stop_id: &str,
        action: StopAction,
    ) -> Result<DriverStop, AppError> {
        let owner = match identity.role {
            Role::Driver => Some(identity.user_id.as_str()),
            Role::Admin => None,
        };

        self.state
            .stops()
            .set_status(stop_id, owner, action.target_status())
            .await
            .or_fail("UPDATE_STOP_FAILED")?
            .ok_or(AppError::StopNotFound)
    }
}
