//! Driver stop repository

use fleet_core::{DriverStop, NewDriverStop, StopStatus, DRIVER_STOPS_TABLE};
use fleet_store::{decode_rows, encode_row, Filter, Order, RowStore, Select, StoreError};
use serde_json::json;
use std::sync::Arc;

#[derive(Clone)]
pub struct StopRepository {
    store: Arc<dyn RowStore>,
}

impl StopRepository {
    pub fn new(store: Arc<dyn RowStore>) -> Self {
        Self { store }
    }

    /// A driver's stops in route order
    pub async fn list_for_driver(&self, driver_id: &str) -> Result<Vec<DriverStop>, StoreError> {
        let rows = self
            .store
            .select(
                DRIVER_STOPS_TABLE,
                &Select::new()
                    .filter(Filter::eq("driver_id", driver_id))
                    .order(Order::asc("sort_order")),
            )
            .await?;
        decode_rows(rows)
    }

    pub async fn delete_for_driver(&self, driver_id: &str) -> Result<(), StoreError> {
        self.store
            .delete(DRIVER_STOPS_TABLE, &[Filter::eq("driver_id", driver_id)])
            .await
    }

    /// Bulk insert in one request
    pub async fn insert_many(&self, stops: &[NewDriverStop]) -> Result<Vec<DriverStop>, StoreError> {
        if stops.is_empty() {
            return Ok(Vec::new());
        }
        let rows = stops
            .iter()
            .map(encode_row)
            .collect::<Result<Vec<_>, _>>()?;
        decode_rows(self.store.insert(DRIVER_STOPS_TABLE, rows).await?)
    }

    /// Set a stop's status
    ///
    /// With `owner` set, only a stop belonging to that driver matches.
    /// `None` means no stop matched in scope.
    pub async fn set_status(
        &self,
        stop_id: &str,
        owner: Option<&str>,
        status: StopStatus,
    ) -> Result<Option<DriverStop>, StoreError> {
        let mut filters = vec![Filter::eq("id", stop_id)];
        if let Some(driver_id) = owner {
            filters.push(Filter::eq("driver_id", driver_id));
        }

        let rows = self
            .store
            .patch(
                DRIVER_STOPS_TABLE,
                &filters,
                json!({ "status": status.as_str() }),
            )
            .await?;
        Ok(decode_rows(rows)?.into_iter().next())
    }
}
