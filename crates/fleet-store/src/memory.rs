//! In-memory row store for tests
//!
//! Mirrors the REST store's observable behaviour closely enough for handler
//! tests: filters, ordering, limits, merge-patch and representation returns.
//! Individual tables can be configured to reject deletes, which is how a
//! foreign-key violation from the real store is simulated.

use crate::{require_filters, Filter, RowStore, Select, StoreError};
use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Default)]
pub struct InMemoryRowStore {
    tables: Mutex<HashMap<String, Vec<Value>>>,
    rejected_deletes: Mutex<HashSet<String>>,
}

impl InMemoryRowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every delete on `table` fail with a 409, like a blocked cascade
    pub fn reject_deletes_on(&self, table: &str) {
        self.rejected().insert(table.to_string());
    }

    pub fn allow_deletes_on(&self, table: &str) {
        self.rejected().remove(table);
    }

    /// Snapshot of every row in `table`, in insertion order
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.tables().get(table).cloned().unwrap_or_default()
    }

    fn tables(&self) -> MutexGuard<'_, HashMap<String, Vec<Value>>> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn rejected(&self) -> MutexGuard<'_, HashSet<String>> {
        self.rejected_deletes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn matches_all(filters: &[Filter], row: &Value) -> bool {
    filters.iter().all(|f| f.matches(row))
}

fn compare_cells(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        // Nulls sort last, as in PostgreSQL ascending order
        (None | Some(Value::Null), _) => Ordering::Greater,
        (_, None | Some(Value::Null)) => Ordering::Less,
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

#[async_trait]
impl RowStore for InMemoryRowStore {
    async fn select(&self, table: &str, query: &Select) -> Result<Vec<Value>, StoreError> {
        let mut rows: Vec<Value> = self
            .tables()
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| matches_all(&query.filters, row))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let ord = compare_cells(a.get(&order.column), b.get(&order.column));
                if order.ascending {
                    ord
                } else {
                    ord.reverse()
                }
            });
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>, StoreError> {
        if let Some(bad) = rows.iter().find(|r| !r.is_object()) {
            return Err(StoreError::Http {
                status: 400,
                body: format!("expected object rows, got {bad}"),
            });
        }
        self.tables()
            .entry(table.to_string())
            .or_default()
            .extend(rows.iter().cloned());
        Ok(rows)
    }

    async fn patch(
        &self,
        table: &str,
        filters: &[Filter],
        changes: Value,
    ) -> Result<Vec<Value>, StoreError> {
        require_filters("patch", table, filters)?;
        let Value::Object(changes) = changes else {
            return Err(StoreError::Http {
                status: 400,
                body: "patch body must be an object".to_string(),
            });
        };

        let mut tables = self.tables();
        let mut updated = Vec::new();
        if let Some(rows) = tables.get_mut(table) {
            for row in rows.iter_mut().filter(|row| matches_all(filters, row)) {
                if let Value::Object(fields) = row {
                    for (key, value) in &changes {
                        fields.insert(key.clone(), value.clone());
                    }
                }
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<(), StoreError> {
        require_filters("delete", table, filters)?;
        if self.rejected().contains(table) {
            return Err(StoreError::Http {
                status: 409,
                body: format!("delete on {table} violates foreign key constraint"),
            });
        }

        if let Some(rows) = self.tables().get_mut(table) {
            rows.retain(|row| !matches_all(filters, row));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Order;
    use serde_json::json;

    #[tokio::test]
    async fn test_select_orders_and_limits() {
        let store = InMemoryRowStore::new();
        store
            .insert(
                "stops",
                vec![
                    json!({"id": "b", "driver_id": "d1", "sort_order": 1}),
                    json!({"id": "a", "driver_id": "d1", "sort_order": 0}),
                    json!({"id": "c", "driver_id": "d2", "sort_order": 0}),
                ],
            )
            .await
            .unwrap();

        let rows = store
            .select(
                "stops",
                &Select::new()
                    .filter(Filter::eq("driver_id", "d1"))
                    .order(Order::asc("sort_order")),
            )
            .await
            .unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["a", "b"]);

        let limited = store
            .select("stops", &Select::new().limit(1))
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_patch_merges_fields() {
        let store = InMemoryRowStore::new();
        store
            .insert_one("users", json!({"id": "u1", "full_name": "A", "status": "active"}))
            .await
            .unwrap();

        let updated = store
            .patch(
                "users",
                &[Filter::eq("id", "u1")],
                json!({"full_name": null, "status": "deleted"}),
            )
            .await
            .unwrap();

        assert_eq!(updated.len(), 1);
        assert!(updated[0]["full_name"].is_null());
        assert_eq!(store.rows("users")[0]["status"], "deleted");
    }

    #[tokio::test]
    async fn test_rejected_deletes_leave_rows() {
        let store = InMemoryRowStore::new();
        store.insert_one("users", json!({"id": "u1"})).await.unwrap();
        store.reject_deletes_on("users");

        let err = store
            .delete("users", &[Filter::eq("id", "u1")])
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(409));
        assert_eq!(store.rows("users").len(), 1);

        store.allow_deletes_on("users");
        store.delete("users", &[Filter::eq("id", "u1")]).await.unwrap();
        assert!(store.rows("users").is_empty());
    }
}
