//! Fleet Store - REST row-store gateway
//!
//! A thin, generic client over a PostgREST-style HTTP row store. The gateway
//! owns no business logic: it turns `select`/`insert`/`patch`/`delete` calls
//! into exactly one HTTP round trip each, with no retries, batching or
//! caching. Callers interpret an empty result (zero rows matched) separately
//! from a failed request.
//!
//! Author: hephaex@gmail.com

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

pub mod rest;

#[cfg(any(test, feature = "test-utils"))]
pub mod memory;

pub use rest::RestRowStore;

#[cfg(any(test, feature = "test-utils"))]
pub use memory::InMemoryRowStore;

/// Row-store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Upstream answered with a non-2xx status
    #[error("row store returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("row store request failed: {0}")]
    Transport(String),

    #[error("failed to decode row: {0}")]
    Decode(String),

    /// Mutations without a filter are refused before any request is sent
    #[error("refusing unfiltered {0} on {1}")]
    MissingFilter(&'static str, String),
}

impl StoreError {
    /// Upstream HTTP status, when the failure came from the store itself
    pub fn status(&self) -> Option<u16> {
        match self {
            StoreError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// A single column predicate
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    column: String,
    op: FilterOp,
}

#[derive(Debug, Clone, PartialEq)]
enum FilterOp {
    Eq(String),
    Neq(String),
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl ToString) -> Self {
        Self {
            column: column.into(),
            op: FilterOp::Eq(value.to_string()),
        }
    }

    pub fn neq(column: impl Into<String>, value: impl ToString) -> Self {
        Self {
            column: column.into(),
            op: FilterOp::Neq(value.to_string()),
        }
    }

    /// Render as a PostgREST query pair, e.g. `("id", "eq.42")`
    pub fn to_query_pair(&self) -> (String, String) {
        let value = match &self.op {
            FilterOp::Eq(v) => format!("eq.{v}"),
            FilterOp::Neq(v) => format!("neq.{v}"),
        };
        (self.column.clone(), value)
    }

    /// Evaluate against a JSON row, comparing values in their text form
    pub fn matches(&self, row: &Value) -> bool {
        let cell = row.get(&self.column).map(value_text);
        match &self.op {
            FilterOp::Eq(v) => cell.as_deref() == Some(v.as_str()),
            FilterOp::Neq(v) => cell.as_deref() != Some(v.as_str()),
        }
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Sort order for a select
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

impl Order {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ascending: true,
        }
    }

    pub fn to_query_value(&self) -> String {
        let direction = if self.ascending { "asc" } else { "desc" };
        format!("{}.{direction}", self.column)
    }
}

/// Select parameters: filters, optional order and limit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Select {
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl Select {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order = Some(order);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Generic row-store operations
///
/// Rows are plain JSON objects; typed decoding happens in the caller's
/// repository layer via [`decode_rows`].
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Fetch rows matching every filter
    async fn select(&self, table: &str, query: &Select) -> Result<Vec<Value>, StoreError>;

    /// Insert rows and return them as stored
    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>, StoreError>;

    /// Merge `changes` into every matching row and return the updated rows
    async fn patch(
        &self,
        table: &str,
        filters: &[Filter],
        changes: Value,
    ) -> Result<Vec<Value>, StoreError>;

    /// Remove every matching row
    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<(), StoreError>;

    /// Insert a single row and return it as stored
    async fn insert_one(&self, table: &str, row: Value) -> Result<Value, StoreError> {
        self.insert(table, vec![row])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode(format!("insert into {table} returned no rows")))
    }
}

/// Decode raw rows into typed records
pub fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, StoreError> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(|e| StoreError::Decode(e.to_string())))
        .collect()
}

/// Encode a serializable record into a row
pub fn encode_row<T: serde::Serialize>(record: &T) -> Result<Value, StoreError> {
    serde_json::to_value(record).map_err(|e| StoreError::Decode(e.to_string()))
}

pub(crate) fn require_filters(
    operation: &'static str,
    table: &str,
    filters: &[Filter],
) -> Result<(), StoreError> {
    if filters.is_empty() {
        return Err(StoreError::MissingFilter(operation, table.to_string()));
    }
    Ok(())
}
