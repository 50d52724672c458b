//! PostgREST-dialect HTTP client
//!
//! Author: hephaex@gmail.com

use crate::{require_filters, Filter, RowStore, Select, StoreError};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use tracing::{debug, warn};

/// Row store reached over HTTP
///
/// Every call authenticates with the service credential, sent both as the
/// `apikey` header and as a bearer token.
#[derive(Clone)]
pub struct RestRowStore {
    client: Client,
    base_url: String,
    service_key: String,
}

impl RestRowStore {
    pub fn new(base_url: impl Into<String>, service_key: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url, service_key)
    }

    pub fn with_client(
        client: Client,
        base_url: impl Into<String>,
        service_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_key: service_key.into(),
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.base_url, table)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    fn filter_pairs(filters: &[Filter]) -> Vec<(String, String)> {
        filters.iter().map(Filter::to_query_pair).collect()
    }

    async fn send(
        &self,
        builder: RequestBuilder,
        operation: &str,
        table: &str,
    ) -> Result<Vec<Value>, StoreError> {
        let response = self
            .authorized(builder)
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        read_rows(response, operation, table).await
    }
}

async fn read_rows(
    response: Response,
    operation: &str,
    table: &str,
) -> Result<Vec<Value>, StoreError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| StoreError::Transport(e.to_string()))?;

    if !status.is_success() {
        warn!(
            operation,
            table,
            status = status.as_u16(),
            body = %body,
            "row store request failed"
        );
        return Err(StoreError::Http {
            status: status.as_u16(),
            body,
        });
    }

    if body.trim().is_empty() {
        return Ok(Vec::new());
    }

    let value: Value =
        serde_json::from_str(&body).map_err(|e| StoreError::Decode(e.to_string()))?;

    match value {
        Value::Array(rows) => Ok(rows),
        row @ Value::Object(_) => Ok(vec![row]),
        other => Err(StoreError::Decode(format!(
            "expected rows from {table}, got {other}"
        ))),
    }
}

#[async_trait]
impl RowStore for RestRowStore {
    async fn select(&self, table: &str, query: &Select) -> Result<Vec<Value>, StoreError> {
        let mut params = vec![("select".to_string(), "*".to_string())];
        params.extend(Self::filter_pairs(&query.filters));
        if let Some(order) = &query.order {
            params.push(("order".to_string(), order.to_query_value()));
        }
        if let Some(limit) = query.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }

        debug!(table, filters = query.filters.len(), "row store select");
        self.send(
            self.client.get(self.table_url(table)).query(&params),
            "select",
            table,
        )
        .await
    }

    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>, StoreError> {
        debug!(table, rows = rows.len(), "row store insert");
        self.send(
            self.client
                .post(self.table_url(table))
                .header("Prefer", "return=representation")
                .json(&rows),
            "insert",
            table,
        )
        .await
    }

    async fn patch(
        &self,
        table: &str,
        filters: &[Filter],
        changes: Value,
    ) -> Result<Vec<Value>, StoreError> {
        require_filters("patch", table, filters)?;

        debug!(table, filters = filters.len(), "row store patch");
        self.send(
            self.client
                .patch(self.table_url(table))
                .query(&Self::filter_pairs(filters))
                .header("Prefer", "return=representation")
                .json(&changes),
            "patch",
            table,
        )
        .await
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<(), StoreError> {
        require_filters("delete", table, filters)?;

        debug!(table, filters = filters.len(), "row store delete");
        self.send(
            self.client
                .delete(self.table_url(table))
                .query(&Self::filter_pairs(filters))
                .header("Prefer", "return=minimal"),
            "delete",
            table,
        )
        .await
        .map(|_| ())
    }
}
