//! Mapbox Geocoding v6 client
//!
//! Author: hephaex@gmail.com

use crate::extract::first_feature;
use crate::{GeocodeError, GeocodeProvider};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

/// Default API host
pub const DEFAULT_BASE_URL: &str = "https://api.mapbox.com";

/// Mapbox rejects batch bodies with more queries than this
pub const BATCH_LIMIT: usize = 1000;

#[derive(Serialize)]
struct BatchQuery<'a> {
    q: &'a str,
    limit: u8,
}

/// Client for the forward and batch endpoints
#[derive(Clone)]
pub struct MapboxClient {
    client: Client,
    access_token: String,
    base_url: String,
}

impl MapboxClient {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_base_url(access_token, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(access_token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            access_token: access_token.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn read_json(response: Response, endpoint: &str) -> Result<Value, GeocodeError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(endpoint, status = status.as_u16(), body = %body, "geocoder request failed");
            return Err(GeocodeError::Upstream {
                status: Some(status.as_u16()),
                message: format!("{} returned {}", endpoint, status),
            });
        }

        response
            .json()
            .await
            .map_err(|e| GeocodeError::Unusable(e.to_string()))
    }
}

fn transport(e: reqwest::Error) -> GeocodeError {
    GeocodeError::Upstream {
        status: e.status().map(|s| s.as_u16()),
        message: e.to_string(),
    }
}

#[async_trait]
impl GeocodeProvider for MapboxClient {
    async fn forward(&self, address: &str) -> Result<Option<Value>, GeocodeError> {
        let url = format!("{}/search/geocode/v6/forward", self.base_url);
        debug!("forward geocode");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("q", address),
                ("limit", "1"),
                ("access_token", self.access_token.as_str()),
            ])
            .send()
            .await
            .map_err(transport)?;

        let body = Self::read_json(response, "forward").await?;
        Ok(first_feature(&body))
    }

    async fn batch(&self, addresses: &[String]) -> Result<Vec<Option<Value>>, GeocodeError> {
        if addresses.len() > BATCH_LIMIT {
            return Err(GeocodeError::BatchTooLarge {
                count: addresses.len(),
                limit: BATCH_LIMIT,
            });
        }

        let url = format!("{}/search/geocode/v6/batch", self.base_url);
        let queries: Vec<BatchQuery<'_>> = addresses
            .iter()
            .map(|q| BatchQuery { q, limit: 1 })
            .collect();
        debug!(count = queries.len(), "batch geocode");

        let response = self
            .client
            .post(&url)
            .query(&[("access_token", self.access_token.as_str())])
            .json(&queries)
            .send()
            .await
            .map_err(transport)?;

        let body = Self::read_json(response, "batch").await?;
        let entries = body
            .get("batch")
            .and_then(Value::as_array)
            .ok_or_else(|| GeocodeError::Unusable("batch response has no batch array".into()))?;

        if entries.len() != addresses.len() {
            return Err(GeocodeError::Unusable(format!(
                "batch response has {} entries for {} addresses",
                entries.len(),
                addresses.len()
            )));
        }

        Ok(entries.iter().map(first_feature).collect())
    }

    fn batch_limit(&self) -> usize {
        BATCH_LIMIT
    }

    fn name(&self) -> &str {
        "mapbox"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn point(lng: f64, lat: f64) -> Value {
        json!({"type": "Feature", "geometry": {"type": "Point", "coordinates": [lng, lat]}})
    }

    #[tokio::test]
    async fn test_forward_takes_first_feature() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/geocode/v6/forward"))
            .and(query_param("q", "123 Main St"))
            .and(query_param("limit", "1"))
            .and(query_param("access_token", "pk.test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "type": "FeatureCollection",
                "features": [point(-73.98, 40.75)]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = MapboxClient::with_base_url("pk.test", server.uri());
        let feature = client.forward("123 Main St").await.unwrap().unwrap();
        assert_eq!(feature["geometry"]["coordinates"][1], 40.75);
    }

    #[tokio::test]
    async fn test_forward_no_match_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"features": []})))
            .mount(&server)
            .await;

        let client = MapboxClient::with_base_url("pk.test", server.uri());
        assert!(client.forward("nowhere").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_batch_is_index_aligned() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search/geocode/v6/batch"))
            .and(query_param("access_token", "pk.test"))
            .and(body_json(json!([
                {"q": "1 First St", "limit": 1},
                {"q": "2 Second St", "limit": 1}
            ])))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "batch": [
                    {"type": "FeatureCollection", "features": [point(1.0, 2.0)]},
                    {"type": "FeatureCollection", "features": []}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = MapboxClient::with_base_url("pk.test", server.uri());
        let results = client
            .batch(&["1 First St".to_string(), "2 Second St".to_string()])
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert!(results[0].is_some());
        assert!(results[1].is_none());
    }

    #[tokio::test]
    async fn test_batch_length_mismatch_is_unusable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"batch": []})))
            .mount(&server)
            .await;

        let client = MapboxClient::with_base_url("pk.test", server.uri());
        let err = client
            .batch(&["a".to_string(), "b".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, GeocodeError::Unusable(_)));
    }

    #[tokio::test]
    async fn test_upstream_error_carries_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Not Authorized"))
            .mount(&server)
            .await;

        let client = MapboxClient::with_base_url("bad", server.uri());
        let err = client.forward("x").await.unwrap_err();
        assert!(matches!(err, GeocodeError::Upstream { status: Some(401), .. }));
    }

    #[tokio::test]
    async fn test_oversized_batch_rejected_before_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = MapboxClient::with_base_url("pk.test", server.uri());
        let addresses: Vec<String> = (0..=BATCH_LIMIT).map(|i| i.to_string()).collect();
        let err = client.batch(&addresses).await.unwrap_err();
        assert!(matches!(err, GeocodeError::BatchTooLarge { limit: BATCH_LIMIT, .. }));
    }
}
