//! Prometheus HTTP API client.
//!
//! Issues `GET <url>/api/v1/query?query=<expr>` and decodes the instant
//! vector envelope:
//!
//! ```text
//! { "status": "success",
//!   "data": { "resultType": "vector",
//!             "result": [ { "metric": {..labels..}, "value": [ts, "value"] } ] } }
//! ```

use super::{MetricSpec, MetricsSource, QueryResult, Series};
use crate::config::SourceConfig;
use crate::error::{CadenceError, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

/// Header used to identify this collector to the metrics source.
pub const X_SCRIPT_ID: &str = "x-script-id";

/// HTTP client for a Prometheus-compatible query API.
#[derive(Clone)]
pub struct PrometheusClient {
    client: Client,
    query_url: String,
}

impl PrometheusClient {
    /// Create a client from the source config.
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(id) = &config.client_id {
            let value = HeaderValue::from_str(id).map_err(|e| CadenceError::InvalidConfig {
                reason: format!("client_id is not a valid header value: {}", e),
            })?;
            headers.insert(X_SCRIPT_ID, value);
        }

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .default_headers(headers)
            .build()
            .map_err(|e| CadenceError::InvalidConfig {
                reason: format!("Failed to create HTTP client: {}", e),
            })?;

        let query_url = format!("{}/api/v1/query", config.url.trim_end_matches('/'));
        Ok(Self { client, query_url })
    }

    /// Full query endpoint URL.
    pub fn query_url(&self) -> &str {
        &self.query_url
    }

    fn transport(&self, e: reqwest::Error) -> CadenceError {
        let reason = if e.is_timeout() {
            "request timed out".to_string()
        } else if e.is_connect() {
            format!("connection failed: {}", e)
        } else {
            e.to_string()
        };
        CadenceError::Transport { url: self.query_url.clone(), reason }
    }
}

#[async_trait]
impl MetricsSource for PrometheusClient {
    #[instrument(skip(self), fields(metric = %spec))]
    async fn query(&self, spec: &MetricSpec) -> Result<QueryResult> {
        let started = Instant::now();

        let response = self
            .client
            .get(&self.query_url)
            .query(&[("query", spec.as_str())])
            .send()
            .await
            .map_err(|e| self.transport(e))?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| self.transport(e))?;
        let latency = started.elapsed();

        if !status.is_success() {
            return Err(CadenceError::Status { url: self.query_url.clone(), status: status.as_u16() });
        }

        let series = parse_query_response(&body)
            .map_err(|reason| CadenceError::Decode { url: self.query_url.clone(), reason })?;

        debug!(series = series.len(), bytes = body.len(), ?latency, "Query complete");
        Ok(QueryResult { series, latency, bytes: body.len() })
    }
}

#[derive(Deserialize)]
struct QueryEnvelope {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    data: Option<QueryData>,
}

#[derive(Deserialize)]
struct QueryData {
    #[serde(default)]
    result: Vec<RawSeries>,
}

#[derive(Deserialize)]
struct RawSeries {
    #[serde(default)]
    metric: BTreeMap<String, String>,
    value: (f64, String),
}

/// Decode a query response body into series, preserving result order.
pub fn parse_query_response(body: &[u8]) -> std::result::Result<Vec<Series>, String> {
    let envelope: QueryEnvelope =
        serde_json::from_slice(body).map_err(|e| format!("invalid JSON envelope: {}", e))?;

    if let Some(status) = envelope.status.as_deref() {
        if status != "success" {
            return Err(format!(
                "query status {}: {}",
                status,
                envelope.error.as_deref().unwrap_or("no error message")
            ));
        }
    }

    let data = envelope.data.ok_or_else(|| "response has no data field".to_string())?;

    data.result
        .into_iter()
        .map(|raw| {
            let value = raw
                .value
                .1
                .trim()
                .parse::<f64>()
                .map_err(|e| format!("invalid sample value {:?}: {}", raw.value.1, e))?;
            Ok(Series { labels: raw.metric, value })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vector() {
        let body = br#"{
            "status": "success",
            "data": {
                "resultType": "vector",
                "result": [
                    {"metric": {"instance": "a:9100"}, "value": [1700000000.5, "12.25"]},
                    {"metric": {"instance": "b:9100"}, "value": [1700000000.5, "0"]}
                ]
            }
        }"#;
        let series = parse_query_response(body).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].labels.get("instance").map(String::as_str), Some("a:9100"));
        assert_eq!(series[0].value, 12.25);
        assert_eq!(series[1].value, 0.0);
    }

    #[test]
    fn test_parse_empty_result() {
        let body = br#"{"status":"success","data":{"resultType":"vector","result":[]}}"#;
        assert!(parse_query_response(body).unwrap().is_empty());
    }

    #[test]
    fn test_parse_without_status_field() {
        let body = br#"{"data":{"result":[{"metric":{},"value":[1,"3"]}]}}"#;
        let series = parse_query_response(body).unwrap();
        assert_eq!(series, vec![Series::value(3.0)]);
    }

    #[test]
    fn test_parse_error_envelope() {
        let body = br#"{"status":"error","errorType":"bad_data","error":"parse error at char 3"}"#;
        let err = parse_query_response(body).unwrap_err();
        assert!(err.contains("parse error at char 3"));
    }

    #[test]
    fn test_parse_malformed() {
        assert!(parse_query_response(b"<html>oops</html>").is_err());
        assert!(parse_query_response(br#"{"status":"success"}"#).is_err());
        assert!(parse_query_response(
            br#"{"data":{"result":[{"metric":{},"value":[1,"not-a-number"]}]}}"#
        )
        .is_err());
    }

    #[test]
    fn test_query_url_trims_slash() {
        let config = SourceConfig { url: "http://prom:9090/".into(), ..SourceConfig::default() };
        let client = PrometheusClient::new(&config).unwrap();
        assert_eq!(client.query_url(), "http://prom:9090/api/v1/query");
    }

    #[test]
    fn test_rejects_invalid_client_id() {
        let config =
            SourceConfig { client_id: Some("bad\nvalue".into()), ..SourceConfig::default() };
        assert!(PrometheusClient::new(&config).is_err());
    }
}
