//! Metrics source abstraction.
//!
//! A [`MetricsSource`] answers instant queries for a [`MetricSpec`]. The
//! controller never cares which product sits behind it; the daemon wires in
//! [`PrometheusClient`], tests wire in scripted fakes.

mod prometheus;

pub use prometheus::{parse_query_response, PrometheusClient, X_SCRIPT_ID};

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// An opaque query expression identifying one monitored metric.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetricSpec(Arc<str>);

impl MetricSpec {
    pub fn new(expr: impl AsRef<str>) -> Self {
        Self(Arc::from(expr.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MetricSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MetricSpec {
    fn from(expr: &str) -> Self {
        Self::new(expr)
    }
}

impl From<String> for MetricSpec {
    fn from(expr: String) -> Self {
        Self::new(expr)
    }
}

/// One labelled value from a query result.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub labels: BTreeMap<String, String>,
    pub value: f64,
}

impl Series {
    /// Unlabelled series, mostly for tests and fakes.
    pub fn value(value: f64) -> Self {
        Self { labels: BTreeMap::new(), value }
    }
}

/// The answer to one query, plus transfer telemetry.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    /// Series in the order the source returned them.
    pub series: Vec<Series>,
    /// Round-trip time of the request.
    pub latency: Duration,
    /// Size of the response body.
    pub bytes: usize,
}

impl QueryResult {
    /// Observed transfer rate in megabits per second.
    pub fn bandwidth_mbps(&self) -> f64 {
        let secs = self.latency.as_secs_f64();
        if secs > 0.0 {
            (self.bytes as f64 * 8.0) / (1024.0 * 1024.0) / secs
        } else {
            0.0
        }
    }

    /// Response size in kilobytes.
    pub fn data_size_kb(&self) -> f64 {
        self.bytes as f64 / 1024.0
    }
}

/// All series values for a metric at one instant.
#[derive(Debug, Clone)]
pub struct Sample {
    /// Monotonic capture time; gaps between samples are measured on this.
    pub at: Instant,
    /// Wall-clock capture time for the durable record.
    pub captured_at: DateTime<Local>,
    pub series: Vec<Series>,
}

impl Sample {
    pub fn new(at: Instant, series: Vec<Series>) -> Self {
        Self { at, captured_at: Local::now(), series }
    }

    /// Sum of the finite series values in this sample.
    ///
    /// `NaN` and infinities (a `0/0` rate, for one) contribute nothing.
    pub fn sum(&self) -> f64 {
        self.series.iter().map(|s| s.value).filter(|v| v.is_finite()).sum()
    }

    /// Number of series whose value is `NaN` or infinite.
    pub fn non_finite(&self) -> usize {
        self.series.iter().filter(|s| !s.value.is_finite()).count()
    }
}

/// Something that can be asked for the current value of a metric.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Run an instant query.
    ///
    /// An empty `series` is a valid answer meaning "no data right now".
    /// Transport, status and decode problems come back as errors.
    async fn query(&self, spec: &MetricSpec) -> Result<QueryResult>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bandwidth_and_size() {
        let result = QueryResult {
            series: vec![],
            latency: Duration::from_millis(500),
            bytes: 131_072,
        };
        assert_eq!(result.data_size_kb(), 128.0);
        assert!((result.bandwidth_mbps() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_bandwidth_zero_latency() {
        let result = QueryResult { series: vec![], latency: Duration::ZERO, bytes: 10 };
        assert_eq!(result.bandwidth_mbps(), 0.0);
    }

    #[test]
    fn test_sample_sum() {
        let sample = Sample::new(
            Instant::now(),
            vec![Series::value(1.5), Series::value(2.5), Series::value(-1.0)],
        );
        assert_eq!(sample.sum(), 3.0);
    }

    #[test]
    fn test_sample_sum_skips_non_finite() {
        let sample = Sample::new(
            Instant::now(),
            vec![Series::value(f64::NAN), Series::value(4.0), Series::value(f64::INFINITY)],
        );
        assert_eq!(sample.sum(), 4.0);
        assert_eq!(sample.non_finite(), 2);
    }

    #[test]
    fn test_metric_spec_display() {
        let spec = MetricSpec::from("rate(http_requests_total[1m])");
        assert_eq!(spec.to_string(), "rate(http_requests_total[1m])");
        assert_eq!(spec, MetricSpec::new(String::from("rate(http_requests_total[1m])")));
    }
}
