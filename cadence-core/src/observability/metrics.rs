//! Self-metrics definitions.
//!
//! All metrics follow Prometheus naming conventions:
//! - `_total` suffix for counters
//! - `_seconds` suffix for histograms measuring duration
//!
//! Every series carries a `metric` label holding the monitored query expression.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::time::Duration;

/// Register all core metrics with descriptions.
///
/// This ensures metrics appear in `/metrics` with proper metadata.
pub fn register_core_metrics() {
    describe_counter!("cadence_samples_total", "Successful fetches that returned at least one series");
    describe_counter!(
        "cadence_fetch_failures_total",
        "Failed fetches (by kind: transport, status, decode)"
    );
    describe_histogram!("cadence_fetch_duration_seconds", "Round-trip time of metric queries");
    describe_counter!("cadence_alarms_total", "Cumulative alarm trips");
    describe_counter!("cadence_cycles_total", "Completed polling cycles");
    describe_counter!("cadence_sink_failures_total", "Record writes that failed (by log)");
    describe_gauge!("cadence_poll_interval_ticks", "Current poll interval in time units");
    describe_gauge!("cadence_cumulative_sum", "Carried cumulative sum after the last cycle");
}

pub fn record_fetch(metric: &str, latency: Duration) {
    histogram!("cadence_fetch_duration_seconds", "metric" => metric.to_string())
        .record(latency.as_secs_f64());
}

pub fn record_sample(metric: &str) {
    counter!("cadence_samples_total", "metric" => metric.to_string()).increment(1);
}

pub fn record_fetch_failure(metric: &str, kind: &'static str) {
    counter!("cadence_fetch_failures_total", "metric" => metric.to_string(), "kind" => kind)
        .increment(1);
}

pub fn record_sink_failure(metric: &str, log: &'static str) {
    counter!("cadence_sink_failures_total", "metric" => metric.to_string(), "log" => log)
        .increment(1);
}

pub fn record_cycle(metric: &str, next_interval: u64, cumulative_sum: f64, tripped: bool) {
    counter!("cadence_cycles_total", "metric" => metric.to_string()).increment(1);
    gauge!("cadence_poll_interval_ticks", "metric" => metric.to_string())
        .set(next_interval as f64);
    gauge!("cadence_cumulative_sum", "metric" => metric.to_string()).set(cumulative_sum);
    if tripped {
        counter!("cadence_alarms_total", "metric" => metric.to_string()).increment(1);
    }
}
