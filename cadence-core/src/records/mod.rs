//! Durable sample and alert records.
//!
//! Every monitor task shares one [`RecordSink`]. Implementations must write
//! each record atomically with respect to other writers: a reader never sees
//! half a row.

mod csv_log;

pub use csv_log::{CsvLog, CsvRecordLog, ALERT_HEADER, SAMPLE_HEADER};

use crate::error::Result;
use crate::source::MetricSpec;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use tokio::sync::Mutex;

/// Timestamp format used in every record.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One fetched series value with transfer telemetry.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRecord {
    pub timestamp: DateTime<Local>,
    pub metric: MetricSpec,
    pub value: f64,
    pub bandwidth_mbps: f64,
    pub data_size_kb: f64,
    /// Carried sum plus the window's running sum when this row was written.
    pub cumulative_sum: f64,
}

impl SampleRecord {
    pub fn to_row(&self) -> [String; 6] {
        [
            self.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            self.metric.to_string(),
            format!("{:.6}", self.value),
            format!("{:.2}", self.bandwidth_mbps),
            format!("{:.2}", self.data_size_kb),
            format!("{:.6}", self.cumulative_sum),
        ]
    }
}

/// One alarm trip.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertRecord {
    pub timestamp: DateTime<Local>,
    pub metric: MetricSpec,
    /// Trips so far for this metric, including this one.
    pub alert_count: u64,
}

impl AlertRecord {
    pub fn to_row(&self) -> [String; 3] {
        [
            self.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            self.metric.to_string(),
            self.alert_count.to_string(),
        ]
    }
}

/// Append-only destination for records.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn append_sample(&self, record: &SampleRecord) -> Result<()>;

    async fn append_alert(&self, record: &AlertRecord) -> Result<()>;
}

/// Record sink that keeps everything in memory.
#[derive(Debug, Default)]
pub struct MemoryLog {
    samples: Mutex<Vec<SampleRecord>>,
    alerts: Mutex<Vec<AlertRecord>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn samples(&self) -> Vec<SampleRecord> {
        self.samples.lock().await.clone()
    }

    pub async fn alerts(&self) -> Vec<AlertRecord> {
        self.alerts.lock().await.clone()
    }
}

#[async_trait]
impl RecordSink for MemoryLog {
    async fn append_sample(&self, record: &SampleRecord) -> Result<()> {
        self.samples.lock().await.push(record.clone());
        Ok(())
    }

    async fn append_alert(&self, record: &AlertRecord) -> Result<()> {
        self.alerts.lock().await.push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
    }

    #[test]
    fn test_sample_row_format() {
        let record = SampleRecord {
            timestamp: at(),
            metric: MetricSpec::from("up"),
            value: 1.0,
            bandwidth_mbps: 0.123,
            data_size_kb: 0.5,
            cumulative_sum: 42.0,
        };
        assert_eq!(
            record.to_row(),
            [
                "2024-03-09 14:05:07".to_string(),
                "up".to_string(),
                "1.000000".to_string(),
                "0.12".to_string(),
                "0.50".to_string(),
                "42.000000".to_string(),
            ]
        );
    }

    #[test]
    fn test_alert_row_format() {
        let record = AlertRecord { timestamp: at(), metric: MetricSpec::from("up"), alert_count: 3 };
        assert_eq!(record.to_row()[2], "3");
    }

    #[tokio::test]
    async fn test_memory_log() {
        let log = MemoryLog::new();
        log.append_alert(&AlertRecord {
            timestamp: at(),
            metric: MetricSpec::from("up"),
            alert_count: 1,
        })
        .await
        .unwrap();
        assert_eq!(log.alerts().await.len(), 1);
        assert!(log.samples().await.is_empty());
    }
}
