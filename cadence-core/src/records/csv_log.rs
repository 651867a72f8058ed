//! CSV-backed record logs.

use super::{AlertRecord, RecordSink, SampleRecord};
use crate::config::LogsConfig;
use crate::error::{CadenceError, Result};
use async_trait::async_trait;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, instrument};

/// Header row of the sample log.
pub const SAMPLE_HEADER: [&str; 6] = [
    "Timestamp",
    "Metric",
    "Metric Value",
    "Bandwidth (Mbps)",
    "Data Size (KB)",
    "Cumulative Sum",
];

/// Header row of the alert log.
pub const ALERT_HEADER: [&str; 3] = ["Timestamp", "Metric", "Alert Count"];

/// A single append-only CSV file.
///
/// Each row is encoded in memory and written with one `write_all` under the
/// file lock, so concurrent appends never interleave within a row and a
/// failed write leaves nothing behind for the next one. File writes run on
/// the blocking pool.
#[derive(Debug)]
pub struct CsvLog {
    path: PathBuf,
    file: Arc<Mutex<File>>,
}

impl CsvLog {
    /// Open `path` for appending, writing `header` first if the file is new or empty.
    pub fn open(path: &Path, header: &[&str]) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| CadenceError::Io { path: parent.to_path_buf(), source: e })?;
        }

        let needs_header = std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| CadenceError::Io { path: path.to_path_buf(), source: e })?;

        if needs_header {
            let bytes = encode_row(path, header)?;
            file.write_all(&bytes).map_err(|e| sink_error(path, e))?;
            debug!(path = %path.display(), "Created record log");
        }

        Ok(Self { path: path.to_path_buf(), file: Arc::new(Mutex::new(file)) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row.
    pub async fn append<I, T>(&self, row: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let bytes = encode_row(&self.path, row)?;
        let file = Arc::clone(&self.file);
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || {
            let mut file = file.lock().map_err(|_| CadenceError::Sink {
                path: path.clone(),
                reason: "log file lock poisoned".to_string(),
            })?;
            file.write_all(&bytes).map_err(|e| sink_error(&path, e))
        })
        .await
        .map_err(|e| CadenceError::Sink { path: self.path.clone(), reason: e.to_string() })?
    }
}

/// Encode one CSV record, including its line terminator.
fn encode_row<I, T>(path: &Path, row: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(Vec::new());
    writer.write_record(row).map_err(|e| sink_error(path, e))?;
    writer.into_inner().map_err(|e| sink_error(path, e.error()))
}

fn sink_error(path: &Path, e: impl std::fmt::Display) -> CadenceError {
    CadenceError::Sink { path: path.to_path_buf(), reason: e.to_string() }
}

/// Sample and alert logs as a pair of CSV files.
#[derive(Debug)]
pub struct CsvRecordLog {
    samples: CsvLog,
    alerts: CsvLog,
}

impl CsvRecordLog {
    pub fn open(config: &LogsConfig) -> Result<Self> {
        Ok(Self {
            samples: CsvLog::open(&config.samples, &SAMPLE_HEADER)?,
            alerts: CsvLog::open(&config.alerts, &ALERT_HEADER)?,
        })
    }

    pub fn sample_path(&self) -> &Path {
        self.samples.path()
    }

    pub fn alert_path(&self) -> &Path {
        self.alerts.path()
    }
}

#[async_trait]
impl RecordSink for CsvRecordLog {
    #[instrument(skip_all, fields(metric = %record.metric))]
    async fn append_sample(&self, record: &SampleRecord) -> Result<()> {
        self.samples.append(record.to_row()).await
    }

    #[instrument(skip_all, fields(metric = %record.metric))]
    async fn append_alert(&self, record: &AlertRecord) -> Result<()> {
        self.alerts.append(record.to_row()).await
    }
}
