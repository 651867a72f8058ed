//! Cadence Core Library
//!
//! Adaptive polling for time-series metrics. Each monitored metric gets its own
//! interval controller that speeds up polling when the metric changes often,
//! backs off when it is quiet, and trips a cumulative alarm when the running
//! sum of sampled values crosses a threshold.

pub mod alarm;
pub mod analyzer;
pub mod config;
pub mod controller;
pub mod error;
pub mod monitor;
pub mod observability;
pub mod paths;
pub mod policy;
pub mod records;
pub mod scheduler;
pub mod source;

// Re-export commonly used items
pub use alarm::{AlarmDecision, AlarmPolicy, CumulativeAlarm};
pub use analyzer::{ChangeAnalyzer, ChangeSummary};
pub use config::{Config, ControllerSettings};
pub use controller::{ControllerState, CycleOutcome, IntervalController, Phase, Window};
pub use error::{CadenceError, Result};
pub use monitor::{MetricMonitor, MonitorReport};
pub use observability::{init as init_observability, shutdown as shutdown_observability};
pub use policy::{IntervalPolicy, PolicyConfig};
pub use records::{AlertRecord, CsvRecordLog, MemoryLog, RecordSink, SampleRecord};
pub use scheduler::Scheduler;
pub use source::{MetricSpec, MetricsSource, PrometheusClient, QueryResult, Sample, Series};
