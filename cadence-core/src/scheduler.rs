//! Concurrent scheduler for all monitored metrics.
//!
//! Each metric runs as its own task in a [`JoinSet`]. Tasks share the source
//! and the record sink but nothing else, so a slow or failing metric never
//! delays another. A task that panics is logged and the rest keep running.

use crate::config::Config;
use crate::controller::IntervalController;
use crate::error::{CadenceError, Result};
use crate::monitor::{MetricMonitor, MonitorReport};
use crate::records::RecordSink;
use crate::source::{MetricSpec, MetricsSource};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub struct Scheduler {
    monitors: Vec<MetricMonitor>,
}

impl Scheduler {
    /// Build one monitor per configured metric.
    ///
    /// Duplicate expressions are monitored once.
    pub fn new(
        config: &Config,
        source: Arc<dyn MetricsSource>,
        sink: Arc<dyn RecordSink>,
    ) -> Result<Self> {
        if config.metrics.is_empty() {
            return Err(CadenceError::invalid_config("no metrics configured"));
        }

        let settings = config.controller_settings();
        let policy = config.policy.build();
        let mut seen = BTreeSet::new();
        let mut monitors = Vec::with_capacity(config.metrics.len());

        for expr in &config.metrics {
            let metric = MetricSpec::new(expr);
            if !seen.insert(metric.clone()) {
                warn!(metric = %metric, "Duplicate metric ignored");
                continue;
            }
            let controller = IntervalController::new(metric, settings, policy.clone());
            monitors.push(MetricMonitor::new(controller, source.clone(), sink.clone()));
        }

        Ok(Self { monitors })
    }

    pub fn from_monitors(monitors: Vec<MetricMonitor>) -> Self {
        Self { monitors }
    }

    pub fn metrics(&self) -> Vec<&MetricSpec> {
        self.monitors.iter().map(MetricMonitor::metric).collect()
    }

    pub fn monitors(&self) -> &[MetricMonitor] {
        &self.monitors
    }

    /// Run every monitor until `shutdown` is cancelled and all tasks exit.
    ///
    /// Reports come back in completion order.
    pub async fn run(self, shutdown: CancellationToken) -> Vec<MonitorReport> {
        info!(metrics = self.monitors.len(), "Scheduler starting");

        let mut tasks = JoinSet::new();
        for monitor in self.monitors {
            tasks.spawn(monitor.run(shutdown.child_token()));
        }

        let mut reports = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(report) => reports.push(report),
                Err(e) if e.is_panic() => error!(error = %e, "Monitor task panicked"),
                Err(e) => warn!(error = %e, "Monitor task cancelled"),
            }
        }

        info!(stopped = reports.len(), "Scheduler stopped");
        reports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::MemoryLog;
    use crate::source::{QueryResult, Series};
    use async_trait::async_trait;
    use std::time::Duration;

    struct Constant;

    #[async_trait]
    impl MetricsSource for Constant {
        async fn query(&self, _spec: &MetricSpec) -> Result<QueryResult> {
            Ok(QueryResult {
                series: vec![Series::value(1.0)],
                latency: Duration::from_millis(1),
                bytes: 64,
            })
        }
    }

    fn config(metrics: &[&str]) -> Config {
        Config { metrics: metrics.iter().map(|m| m.to_string()).collect(), ..Config::default() }
    }

    #[test]
    fn test_requires_metrics() {
        let err = Scheduler::new(&config(&[]), Arc::new(Constant), Arc::new(MemoryLog::new()))
            .err()
            .unwrap();
        assert_eq!(err.kind(), "config");
    }

    #[test]
    fn test_duplicates_are_dropped() {
        let scheduler = Scheduler::new(
            &config(&["up", "rate(x[1m])", "up"]),
            Arc::new(Constant),
            Arc::new(MemoryLog::new()),
        )
        .unwrap();

        let metrics: Vec<&str> = scheduler.metrics().into_iter().map(MetricSpec::as_str).collect();
        assert_eq!(metrics, vec!["up", "rate(x[1m])"]);
        assert!(scheduler
            .monitors()
            .iter()
            .all(|m| m.controller().state().current_interval == 15));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_returns_a_report_per_metric() {
        let scheduler = Scheduler::new(
            &config(&["a", "b", "c"]),
            Arc::new(Constant),
            Arc::new(MemoryLog::new()),
        )
        .unwrap();

        let token = CancellationToken::new();
        let handle = tokio::spawn(scheduler.run(token.clone()));
        tokio::time::sleep(Duration::from_secs(5)).await;
        token.cancel();

        let mut reports = handle.await.unwrap();
        reports.sort_by(|a, b| a.metric.cmp(&b.metric));
        let names: Vec<&str> = reports.iter().map(|r| r.metric.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }
}
