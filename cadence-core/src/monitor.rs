//! Per-metric monitor task.
//!
//! Drives one [`IntervalController`] through its cycle: sample the source
//! once per tick for the current interval, analyze the window, write records,
//! sleep for the next interval, repeat.
//!
//! Fetch failures are logged and skipped; they only make the window smaller.
//! Record write failures are logged and counted, but the controller state
//! still advances. Cancellation is checked before every fetch and every sleep;
//! a window interrupted by shutdown is discarded without analysis.

use crate::controller::{CycleOutcome, IntervalController, Phase, Window};
use crate::observability::metrics as telemetry;
use crate::records::{AlertRecord, RecordSink, SampleRecord};
use crate::source::{MetricSpec, MetricsSource, QueryResult, Sample};
use chrono::Local;
use std::sync::Arc;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Summary of a monitor task when it stops.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorReport {
    pub metric: MetricSpec,
    pub cycles: u64,
    pub alert_count: u64,
    pub final_interval: u64,
    pub cumulative_sum: f64,
}

/// One metric's sample, analyze, sleep loop.
pub struct MetricMonitor {
    controller: IntervalController,
    source: Arc<dyn MetricsSource>,
    sink: Arc<dyn RecordSink>,
    cycles: u64,
}

impl MetricMonitor {
    pub fn new(
        controller: IntervalController,
        source: Arc<dyn MetricsSource>,
        sink: Arc<dyn RecordSink>,
    ) -> Self {
        Self { controller, source, sink, cycles: 0 }
    }

    pub fn controller(&self) -> &IntervalController {
        &self.controller
    }

    pub fn metric(&self) -> &MetricSpec {
        self.controller.metric()
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Run cycles until `shutdown` is cancelled.
    pub async fn run(mut self, shutdown: CancellationToken) -> MonitorReport {
        info!(
            metric = %self.metric(),
            interval = self.controller.state().current_interval,
            policy = self.controller.policy().name(),
            "Starting monitor"
        );

        loop {
            let Some(outcome) = self.run_cycle(&shutdown).await else {
                break;
            };

            self.controller.set_phase(Phase::Sleeping);
            let pause = self.controller.settings().ticks(outcome.next_interval);
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = sleep(pause) => {}
            }
        }

        self.controller.set_phase(Phase::Stopped);
        let report = self.report();
        info!(
            metric = %report.metric,
            cycles = report.cycles,
            alerts = report.alert_count,
            interval = report.final_interval,
            "Monitor stopped"
        );
        report
    }

    /// Collect one window and evaluate it.
    ///
    /// Returns `None` when cancelled before the window completed.
    pub async fn run_cycle(&mut self, shutdown: &CancellationToken) -> Option<CycleOutcome> {
        let window = self.collect_window(shutdown).await?;
        let outcome = self.controller.evaluate(&window);
        self.cycles += 1;

        let metric = self.metric().clone();
        if outcome.alarm_mode {
            warn!(
                metric = %metric,
                observed = outcome.alarm_observed,
                alerts = outcome.alert_count,
                interval = outcome.next_interval,
                "Cumulative alarm tripped"
            );
            let record = AlertRecord {
                timestamp: Local::now(),
                metric: metric.clone(),
                alert_count: outcome.alert_count,
            };
            if let Err(e) = self.sink.append_alert(&record).await {
                warn!(metric = %metric, kind = e.kind(), error = %e, "Failed to write alert record");
                telemetry::record_sink_failure(metric.as_str(), "alerts");
            }
        } else if outcome.next_interval != outcome.interval {
            info!(
                metric = %metric,
                from = outcome.interval,
                to = outcome.next_interval,
                avg_change_interval = outcome.avg_change_interval,
                "Adjusting poll interval"
            );
        }

        debug!(
            metric = %metric,
            samples = outcome.samples,
            significant_changes = outcome.significant_changes,
            cumulative_sum = outcome.cumulative_sum,
            "Cycle complete"
        );
        telemetry::record_cycle(
            metric.as_str(),
            outcome.next_interval,
            outcome.cumulative_sum,
            outcome.alarm_mode,
        );

        Some(outcome)
    }

    fn report(&self) -> MonitorReport {
        let state = self.controller.state();
        MonitorReport {
            metric: self.metric().clone(),
            cycles: self.cycles,
            alert_count: state.alert_count,
            final_interval: state.current_interval,
            cumulative_sum: state.cumulative_sum,
        }
    }

    /// Query once per tick until the current interval has elapsed.
    async fn collect_window(&mut self, shutdown: &CancellationToken) -> Option<Window> {
        self.controller.set_phase(Phase::Sampling);

        let metric = self.metric().clone();
        let settings = *self.controller.settings();
        let deadline = Instant::now() + settings.ticks(self.controller.state().current_interval);
        let mut window = Window::new();

        while Instant::now() < deadline {
            let fetched = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return None,
                result = self.source.query(&metric) => result,
            };

            match fetched {
                Ok(result) => self.accept(&metric, &mut window, result).await,
                Err(e) => {
                    warn!(metric = %metric, kind = e.kind(), error = %e, "Fetch failed");
                    telemetry::record_fetch_failure(metric.as_str(), e.kind());
                }
            }

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return None,
                _ = sleep(settings.tick) => {}
            }
        }

        Some(window)
    }

    /// Add a successful result to the window and log one row per series.
    async fn accept(&self, metric: &MetricSpec, window: &mut Window, result: QueryResult) {
        telemetry::record_fetch(metric.as_str(), result.latency);

        if result.series.is_empty() {
            debug!(metric = %metric, "Query returned no series");
            return;
        }
        telemetry::record_sample(metric.as_str());

        let bandwidth_mbps = result.bandwidth_mbps();
        let data_size_kb = result.data_size_kb();
        let mut running = self.controller.window_base() + window.sum();

        let sample = Sample::new(Instant::now(), result.series);
        let non_finite = sample.non_finite();
        if non_finite > 0 {
            warn!(metric = %metric, series = non_finite, "Ignoring non-finite values in sums");
        }

        for series in &sample.series {
            if series.value.is_finite() {
                running += series.value;
            }
            let record = SampleRecord {
                timestamp: sample.captured_at,
                metric: metric.clone(),
                value: series.value,
                bandwidth_mbps,
                data_size_kb,
                cumulative_sum: running,
            };
            if let Err(e) = self.sink.append_sample(&record).await {
                warn!(metric = %metric, kind = e.kind(), error = %e, "Failed to write sample record");
                telemetry::record_sink_failure(metric.as_str(), "samples");
            }
        }

        debug!(
            metric = %metric,
            series = sample.series.len(),
            bandwidth_mbps,
            data_size_kb,
            "Sample collected"
        );
        window.push(sample);
    }
}
