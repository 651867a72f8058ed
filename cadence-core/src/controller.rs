//! Per-metric interval controller.
//!
//! Owns the poll interval, carried cumulative sum and alert counter for one
//! metric and turns each finished polling window into the next interval:
//!
//! ```text
//! Idle -> Sampling -> Analyzing -> AlarmTripped ------> Sleeping -> Sampling ...
//!                              \-> IntervalAdjusting -/
//! ```
//!
//! An alarm trip forces the minimum interval regardless of the policy.
//! Otherwise the configured [`IntervalPolicy`] picks the next interval, which
//! is clamped to `[min_interval, max_interval]`.
//!
//! The controller does no I/O; [`crate::monitor::MetricMonitor`] drives it.

use crate::alarm::{AlarmPolicy, CumulativeAlarm};
use crate::analyzer::ChangeAnalyzer;
use crate::config::ControllerSettings;
use crate::policy::IntervalPolicy;
use crate::source::{MetricSpec, Sample};
use std::fmt;
use std::sync::Arc;

/// Where the controller is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Sampling,
    Analyzing,
    AlarmTripped,
    IntervalAdjusting,
    Sleeping,
    Stopped,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Sampling => "sampling",
            Phase::Analyzing => "analyzing",
            Phase::AlarmTripped => "alarm_tripped",
            Phase::IntervalAdjusting => "interval_adjusting",
            Phase::Sleeping => "sleeping",
            Phase::Stopped => "stopped",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Mutable per-metric state. Lives as long as the monitor; never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerState {
    /// Poll interval in ticks, always within `[min, max]`.
    pub current_interval: u64,
    /// Carried sum not yet consumed by an alarm trip.
    pub cumulative_sum: f64,
    /// Trips so far. Never decreases.
    pub alert_count: u64,
    /// True only for the cycle in which a trip occurred.
    pub alarm_mode: bool,
}

impl ControllerState {
    pub fn new(initial_interval: u64) -> Self {
        Self { current_interval: initial_interval, cumulative_sum: 0.0, alert_count: 0, alarm_mode: false }
    }
}

/// Samples collected during one polling window, in collection order.
#[derive(Debug, Clone, Default)]
pub struct Window {
    samples: Vec<Sample>,
    sum: f64,
}

impl Window {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sample: Sample) {
        self.sum += sample.sum();
        self.samples.push(sample);
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Sum of every finite value of every sample.
    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl FromIterator<Sample> for Window {
    fn from_iter<I: IntoIterator<Item = Sample>>(iter: I) -> Self {
        let mut window = Window::new();
        for sample in iter {
            window.push(sample);
        }
        window
    }
}

/// What one cycle decided.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleOutcome {
    /// Interval the window was collected over.
    pub interval: u64,
    /// Interval for the following sleep and window.
    pub next_interval: u64,
    pub alarm_mode: bool,
    pub alert_count: u64,
    pub avg_change_interval: f64,
    pub significant_changes: u64,
    /// Carried sum after this cycle.
    pub cumulative_sum: f64,
    /// Value the alarm compared against its threshold.
    pub alarm_observed: f64,
    pub samples: usize,
}

impl CycleOutcome {
    /// The `(next_interval, alarm_mode, alert_count)` triple that defines a transition.
    pub fn transition(&self) -> (u64, bool, u64) {
        (self.next_interval, self.alarm_mode, self.alert_count)
    }
}

/// Adaptive interval state machine for one metric.
pub struct IntervalController {
    metric: MetricSpec,
    settings: ControllerSettings,
    analyzer: ChangeAnalyzer,
    alarm: CumulativeAlarm,
    policy: Arc<dyn IntervalPolicy>,
    state: ControllerState,
    phase: Phase,
}

impl fmt::Debug for IntervalController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntervalController")
            .field("metric", &self.metric)
            .field("policy", &self.policy.name())
            .field("state", &self.state)
            .field("phase", &self.phase)
            .finish()
    }
}

impl IntervalController {
    /// Fresh controller at the configured default interval with zero sum and count.
    pub fn new(
        metric: MetricSpec,
        settings: ControllerSettings,
        policy: Arc<dyn IntervalPolicy>,
    ) -> Self {
        let state = ControllerState::new(settings.clamp(settings.default_interval));
        Self::with_state(metric, settings, policy, state)
    }

    /// Controller resuming from an explicit state. The interval is clamped.
    pub fn with_state(
        metric: MetricSpec,
        settings: ControllerSettings,
        policy: Arc<dyn IntervalPolicy>,
        mut state: ControllerState,
    ) -> Self {
        state.current_interval = settings.clamp(state.current_interval);
        Self {
            analyzer: ChangeAnalyzer::new(settings.update_threshold, settings.tick),
            alarm: CumulativeAlarm::new(settings.alarm, settings.cumulative_threshold),
            metric,
            settings,
            policy,
            state,
            phase: Phase::Idle,
        }
    }

    pub fn metric(&self) -> &MetricSpec {
        &self.metric
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    pub fn policy(&self) -> &dyn IntervalPolicy {
        self.policy.as_ref()
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Starting point of the running sum written with each sample record.
    ///
    /// Under [`AlarmPolicy::Accumulate`] this is the carried sum, so rows show
    /// the total the alarm will compare. Under [`AlarmPolicy::Rate`] the carry
    /// is the previous window's sum, so rows restart from zero each window.
    pub fn window_base(&self) -> f64 {
        match self.settings.alarm {
            AlarmPolicy::Accumulate => self.state.cumulative_sum,
            AlarmPolicy::Rate => 0.0,
        }
    }

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    /// Analyze a finished window and advance the state.
    pub fn evaluate(&mut self, window: &Window) -> CycleOutcome {
        self.phase = Phase::Analyzing;

        let interval = self.state.current_interval;
        let change = self.analyzer.analyze(window.samples());
        let decision = self.alarm.evaluate(window.sum(), self.state.cumulative_sum, interval);

        let next_interval = if decision.tripped {
            self.phase = Phase::AlarmTripped;
            self.state.alert_count += 1;
            self.settings.min_interval
        } else {
            self.phase = Phase::IntervalAdjusting;
            self.settings.clamp(self.policy.decide(change.avg_change_interval, interval))
        };

        self.state.cumulative_sum = decision.carried;
        self.state.alarm_mode = decision.tripped;
        self.state.current_interval = next_interval;

        CycleOutcome {
            interval,
            next_interval,
            alarm_mode: decision.tripped,
            alert_count: self.state.alert_count,
            avg_change_interval: change.avg_change_interval,
            significant_changes: change.significant_changes,
            cumulative_sum: decision.carried,
            alarm_observed: decision.observed,
            samples: window.len(),
        }
    }
}
