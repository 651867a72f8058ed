//! Cumulative alarm.
//!
//! Carries a running value across polling windows and decides when it has
//! crossed the absolute threshold. Two policies are supported:
//!
//! - [`AlarmPolicy::Accumulate`]: `combined = window_sum + carried`. Trips
//!   when `combined > threshold` and resets the carry to 0; otherwise the
//!   carry becomes `combined`. Nothing decays, so a metric that never
//!   exceeds the threshold within one window still trips eventually.
//! - [`AlarmPolicy::Rate`]: `|window_sum - carried| / interval`. Trips when
//!   that rate exceeds the threshold. The carry is the last window's sum, or
//!   0 after a trip.

use serde::{Deserialize, Serialize};

/// How the carried value is compared against the threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmPolicy {
    /// Raw running total until trip.
    #[default]
    Accumulate,
    /// Change in window sum per tick.
    Rate,
}

impl AlarmPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlarmPolicy::Accumulate => "accumulate",
            AlarmPolicy::Rate => "rate",
        }
    }
}

impl std::fmt::Display for AlarmPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of evaluating one window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlarmDecision {
    pub tripped: bool,
    /// Value compared against the threshold.
    pub observed: f64,
    /// Carry for the next window.
    pub carried: f64,
}

/// Threshold check over carried sums.
#[derive(Debug, Clone, Copy)]
pub struct CumulativeAlarm {
    policy: AlarmPolicy,
    threshold: f64,
}

impl CumulativeAlarm {
    pub fn new(policy: AlarmPolicy, threshold: f64) -> Self {
        Self { policy, threshold }
    }

    pub fn policy(&self) -> AlarmPolicy {
        self.policy
    }

    /// Evaluate one window.
    ///
    /// `interval` is the window length in ticks and only matters for
    /// [`AlarmPolicy::Rate`].
    pub fn evaluate(&self, window_sum: f64, carried: f64, interval: u64) -> AlarmDecision {
        match self.policy {
            AlarmPolicy::Accumulate => {
                let combined = window_sum + carried;
                if combined > self.threshold {
                    AlarmDecision { tripped: true, observed: combined, carried: 0.0 }
                } else {
                    AlarmDecision { tripped: false, observed: combined, carried: combined }
                }
            }
            AlarmPolicy::Rate => {
                let rate = (window_sum - carried).abs() / interval.max(1) as f64;
                let tripped = rate > self.threshold;
                AlarmDecision {
                    tripped,
                    observed: rate,
                    carried: if tripped { 0.0 } else { window_sum },
                }
            }
        }
    }
}
