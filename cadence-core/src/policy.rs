//! Interval adjustment policies.
//!
//! A policy turns the analyzer's average change interval into the next poll
//! interval. The rule for direction is shared: when significant changes arrive
//! faster than the current interval the metric is under-sampled and the
//! interval shrinks, otherwise it grows. Policies only choose the step size.
//! The controller clamps every result to `[min, max]`.

use crate::error::{CadenceError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Strategy for deriving the next interval.
pub trait IntervalPolicy: Send + Sync + fmt::Debug {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Next interval in ticks, before clamping.
    fn decide(&self, avg_change_interval: f64, current: u64) -> u64;
}

/// True when changes arrive faster than the current cadence can resolve.
pub fn should_speed_up(avg_change_interval: f64, current: u64) -> bool {
    avg_change_interval < current as f64
}

/// Halve on fast change, double otherwise. Integer halving.
#[derive(Debug, Clone, Copy, Default)]
pub struct HalveDouble;

impl IntervalPolicy for HalveDouble {
    fn name(&self) -> &'static str {
        "halve_double"
    }

    fn decide(&self, avg_change_interval: f64, current: u64) -> u64 {
        if should_speed_up(avg_change_interval, current) {
            current / 2
        } else {
            current.saturating_mul(2)
        }
    }
}

/// Move by a constant number of ticks.
#[derive(Debug, Clone, Copy)]
pub struct FixedStep {
    pub step: u64,
}

impl IntervalPolicy for FixedStep {
    fn name(&self) -> &'static str {
        "fixed_step"
    }

    fn decide(&self, avg_change_interval: f64, current: u64) -> u64 {
        if should_speed_up(avg_change_interval, current) {
            current.saturating_sub(self.step)
        } else {
            current.saturating_add(self.step)
        }
    }
}

/// Move by a fraction of the current interval, at least one tick.
#[derive(Debug, Clone, Copy)]
pub struct Proportional {
    pub factor: f64,
}

impl IntervalPolicy for Proportional {
    fn name(&self) -> &'static str {
        "proportional"
    }

    fn decide(&self, avg_change_interval: f64, current: u64) -> u64 {
        let delta = ((current as f64 * self.factor).round() as u64).max(1);
        if should_speed_up(avg_change_interval, current) {
            current.saturating_sub(delta)
        } else {
            current.saturating_add(delta)
        }
    }
}

/// Policy selection as it appears in the config file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyConfig {
    #[default]
    HalveDouble,
    FixedStep {
        step: u64,
    },
    Proportional {
        factor: f64,
    },
}

impl PolicyConfig {
    pub fn validate(&self) -> Result<()> {
        match *self {
            PolicyConfig::HalveDouble => Ok(()),
            PolicyConfig::FixedStep { step } if step == 0 => Err(CadenceError::InvalidConfig {
                reason: "policy.step must be at least 1".to_string(),
            }),
            PolicyConfig::Proportional { factor } if !(factor.is_finite() && factor > 0.0) => {
                Err(CadenceError::InvalidConfig {
                    reason: "policy.factor must be a positive number".to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Instantiate the configured policy.
    pub fn build(&self) -> Arc<dyn IntervalPolicy> {
        match *self {
            PolicyConfig::HalveDouble => Arc::new(HalveDouble),
            PolicyConfig::FixedStep { step } => Arc::new(FixedStep { step }),
            PolicyConfig::Proportional { factor } => Arc::new(Proportional { factor }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_halve_double() {
        let policy = HalveDouble;
        assert_eq!(policy.decide(1.0, 15), 7);
        assert_eq!(policy.decide(f64::INFINITY, 15), 30);
        assert_eq!(policy.decide(100.0, 900), 450);
        assert_eq!(policy.decide(f64::INFINITY, 10), 20);
        // equal average is not "faster"
        assert_eq!(policy.decide(15.0, 15), 30);
    }

    #[test]
    fn test_fixed_step() {
        let policy = FixedStep { step: 5 };
        assert_eq!(policy.decide(1.0, 15), 10);
        assert_eq!(policy.decide(f64::INFINITY, 15), 20);
        assert_eq!(policy.decide(0.5, 3), 0);
    }

    #[test]
    fn test_proportional() {
        let policy = Proportional { factor: 0.25 };
        assert_eq!(policy.decide(1.0, 100), 75);
        assert_eq!(policy.decide(f64::INFINITY, 100), 125);
        // always moves at least one tick
        assert_eq!(policy.decide(f64::INFINITY, 1), 2);
    }

    #[test]
    fn test_policy_config_yaml() {
        let config: PolicyConfig = serde_yaml::from_str("kind: proportional\nfactor: 0.5\n").unwrap();
        assert_eq!(config, PolicyConfig::Proportional { factor: 0.5 });
        assert_eq!(config.build().name(), "proportional");

        let config: PolicyConfig = serde_yaml::from_str("kind: halve_double\n").unwrap();
        assert_eq!(config.build().name(), "halve_double");
    }

    #[test]
    fn test_policy_config_validate() {
        assert!(PolicyConfig::FixedStep { step: 0 }.validate().is_err());
        assert!(PolicyConfig::Proportional { factor: -1.0 }.validate().is_err());
        assert!(PolicyConfig::Proportional { factor: 0.3 }.validate().is_ok());
        assert!(PolicyConfig::HalveDouble.validate().is_ok());
    }
}
