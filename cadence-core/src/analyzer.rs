//! Significant-change detection over one polling window.
//!
//! Consecutive samples are compared series by series, paired by position in
//! the result set (not by label identity). A pair is a significant change when
//! `|curr - prev| / prev` exceeds the update threshold; pairs with `prev == 0`
//! are skipped. When result sets differ in length, pairing stops at the
//! shorter one.

use crate::source::Sample;
use std::time::Duration;

/// Outcome of analyzing one window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChangeSummary {
    /// Number of (prev, curr) value pairs whose relative change exceeded the threshold.
    pub significant_changes: u64,
    /// Sum of sample gaps, in ticks, over every significant change.
    pub total_gap: f64,
    /// `total_gap / significant_changes`, or `+inf` when nothing changed.
    pub avg_change_interval: f64,
}

impl ChangeSummary {
    /// Summary for a window that saw no significant change.
    pub fn quiet() -> Self {
        Self { significant_changes: 0, total_gap: 0.0, avg_change_interval: f64::INFINITY }
    }

    pub fn is_quiet(&self) -> bool {
        self.significant_changes == 0
    }
}

/// Relative change between two values, or `None` when `prev` is zero or
/// either value is not finite.
pub fn change_ratio(prev: f64, curr: f64) -> Option<f64> {
    if prev == 0.0 || !prev.is_finite() || !curr.is_finite() {
        return None;
    }
    Some(((curr - prev) / prev).abs())
}

/// Computes significant-change statistics for a window of samples.
#[derive(Debug, Clone, Copy)]
pub struct ChangeAnalyzer {
    update_threshold: f64,
    tick: Duration,
}

impl ChangeAnalyzer {
    /// `update_threshold` is a fraction (0.10 = 10%); gaps are reported in units of `tick`.
    pub fn new(update_threshold: f64, tick: Duration) -> Self {
        Self { update_threshold, tick }
    }

    /// Analyze samples in collection order.
    pub fn analyze(&self, samples: &[Sample]) -> ChangeSummary {
        if samples.len() < 2 {
            return ChangeSummary::quiet();
        }

        let tick_secs = self.tick.as_secs_f64();
        let mut significant_changes = 0u64;
        let mut total_gap = 0.0;

        for pair in samples.windows(2) {
            let (previous, current) = (&pair[0], &pair[1]);
            let gap = current.at.saturating_duration_since(previous.at).as_secs_f64() / tick_secs;

            for (prev, curr) in previous.series.iter().zip(&current.series) {
                match change_ratio(prev.value, curr.value) {
                    Some(ratio) if ratio > self.update_threshold => {
                        total_gap += gap;
                        significant_changes += 1;
                    }
                    _ => {}
                }
            }
        }

        if significant_changes == 0 {
            return ChangeSummary::quiet();
        }

        ChangeSummary {
            significant_changes,
            total_gap,
            avg_change_interval: total_gap / significant_changes as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Series;
    use tokio::time::Instant;

    fn window(values: &[&[f64]], gap_secs: u64) -> Vec<Sample> {
        let start = Instant::now();
        values
            .iter()
            .enumerate()
            .map(|(i, vals)| {
                Sample::new(
                    start + Duration::from_secs(gap_secs * i as u64),
                    vals.iter().copied().map(Series::value).collect(),
                )
            })
            .collect()
    }

    fn analyzer() -> ChangeAnalyzer {
        ChangeAnalyzer::new(0.10, Duration::from_secs(1))
    }

    #[test]
    fn test_change_ratio() {
        assert_eq!(change_ratio(0.0, 5.0), None);
        assert_eq!(change_ratio(100.0, 112.0), Some(0.12));
        assert_eq!(change_ratio(-10.0, -5.0), Some(0.5));
        assert_eq!(change_ratio(f64::NAN, 5.0), None);
        assert_eq!(change_ratio(5.0, f64::INFINITY), None);
    }

    #[test]
    fn test_significant_change_one_tick_apart() {
        let summary = analyzer().analyze(&window(&[&[100.0], &[112.0]], 1));
        assert_eq!(summary.significant_changes, 1);
        assert_eq!(summary.avg_change_interval, 1.0);
    }

    #[test]
    fn test_small_change_is_quiet() {
        let summary = analyzer().analyze(&window(&[&[100.0], &[105.0]], 1));
        assert!(summary.is_quiet());
        assert_eq!(summary.avg_change_interval, f64::INFINITY);
    }

    #[test]
    fn test_exact_threshold_is_not_significant() {
        let summary = analyzer().analyze(&window(&[&[100.0], &[110.0]], 1));
        assert!(summary.is_quiet());
    }

    #[test]
    fn test_zero_previous_is_skipped() {
        let summary = analyzer().analyze(&window(&[&[0.0], &[50.0], &[50.0]], 1));
        assert!(summary.is_quiet());

        let summary = analyzer().analyze(&window(&[&[0.0, 10.0], &[7.0, 20.0]], 2));
        assert_eq!(summary.significant_changes, 1);
        assert_eq!(summary.avg_change_interval, 2.0);
    }

    #[test]
    fn test_fewer_than_two_samples() {
        assert!(analyzer().analyze(&[]).is_quiet());
        assert!(analyzer().analyze(&window(&[&[1.0]], 1)).is_quiet());
    }

    #[test]
    fn test_mismatched_series_truncate_to_shorter() {
        let summary = analyzer().analyze(&window(&[&[10.0, 10.0, 10.0], &[10.0]], 1));
        assert!(summary.is_quiet());

        let summary = analyzer().analyze(&window(&[&[10.0], &[20.0, 99.0]], 1));
        assert_eq!(summary.significant_changes, 1);
    }

    #[test]
    fn test_average_over_several_changes() {
        // gaps of 3 ticks; changes at pairs 1 and 3 only
        let summary = analyzer().analyze(&window(&[&[10.0], &[20.0], &[20.5], &[40.0]], 3));
        assert_eq!(summary.significant_changes, 2);
        assert_eq!(summary.total_gap, 6.0);
        assert_eq!(summary.avg_change_interval, 3.0);
    }

    #[test]
    fn test_gap_measured_in_ticks() {
        let analyzer = ChangeAnalyzer::new(0.10, Duration::from_millis(500));
        let summary = analyzer.analyze(&window(&[&[1.0], &[2.0]], 1));
        assert_eq!(summary.avg_change_interval, 2.0);
    }
}
