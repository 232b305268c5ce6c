use std::{fmt, str::FromStr};

use serde::Deserialize;

use crate::model::{MeasurementSeries, Sample};

/// Percent change below which a series counts as stable.
const STABLE_THRESHOLD_PERCENT: f64 = 5.0;
/// Percent change above which a trend is "strong".
const STRONG_THRESHOLD_PERCENT: f64 = 20.0;

// ==================== Trend Types ====================

/// Algorithm used to turn a series into a percent change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendMethod {
    /// Least-squares slope over sample index, scaled to the whole series
    #[default]
    Regression,
    /// Average of the last third compared with the average of the first third
    Thirds,
}

impl FromStr for TrendMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "regression" => Ok(TrendMethod::Regression),
            "thirds" => Ok(TrendMethod::Thirds),
            other => Err(format!(
                "unknown trend method '{}', expected 'regression' or 'thirds'",
                other
            )),
        }
    }
}

impl fmt::Display for TrendMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendMethod::Regression => write!(f, "regression"),
            TrendMethod::Thirds => write!(f, "thirds"),
        }
    }
}

/// Direction of a trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendLabel {
    StronglyIncreasing,
    Increasing,
    Stable,
    Decreasing,
    StronglyDecreasing,
    /// Fewer than two samples
    Insufficient,
}

impl TrendLabel {
    /// Returns the human-readable label shown next to the statistics.
    pub fn description(&self) -> &'static str {
        match self {
            TrendLabel::StronglyIncreasing => "strongly increasing",
            TrendLabel::Increasing => "increasing",
            TrendLabel::Stable => "stable",
            TrendLabel::Decreasing => "decreasing",
            TrendLabel::StronglyDecreasing => "strongly decreasing",
            TrendLabel::Insufficient => "insufficient data for trend analysis",
        }
    }

    /// Classify a percent change.
    pub fn from_percent_change(percent: f64) -> Self {
        if percent.abs() < STABLE_THRESHOLD_PERCENT {
            TrendLabel::Stable
        } else if percent > STRONG_THRESHOLD_PERCENT {
            TrendLabel::StronglyIncreasing
        } else if percent > 0.0 {
            TrendLabel::Increasing
        } else if percent < -STRONG_THRESHOLD_PERCENT {
            TrendLabel::StronglyDecreasing
        } else {
            TrendLabel::Decreasing
        }
    }
}

impl fmt::Display for TrendLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

// ==================== Statistical Analysis ====================

/// Summary statistics of a series.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesStats {
    pub min: f64,
    pub max: f64,
    /// Arithmetic mean
    pub average: f64,
    pub sample_count: usize,
}

/// Statistics plus trend for one series.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendResult {
    pub stats: SeriesStats,
    pub trend: TrendLabel,
    /// `None` when there were fewer than two samples
    pub percent_change: Option<f64>,
}

/// Calculate min, max and mean. Returns `None` for an empty slice.
pub fn calculate_stats(samples: &[Sample]) -> Option<SeriesStats> {
    if samples.is_empty() {
        return None;
    }

    let (min, max, sum) = samples.iter().fold(
        (f64::INFINITY, f64::NEG_INFINITY, 0.0),
        |(min, max, sum), s| (min.min(s.value), max.max(s.value), sum + s.value),
    );

    Some(SeriesStats {
        min,
        max,
        average: sum / samples.len() as f64,
        sample_count: samples.len(),
    })
}

/// Values ordered by timestamp ascending.
fn time_ordered_values(samples: &[Sample]) -> Vec<f64> {
    let mut sorted: Vec<&Sample> = samples.iter().collect();
    sorted.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    sorted.into_iter().map(|s| s.value).collect()
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn regression_percent_change(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let (sum_x, sum_y, sum_xy, sum_x2) = values.iter().enumerate().fold(
        (0.0, 0.0, 0.0, 0.0),
        |(sx, sy, sxy, sx2), (i, &y)| {
            let x = i as f64;
            (sx + x, sy + y, sxy + x * y, sx2 + x * x)
        },
    );

    let slope = (n * sum_xy - sum_x * sum_y) / (n * sum_x2 - sum_x * sum_x);
    let average = sum_y / n;
    let total_change = slope * (n - 1.0);

    if average != 0.0 {
        total_change / average * 100.0
    } else {
        0.0
    }
}

fn thirds_percent_change(values: &[f64]) -> f64 {
    let n = values.len();
    // With two samples n/3 is zero; the first third must hold at least one value.
    let first_end = (n / 3).max(1);
    let last_start = 2 * n / 3;

    let first_avg = mean(&values[..first_end]);
    let last_avg = mean(&values[last_start..]);

    if first_avg != 0.0 {
        (last_avg - first_avg) / first_avg * 100.0
    } else {
        0.0
    }
}

/// Percent change over the series, or `None` with fewer than two samples.
pub fn percent_change(samples: &[Sample], method: TrendMethod) -> Option<f64> {
    if samples.len() < 2 {
        return None;
    }
    let values = time_ordered_values(samples);
    Some(match method {
        TrendMethod::Regression => regression_percent_change(&values),
        TrendMethod::Thirds => thirds_percent_change(&values),
    })
}

/// Determine the trend label for a set of samples.
pub fn determine_trend(samples: &[Sample], method: TrendMethod) -> TrendLabel {
    percent_change(samples, method)
        .map(TrendLabel::from_percent_change)
        .unwrap_or(TrendLabel::Insufficient)
}

/// Full analysis of a series. Returns `None` when it holds no samples.
pub fn analyze(series: &MeasurementSeries, method: TrendMethod) -> Option<TrendResult> {
    let stats = calculate_stats(&series.samples)?;
    let percent_change = percent_change(&series.samples, method);
    let trend = percent_change
        .map(TrendLabel::from_percent_change)
        .unwrap_or(TrendLabel::Insufficient);

    Some(TrendResult {
        stats,
        trend,
        percent_change,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(values: &[f64]) -> Vec<Sample> {
        values
            .iter()
            .enumerate()
            .map(|(i, &value)| Sample {
                timestamp: format!("2025-04-{:02} 12:00:00", i + 1),
                value,
            })
            .collect()
    }

    fn series(values: &[f64]) -> MeasurementSeries {
        MeasurementSeries {
            key: "PM10".to_string(),
            parameter_code: None,
            samples: samples(values),
        }
    }

    // ==================== Boundary Tests ====================

    #[test]
    fn test_analyze_empty_is_none() {
        assert!(analyze(&series(&[]), TrendMethod::Regression).is_none());
        assert!(analyze(&series(&[]), TrendMethod::Thirds).is_none());
    }

    #[test]
    fn test_analyze_single_sample() {
        for method in [TrendMethod::Regression, TrendMethod::Thirds] {
            let result = analyze(&series(&[42.5]), method).unwrap();
            assert_eq!(result.stats.min, 42.5);
            assert_eq!(result.stats.max, 42.5);
            assert_eq!(result.stats.average, 42.5);
            assert_eq!(result.trend, TrendLabel::Insufficient);
            assert_eq!(
                result.trend.description(),
                "insufficient data for trend analysis"
            );
            assert!(result.percent_change.is_none());
        }
    }

    #[test]
    fn test_calculate_stats() {
        let stats = calculate_stats(&samples(&[20.0, 40.0, 60.0, 80.0])).unwrap();
        assert_eq!(stats.min, 20.0);
        assert_eq!(stats.max, 80.0);
        assert_eq!(stats.average, 50.0);
        assert_eq!(stats.sample_count, 4);
    }

    // ==================== Thirds Policy ====================

    #[test]
    fn test_thirds_strongly_increasing_example() {
        let data = samples(&[10.0, 10.0, 10.0, 50.0, 90.0, 90.0, 90.0]);
        let change = percent_change(&data, TrendMethod::Thirds).unwrap();
        assert!((change - 800.0).abs() < 1e-9);
        assert_eq!(
            determine_trend(&data, TrendMethod::Thirds),
            TrendLabel::StronglyIncreasing
        );
    }

    #[test]
    fn test_thirds_stable_example() {
        let data = samples(&[100.0, 100.0, 100.0, 101.0, 102.0, 102.0, 102.0]);
        let change = percent_change(&data, TrendMethod::Thirds).unwrap();
        assert!((change - 2.0).abs() < 1e-9);
        assert_eq!(determine_trend(&data, TrendMethod::Thirds), TrendLabel::Stable);
    }

    #[test]
    fn test_thirds_two_samples() {
        let data = samples(&[10.0, 5.0]);
        assert_eq!(
            determine_trend(&data, TrendMethod::Thirds),
            TrendLabel::StronglyDecreasing
        );
    }

    #[test]
    fn test_thirds_zero_first_average() {
        let data = samples(&[0.0, 0.0, 0.0, 5.0, 9.0, 9.0]);
        assert_eq!(percent_change(&data, TrendMethod::Thirds), Some(0.0));
    }

    // ==================== Regression Policy ====================

    #[test]
    fn test_regression_linear_increase() {
        // slope 10, total change 40, mean 30 -> 133%
        let data = samples(&[10.0, 20.0, 30.0, 40.0, 50.0]);
        let change = percent_change(&data, TrendMethod::Regression).unwrap();
        assert!((change - 400.0 / 3.0).abs() < 1e-9);
        assert_eq!(
            determine_trend(&data, TrendMethod::Regression),
            TrendLabel::StronglyIncreasing
        );
    }

    #[test]
    fn test_regression_mild_decrease() {
        // slope -3, total change -12, mean 98 -> -12.2%
        let data = samples(&[104.0, 101.0, 98.0, 95.0, 92.0]);
        assert_eq!(
            determine_trend(&data, TrendMethod::Regression),
            TrendLabel::Decreasing
        );
    }

    #[test]
    fn test_regression_stable_example() {
        let data = samples(&[100.0, 100.0, 100.0, 101.0, 102.0, 102.0, 102.0]);
        assert_eq!(
            determine_trend(&data, TrendMethod::Regression),
            TrendLabel::Stable
        );
    }

    #[test]
    fn test_regression_zero_average() {
        let data = samples(&[-1.0, 1.0]);
        assert_eq!(percent_change(&data, TrendMethod::Regression), Some(0.0));
    }

    #[test]
    fn test_trend_uses_timestamp_order_not_input_order() {
        let mut data = samples(&[10.0, 20.0, 30.0, 40.0, 50.0]);
        data.reverse();
        assert_eq!(
            determine_trend(&data, TrendMethod::Regression),
            TrendLabel::StronglyIncreasing
        );
        assert_eq!(
            determine_trend(&data, TrendMethod::Thirds),
            TrendLabel::StronglyIncreasing
        );
    }

    // ==================== Classification ====================

    #[test]
    fn test_classification_thresholds() {
        assert_eq!(TrendLabel::from_percent_change(0.0), TrendLabel::Stable);
        assert_eq!(TrendLabel::from_percent_change(4.99), TrendLabel::Stable);
        assert_eq!(TrendLabel::from_percent_change(-4.99), TrendLabel::Stable);
        assert_eq!(TrendLabel::from_percent_change(5.0), TrendLabel::Increasing);
        assert_eq!(TrendLabel::from_percent_change(20.0), TrendLabel::Increasing);
        assert_eq!(
            TrendLabel::from_percent_change(20.01),
            TrendLabel::StronglyIncreasing
        );
        assert_eq!(TrendLabel::from_percent_change(-5.0), TrendLabel::Decreasing);
        assert_eq!(TrendLabel::from_percent_change(-20.0), TrendLabel::Decreasing);
        assert_eq!(
            TrendLabel::from_percent_change(-20.01),
            TrendLabel::StronglyDecreasing
        );
    }

    #[test]
    fn test_trend_label_display() {
        assert_eq!(TrendLabel::StronglyIncreasing.to_string(), "strongly increasing");
        assert_eq!(TrendLabel::Decreasing.to_string(), "decreasing");
    }

    #[test]
    fn test_trend_method_parsing() {
        assert_eq!("regression".parse::<TrendMethod>(), Ok(TrendMethod::Regression));
        assert_eq!(" Thirds ".parse::<TrendMethod>(), Ok(TrendMethod::Thirds));
        assert!("median".parse::<TrendMethod>().is_err());
        assert_eq!(TrendMethod::default(), TrendMethod::Regression);
    }

    // ==================== Property-Based Tests ====================

    mod proptest_tests {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            #[test]
            fn stats_bound_the_average(
                values in prop::collection::vec(-500.0f64..500.0, 1..100)
            ) {
                let stats = calculate_stats(&samples(&values)).unwrap();
                prop_assert!(stats.min <= stats.average + 1e-9);
                prop_assert!(stats.average <= stats.max + 1e-9);
                prop_assert_eq!(stats.sample_count, values.len());
            }

            #[test]
            fn constant_series_is_stable(
                value in 1.0f64..1000.0,
                len in 2usize..60
            ) {
                let data = samples(&vec![value; len]);
                prop_assert_eq!(determine_trend(&data, TrendMethod::Regression), TrendLabel::Stable);
                prop_assert_eq!(determine_trend(&data, TrendMethod::Thirds), TrendLabel::Stable);
            }

            #[test]
            fn two_or_more_samples_never_insufficient(
                values in prop::collection::vec(0.1f64..500.0, 2..80)
            ) {
                let data = samples(&values);
                prop_assert_ne!(determine_trend(&data, TrendMethod::Regression), TrendLabel::Insufficient);
                prop_assert_ne!(determine_trend(&data, TrendMethod::Thirds), TrendLabel::Insufficient);
            }
        }
    }
}
