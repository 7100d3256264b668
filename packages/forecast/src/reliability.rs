//! Reliability scoring of the history behind a forecast.
//!
//! The composite score combines four normalized factors with fixed weights:
//!
//! | Factor | Weight | Normalization |
//! |---|---|---|
//! | sample size | 0.4 | `min(n / 50, 1)` |
//! | variance | 0.3 | `max(0, 1 - min(var / (mean + 1), 2) / 2)` |
//! | years covered | 0.2 | `min(years / 3, 1)` |
//! | model confidence | 0.2 | `max(0, confidence - 0.5)` |
//!
//! The weighted sum is clamped to `[0, 1]`. Dashboards compare scores
//! across releases, so the weights and caps must not change.

use std::collections::BTreeSet;

use crime_map_forecast_models::{HistoricalPoint, ReliabilityMetrics};

const SAMPLE_WEIGHT: f64 = 0.4;
const VARIANCE_WEIGHT: f64 = 0.3;
const COVERAGE_WEIGHT: f64 = 0.2;
const CONFIDENCE_WEIGHT: f64 = 0.2;

/// Sample size at which the sample factor saturates.
const SAMPLE_CAP: f64 = 50.0;
/// Upper bound of the normalized variance.
const VARIANCE_CAP: f64 = 2.0;
/// Number of years at which the coverage factor saturates.
const COVERAGE_CAP: f64 = 3.0;

/// Score reported for a group with no history.
const EMPTY_SCORE: f64 = 0.1;

/// Monthly averages must vary by more than this share of their mean to
/// count as seasonal.
const SEASONAL_THRESHOLD: f64 = 0.1;

/// Two-sided normal quantiles by confidence level.
const Z_TABLE: [(f64, f64); 5] = [
    (0.70, 1.036),
    (0.80, 1.282),
    (0.90, 1.645),
    (0.95, 1.960),
    (0.99, 2.576),
];

/// Mean and population variance.
#[allow(clippy::cast_precision_loss)]
fn mean_and_variance(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance)
}

/// Normal quantile for a two-sided `confidence`, interpolated linearly
/// between table rows and clamped to the table's ends.
fn z_score(confidence: f64) -> f64 {
    let (first_level, first_z) = Z_TABLE[0];
    if confidence <= first_level {
        return first_z;
    }
    for pair in Z_TABLE.windows(2) {
        let ((lo, lo_z), (hi, hi_z)) = (pair[0], pair[1]);
        if confidence <= hi {
            return lo_z + (hi_z - lo_z) * (confidence - lo) / (hi - lo);
        }
    }
    Z_TABLE[Z_TABLE.len() - 1].1
}

/// Whether the averages of the 12 calendar months vary enough to indicate
/// a seasonal pattern. A month without data averages 0.
fn has_seasonal_pattern(series: &[HistoricalPoint]) -> bool {
    let mut sums = [0.0f64; 12];
    let mut counts = [0u32; 12];
    for point in series {
        if let Some(index) = point.month.checked_sub(1).filter(|m| *m < 12) {
            let index = index as usize;
            sums[index] += f64::from(point.count);
            counts[index] += 1;
        }
    }

    let averages: Vec<f64> = sums
        .iter()
        .zip(counts)
        .map(|(sum, count)| if count == 0 { 0.0 } else { sum / f64::from(count) })
        .collect();

    let (mean, variance) = mean_and_variance(&averages);
    variance > SEASONAL_THRESHOLD * mean
}

/// Composite score from its already-normalized inputs.
///
/// Exposed so the monotonicity of each factor can be reasoned about
/// independently of a concrete series.
#[must_use]
pub fn composite_score(
    sample_size: usize,
    normalized_variance: f64,
    time_span_coverage: usize,
    confidence: f64,
) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let (sample, coverage) = (sample_size as f64, time_span_coverage as f64);
    let sample_factor = (sample / SAMPLE_CAP).min(1.0);
    let variance_factor = (1.0 - normalized_variance / VARIANCE_CAP).max(0.0);
    let coverage_factor = (coverage / COVERAGE_CAP).min(1.0);
    let confidence_factor = (confidence - 0.5).max(0.0);

    CONFIDENCE_WEIGHT
        .mul_add(
            confidence_factor,
            COVERAGE_WEIGHT.mul_add(
                coverage_factor,
                SAMPLE_WEIGHT.mul_add(sample_factor, VARIANCE_WEIGHT * variance_factor),
            ),
        )
        .clamp(0.0, 1.0)
}

/// Computes reliability metrics for one group's series at the forecast's
/// stated `confidence`.
#[must_use]
pub fn calculate_reliability(series: &[HistoricalPoint], confidence: f64) -> ReliabilityMetrics {
    let sample_size = series.len();
    if sample_size == 0 {
        return ReliabilityMetrics {
            score: EMPTY_SCORE,
            sample_size: 0,
            historical_variance: 0.0,
            confidence_interval: 0.0,
            time_span_coverage: 0,
            seasonal_pattern: false,
        };
    }

    let values: Vec<f64> = series.iter().map(|p| f64::from(p.count)).collect();
    let (mean, variance) = mean_and_variance(&values);
    let normalized_variance = (variance / (mean + 1.0)).min(VARIANCE_CAP);
    let time_span_coverage = series
        .iter()
        .map(|p| p.year)
        .collect::<BTreeSet<_>>()
        .len();

    #[allow(clippy::cast_precision_loss)]
    let standard_error = variance.sqrt() / (sample_size as f64).sqrt();
    let confidence_interval = (z_score(confidence) * standard_error / (mean + 1.0)).clamp(0.0, 1.0);

    ReliabilityMetrics {
        score: composite_score(
            sample_size,
            normalized_variance,
            time_span_coverage,
            confidence,
        ),
        sample_size,
        historical_variance: variance,
        confidence_interval,
        time_span_coverage,
        seasonal_pattern: has_seasonal_pattern(series),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(year: i32, month: u32, count: u32) -> HistoricalPoint {
        HistoricalPoint {
            year,
            month,
            precinct: 14,
            crime_type: 2,
            count,
            time_of_day: String::new(),
            cluster_id: None,
        }
    }

    #[test]
    fn empty_series_gets_default_low_score() {
        let metrics = calculate_reliability(&[], 0.95);
        assert!((metrics.score - 0.1).abs() < f64::EPSILON);
        assert_eq!(metrics.sample_size, 0);
        assert_eq!(metrics.time_span_coverage, 0);
        assert!(!metrics.seasonal_pattern);
    }

    #[test]
    fn score_matches_weighted_formula() {
        // Ten flat months in one year: variance 0, coverage 1.
        let series: Vec<HistoricalPoint> = (1..=10).map(|m| point(2024, m, 5)).collect();
        let metrics = calculate_reliability(&series, 0.9);
        let expected = 0.4 * (10.0 / 50.0) + 0.3 + 0.2 * (1.0 / 3.0) + 0.2 * 0.4;
        assert!((metrics.score - expected).abs() < 1e-9);
        assert!(metrics.historical_variance.abs() < f64::EPSILON);
        assert!(metrics.confidence_interval.abs() < f64::EPSILON);
        assert_eq!(metrics.time_span_coverage, 1);
    }

    #[test]
    fn score_saturates_at_one() {
        let score = composite_score(500, 0.0, 10, 1.0);
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn score_is_monotonic_in_sample_size_and_variance() {
        let mut previous = 0.0;
        for n in 0..=80 {
            let score = composite_score(n, 0.5, 2, 0.8);
            assert!(score >= previous);
            previous = score;
        }

        let mut previous = f64::INFINITY;
        for step in 0..=30 {
            let score = composite_score(20, f64::from(step) * 0.1, 2, 0.8);
            assert!(score <= previous);
            previous = score;
        }
    }

    #[test]
    fn normalized_variance_is_capped() {
        let series = vec![point(2024, 1, 0), point(2024, 2, 100)];
        let metrics = calculate_reliability(&series, 0.7);
        // Variance 2500 over mean 50: capped at 2, variance factor 0.
        let expected = 0.4 * (2.0 / 50.0) + 0.2 * (1.0 / 3.0) + 0.2 * 0.2;
        assert!((metrics.score - expected).abs() < 1e-9);
        assert!((metrics.historical_variance - 2500.0).abs() < 1e-9);
        assert!(metrics.confidence_interval <= 1.0);
    }

    #[test]
    fn coverage_counts_distinct_years() {
        let series = vec![
            point(2022, 1, 3),
            point(2023, 1, 3),
            point(2023, 2, 3),
            point(2024, 5, 3),
        ];
        assert_eq!(calculate_reliability(&series, 0.9).time_span_coverage, 3);
    }

    #[test]
    fn equal_monthly_averages_are_not_seasonal() {
        let series: Vec<HistoricalPoint> = (1..=12).map(|m| point(2024, m, 8)).collect();
        assert!(!calculate_reliability(&series, 0.9).seasonal_pattern);
    }

    #[test]
    fn varying_monthly_averages_are_seasonal() {
        let series: Vec<HistoricalPoint> = (1..=12)
            .map(|m| point(2024, m, if (6..=8).contains(&m) { 30 } else { 5 }))
            .collect();
        assert!(calculate_reliability(&series, 0.9).seasonal_pattern);
    }

    #[test]
    fn months_without_data_count_as_zero_averages() {
        // Flat counts in the first half of the year only: averages are
        // six 10s and six 0s, variance 25 against a mean of 5.
        let series: Vec<HistoricalPoint> = (1..=6).map(|m| point(2024, m, 10)).collect();
        assert!(calculate_reliability(&series, 0.9).seasonal_pattern);
    }

    #[test]
    fn all_zero_months_are_not_seasonal() {
        let series = vec![point(2024, 3, 0), point(2024, 4, 0)];
        assert!(!calculate_reliability(&series, 0.9).seasonal_pattern);
    }

    #[test]
    fn z_scores_follow_table() {
        assert!((z_score(0.95) - 1.96).abs() < 1e-9);
        assert!((z_score(0.5) - 1.036).abs() < 1e-9);
        assert!((z_score(0.999) - 2.576).abs() < 1e-9);
        let mid = z_score(0.925);
        assert!(mid > 1.645 && mid < 1.96);
    }
}
