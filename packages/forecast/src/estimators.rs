//! Trend models that extrapolate a group's monthly series.
//!
//! All models share the [`Estimator`] contract: given the ordered series
//! of one (precinct, crime type) and a horizon in months, return a
//! non-negative, un-rounded count. Models that need more history than is
//! available degrade to [`LinearEstimator`] instead of failing.

use crime_map_forecast_models::{ForecastModel, ForecastParams, HistoricalPoint};
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::aggregate::add_months;

/// Number of most recent points the linear fit uses.
const LINEAR_WINDOW: usize = 12;

/// Size of each averaging bucket in the quadratic model.
const POLYNOMIAL_BUCKET: usize = 3;

/// Number of most recent points the weighted model averages.
const WEIGHTED_WINDOW: usize = 6;

/// Weights for the weighted model, newest point first.
const RECENCY_WEIGHTS: [f64; WEIGHTED_WINDOW] = [0.4, 0.25, 0.15, 0.1, 0.07, 0.03];

/// Maximum relative jitter applied by [`Perturbation`].
const PERTURBATION_RANGE: f64 = 0.1;

/// A local trend model.
pub trait Estimator: Send + Sync {
    /// Short model name for logs.
    fn name(&self) -> &'static str;

    /// Predicts the count `months_ahead` months after the last point of
    /// `series`. The result is never negative.
    fn estimate(&self, series: &[HistoricalPoint], months_ahead: u32) -> f64;
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let len = values.len() as f64;
    Some(values.iter().sum::<f64>() / len)
}

fn counts(series: &[HistoricalPoint]) -> Vec<f64> {
    series.iter().map(|p| f64::from(p.count)).collect()
}

/// Ordinary least squares over the last [`LINEAR_WINDOW`] points, with the
/// points indexed `1..=n`, evaluated at `n + months_ahead`.
#[allow(clippy::cast_precision_loss)]
fn linear(series: &[HistoricalPoint], months_ahead: u32) -> f64 {
    let window = &series[series.len().saturating_sub(LINEAR_WINDOW)..];
    match window {
        [] => 0.0,
        [only] => f64::from(only.count),
        _ => {
            let n = window.len() as f64;
            let (mut sum_x, mut sum_y, mut sum_xy, mut sum_xx) = (0.0, 0.0, 0.0, 0.0);
            for (i, point) in window.iter().enumerate() {
                let x = (i + 1) as f64;
                let y = f64::from(point.count);
                sum_x += x;
                sum_y += y;
                sum_xy += x * y;
                sum_xx += x * x;
            }
            let slope = n.mul_add(sum_xy, -(sum_x * sum_y)) / n.mul_add(sum_xx, -(sum_x * sum_x));
            let intercept = slope.mul_add(-sum_x, sum_y) / n;
            slope
                .mul_add(n + f64::from(months_ahead), intercept)
                .max(0.0)
        }
    }
}

/// Least-squares trend line.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearEstimator;

impl Estimator for LinearEstimator {
    fn name(&self) -> &'static str {
        "linear"
    }

    fn estimate(&self, series: &[HistoricalPoint], months_ahead: u32) -> f64 {
        linear(series, months_ahead)
    }
}

/// Quadratic extrapolation from the averages of the last three 3-month
/// buckets.
///
/// A bucket with no data takes the average of the next newer bucket, so
/// short series contribute no velocity or acceleration for the missing
/// part.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolynomialEstimator;

impl Estimator for PolynomialEstimator {
    fn name(&self) -> &'static str {
        "polynomial"
    }

    fn estimate(&self, series: &[HistoricalPoint], months_ahead: u32) -> f64 {
        let n = series.len();
        if n < POLYNOMIAL_BUCKET {
            return linear(series, months_ahead);
        }

        let values = counts(series);
        let recent_start = n - POLYNOMIAL_BUCKET;
        let middle_start = n.saturating_sub(2 * POLYNOMIAL_BUCKET);
        let older_start = n.saturating_sub(3 * POLYNOMIAL_BUCKET);

        let recent = mean(&values[recent_start..]).unwrap_or(0.0);
        let middle = mean(&values[middle_start..recent_start]).unwrap_or(recent);
        let older = mean(&values[older_start..middle_start]).unwrap_or(middle);

        let acceleration = 2.0f64.mul_add(-middle, recent + older) / 2.0;
        let velocity = recent - middle;
        let h = f64::from(months_ahead);

        (0.5 * acceleration)
            .mul_add(h * h, velocity.mul_add(h, recent))
            .max(0.0)
    }
}

/// Calendar-month average scaled by the short-term linear trend.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeasonalEstimator;

impl Estimator for SeasonalEstimator {
    fn name(&self) -> &'static str {
        "seasonal"
    }

    fn estimate(&self, series: &[HistoricalPoint], months_ahead: u32) -> f64 {
        let Some(last) = series.last() else {
            return 0.0;
        };

        let (_, target_month) = add_months(last.year, last.month, months_ahead);
        let same_month: Vec<f64> = series
            .iter()
            .filter(|p| p.month == target_month)
            .map(|p| f64::from(p.count))
            .collect();
        let base = mean(&same_month)
            .or_else(|| mean(&counts(series)))
            .unwrap_or(0.0);

        let last_count = if last.count == 0 {
            1.0
        } else {
            f64::from(last.count)
        };
        let trend_ratio = linear(series, 1) / last_count;

        (base * trend_ratio).max(0.0)
    }
}

/// Optional jitter applied by [`WeightedRecentEstimator`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Perturbation {
    /// No jitter; forecasts are deterministic.
    #[default]
    Disabled,
    /// Reproducible jitter derived from the seed, the group and the horizon.
    Seeded(u64),
    /// Jitter from the thread-local generator.
    Entropy,
}

impl Perturbation {
    /// Relative adjustment in `[-0.1, 0.1]`.
    fn factor(self, salt: u64) -> f64 {
        match self {
            Self::Disabled => 0.0,
            Self::Seeded(seed) => StdRng::seed_from_u64(seed ^ salt)
                .random_range(-PERTURBATION_RANGE..=PERTURBATION_RANGE),
            Self::Entropy => rand::rng().random_range(-PERTURBATION_RANGE..=PERTURBATION_RANGE),
        }
    }
}

/// Recency-weighted moving average of the last six points.
#[derive(Debug, Clone, Copy)]
pub struct WeightedRecentEstimator {
    weight_recent: bool,
    perturbation: Perturbation,
}

impl WeightedRecentEstimator {
    /// Creates the estimator. With `weight_recent` off, every point in the
    /// window weighs the same.
    #[must_use]
    pub const fn new(weight_recent: bool, perturbation: Perturbation) -> Self {
        Self {
            weight_recent,
            perturbation,
        }
    }
}

impl Default for WeightedRecentEstimator {
    fn default() -> Self {
        Self::new(true, Perturbation::Disabled)
    }
}

impl Estimator for WeightedRecentEstimator {
    fn name(&self) -> &'static str {
        "arima"
    }

    fn estimate(&self, series: &[HistoricalPoint], months_ahead: u32) -> f64 {
        if series.len() < 4 {
            return linear(series, months_ahead);
        }

        let window = &series[series.len().saturating_sub(WEIGHTED_WINDOW)..];
        let (mut weighted_sum, mut weight_total) = (0.0, 0.0);
        for (point, recency_weight) in window.iter().rev().zip(RECENCY_WEIGHTS) {
            let weight = if self.weight_recent { recency_weight } else { 1.0 };
            weighted_sum += weight * f64::from(point.count);
            weight_total += weight;
        }
        let weighted_mean = weighted_sum / weight_total;

        let salt = window.last().map_or(0, |last| {
            let group = (u64::from(last.precinct.unsigned_abs()) << 32)
                | u64::from(last.crime_type.unsigned_abs());
            group.rotate_left(7) ^ u64::from(months_ahead)
        });

        (weighted_mean * (1.0 + self.perturbation.factor(salt))).max(0.0)
    }
}

/// Returns the estimator for the configured model.
///
/// The seasonal model is only used when seasonality is enabled; otherwise
/// the linear model stands in.
#[must_use]
pub fn for_params(params: &ForecastParams, perturbation: Perturbation) -> Box<dyn Estimator> {
    match params.model {
        ForecastModel::Linear => Box::new(LinearEstimator),
        ForecastModel::Polynomial => Box::new(PolynomialEstimator),
        ForecastModel::Seasonal if params.include_seasonality => Box::new(SeasonalEstimator),
        ForecastModel::Seasonal => {
            log::debug!("Seasonality disabled; using linear model instead of seasonal");
            Box::new(LinearEstimator)
        }
        ForecastModel::Arima => Box::new(WeightedRecentEstimator::new(
            params.weight_recent_data,
            perturbation,
        )),
    }
}
