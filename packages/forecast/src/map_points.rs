//! Filtering of enriched forecasts and projection to map markers.
//!
//! [`filter_reliable_forecasts`] and [`create_forecast_map_points`] are
//! separate operations with different criteria. Callers usually chain
//! them, but each one only applies its own thresholds.

use crime_map_forecast_models::{ExtendedForecast, MapPoint, map_point_id};
use crime_map_lookup::Lookups;

/// Reliability floor applied when projecting to map points.
pub const DEFAULT_MIN_RELIABILITY: f64 = 0.3;

/// Thresholds for [`filter_reliable_forecasts`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapFilterThresholds {
    /// Lowest accepted reliability score.
    pub min_reliability: f64,
    /// Fewest accepted historical points.
    pub min_sample_size: usize,
    /// Highest accepted historical variance.
    pub max_variance: f64,
}

impl Default for MapFilterThresholds {
    fn default() -> Self {
        Self {
            min_reliability: DEFAULT_MIN_RELIABILITY,
            min_sample_size: 3,
            max_variance: 1.5,
        }
    }
}

impl MapFilterThresholds {
    fn accepts(&self, forecast: &ExtendedForecast) -> bool {
        let reliability = &forecast.reliability;
        reliability.score >= self.min_reliability
            && reliability.sample_size >= self.min_sample_size
            && reliability.historical_variance <= self.max_variance
    }
}

/// Keeps forecasts whose reliability score, sample size and historical
/// variance all pass `thresholds`.
#[must_use]
pub fn filter_reliable_forecasts(
    forecasts: &[ExtendedForecast],
    thresholds: &MapFilterThresholds,
) -> Vec<ExtendedForecast> {
    let kept: Vec<ExtendedForecast> = forecasts
        .iter()
        .filter(|f| thresholds.accepts(f))
        .cloned()
        .collect();

    log::debug!(
        "Reliability filter kept {} of {} forecasts",
        kept.len(),
        forecasts.len()
    );

    kept
}

/// Projects forecasts with a reliability score of at least
/// `min_reliability` into map points, filling in display names and risk
/// colors from `lookups`.
#[must_use]
pub fn create_forecast_map_points(
    forecasts: &[ExtendedForecast],
    min_reliability: f64,
    lookups: &Lookups,
) -> Vec<MapPoint> {
    let points: Vec<MapPoint> = forecasts
        .iter()
        .filter(|f| f.reliability.score >= min_reliability)
        .map(|f| {
            let p = &f.prediction;
            MapPoint {
                id: map_point_id(p.year, p.month, p.precinct, p.crime_type),
                latitude: f.latitude,
                longitude: f.longitude,
                year: p.year,
                month: p.month,
                precinct: p.precinct,
                precinct_name: lookups.precinct_name(p.precinct),
                crime_type: p.crime_type,
                crime_type_name: lookups.crime_type_name(p.crime_type),
                predicted_count: p.predicted_count,
                confidence: p.confidence,
                trend: p.trend,
                risk_level: p.risk_level,
                color: lookups.risk_color(p.risk_level).to_string(),
                reliability_score: f.reliability.score,
                sample_size: f.reliability.sample_size,
                primary_time_of_day: f.primary_time_of_day,
                cluster_id: f.cluster_id,
            }
        })
        .collect();

    log::debug!(
        "Dropped {} of {} forecasts below reliability {min_reliability} for the map",
        forecasts.len() - points.len(),
        forecasts.len()
    );

    points
}
