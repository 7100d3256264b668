//! Trend direction, risk level and horizon confidence.

use crime_map_forecast_models::{HistoricalPoint, RiskLevel, Trend};

/// Number of most recent points averaged for comparison.
const RECENT_WINDOW: usize = 6;

/// Confidence lost per month of forecast distance.
const CONFIDENCE_DECAY_PER_MONTH: f64 = 0.05;

/// Confidence never drops below this value.
const CONFIDENCE_FLOOR: f64 = 0.5;

/// Mean count of the last six points, `0.0` for an empty series.
#[must_use]
pub fn recent_average(series: &[HistoricalPoint]) -> f64 {
    let window = &series[series.len().saturating_sub(RECENT_WINDOW)..];
    if window.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let len = window.len() as f64;
    window.iter().map(|p| f64::from(p.count)).sum::<f64>() / len
}

/// Classifies the direction of `predicted` against `recent_average`.
#[must_use]
pub fn classify_trend(predicted: f64, recent_average: f64) -> Trend {
    if predicted > 1.1 * recent_average {
        Trend::Increasing
    } else if predicted < 0.9 * recent_average {
        Trend::Decreasing
    } else {
        Trend::Stable
    }
}

/// Classifies the severity of `predicted` against `recent_average`.
#[must_use]
pub fn classify_risk(predicted: f64, recent_average: f64) -> RiskLevel {
    if predicted > 1.5 * recent_average {
        RiskLevel::Critical
    } else if predicted > 1.2 * recent_average {
        RiskLevel::High
    } else if predicted > 0.8 * recent_average {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Confidence for a forecast `month_offset` months out.
#[must_use]
pub fn horizon_confidence(base_confidence: f64, month_offset: u32) -> f64 {
    CONFIDENCE_DECAY_PER_MONTH
        .mul_add(-f64::from(month_offset), base_confidence)
        .max(CONFIDENCE_FLOOR)
}
