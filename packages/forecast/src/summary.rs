//! Aggregate statistics over a forecast run.

use std::collections::BTreeSet;

use crime_map_forecast_models::{ForecastPrediction, ForecastSummary, RiskLevel, Trend};

/// Summarizes predictions for the dashboard header cards.
#[must_use]
pub fn summarize(predictions: &[ForecastPrediction]) -> ForecastSummary {
    let mut summary = ForecastSummary {
        total_predictions: predictions.len(),
        ..ForecastSummary::default()
    };
    let mut high_risk = BTreeSet::new();
    let mut confidence_sum = 0.0;

    for p in predictions {
        summary.total_predicted_count += u64::from(p.predicted_count);
        confidence_sum += p.confidence;

        let risk = &mut summary.by_risk_level;
        match p.risk_level {
            RiskLevel::Low => risk.low += 1,
            RiskLevel::Medium => risk.medium += 1,
            RiskLevel::High => risk.high += 1,
            RiskLevel::Critical => risk.critical += 1,
        }
        if p.risk_level >= RiskLevel::High {
            high_risk.insert(p.precinct);
        }

        let trend = &mut summary.by_trend;
        match p.trend {
            Trend::Increasing => trend.increasing += 1,
            Trend::Decreasing => trend.decreasing += 1,
            Trend::Stable => trend.stable += 1,
        }
    }

    if !predictions.is_empty() {
        #[allow(clippy::cast_precision_loss)]
        let n = predictions.len() as f64;
        summary.average_confidence = confidence_sum / n;
    }
    summary.highest_risk_precincts = high_risk.into_iter().collect();

    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prediction(precinct: i32, count: u32, risk_level: RiskLevel, trend: Trend) -> ForecastPrediction {
        ForecastPrediction {
            year: 2025,
            month: 1,
            precinct,
            crime_type: 1,
            predicted_count: count,
            confidence: 0.8,
            trend,
            risk_level,
        }
    }

    #[test]
    fn empty_run_has_zero_summary() {
        assert_eq!(summarize(&[]), ForecastSummary::default());
    }

    #[test]
    fn counts_risk_levels_trends_and_totals() {
        let predictions = vec![
            prediction(20, 4, RiskLevel::Critical, Trend::Increasing),
            prediction(5, 2, RiskLevel::High, Trend::Increasing),
            prediction(7, 1, RiskLevel::Low, Trend::Decreasing),
            prediction(20, 3, RiskLevel::High, Trend::Stable),
            prediction(9, 5, RiskLevel::Medium, Trend::Stable),
        ];
        let summary = summarize(&predictions);

        assert_eq!(summary.total_predictions, 5);
        assert_eq!(summary.total_predicted_count, 15);
        assert!((summary.average_confidence - 0.8).abs() < 1e-9);
        assert_eq!(summary.by_risk_level.critical, 1);
        assert_eq!(summary.by_risk_level.high, 2);
        assert_eq!(summary.by_risk_level.medium, 1);
        assert_eq!(summary.by_risk_level.low, 1);
        assert_eq!(summary.by_trend.increasing, 2);
        assert_eq!(summary.by_trend.stable, 2);
        assert_eq!(summary.by_trend.decreasing, 1);
        assert_eq!(summary.highest_risk_precincts, vec![5, 20]);
    }
}
