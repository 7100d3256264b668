//! CSV export of predictions.

use std::io::Write;

use crime_map_forecast_models::ForecastPrediction;
use crime_map_lookup::Lookups;

use crate::ForecastError;

const HEADER: [&str; 7] = [
    "Date",
    "Precinct",
    "Crime Type",
    "Predicted Count",
    "Confidence",
    "Trend",
    "Risk Level",
];

/// Writes one CSV row per prediction, preceded by the header row.
///
/// # Errors
///
/// * If writing to `writer` fails
pub fn write_predictions_csv<W: Write>(
    writer: W,
    predictions: &[ForecastPrediction],
    lookups: &Lookups,
) -> Result<(), ForecastError> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(HEADER)?;

    for p in predictions {
        csv.write_record([
            format!("{}-{:02}", p.year, p.month),
            lookups.precinct_name(p.precinct),
            lookups.crime_type_name(p.crime_type),
            p.predicted_count.to_string(),
            format!("{:.1}%", p.confidence * 100.0),
            p.trend.to_string(),
            p.risk_level.to_string(),
        ])?;
    }

    csv.flush()?;
    Ok(())
}

/// Renders predictions as a CSV document.
///
/// # Errors
///
/// * If CSV encoding fails
pub fn predictions_to_csv(
    predictions: &[ForecastPrediction],
    lookups: &Lookups,
) -> Result<String, ForecastError> {
    let mut buffer = Vec::new();
    write_predictions_csv(&mut buffer, predictions, lookups)?;
    String::from_utf8(buffer).map_err(|e| ForecastError::InvalidInput {
        message: format!("CSV output is not UTF-8: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crime_map_forecast_models::{RiskLevel, Trend};

    fn prediction(month: u32, precinct: i32, confidence: f64) -> ForecastPrediction {
        ForecastPrediction {
            year: 2025,
            month,
            precinct,
            crime_type: 4,
            predicted_count: 12,
            confidence,
            trend: Trend::Decreasing,
            risk_level: RiskLevel::Critical,
        }
    }

    #[test]
    fn one_row_per_prediction() {
        let predictions: Vec<ForecastPrediction> =
            (1..=5).map(|m| prediction(m, 14, 0.9)).collect();
        let csv = predictions_to_csv(&predictions, &Lookups::embedded()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "Date,Precinct,Crime Type,Predicted Count,Confidence,Trend,Risk Level"
        );
        assert_eq!(lines.len() - 1, predictions.len());
    }

    #[test]
    fn confidence_is_a_percentage_with_one_decimal() {
        let predictions = vec![prediction(1, 14, 0.9), prediction(2, 14, 0.855)];
        let csv = predictions_to_csv(&predictions, &Lookups::embedded()).unwrap();
        let mut reader = csv::Reader::from_reader(csv.as_bytes());
        let confidences: Vec<String> = reader
            .records()
            .map(|r| r.unwrap()[4].to_string())
            .collect();
        assert_eq!(confidences[0], "90.0%");
        assert!(confidences.iter().all(|c| c.ends_with('%')));
    }

    #[test]
    fn rows_use_display_names_and_lowercase_labels() {
        let csv = predictions_to_csv(&[prediction(3, 14, 0.9)], &Lookups::embedded()).unwrap();
        let row = csv.lines().nth(1).unwrap();
        assert_eq!(
            row,
            "2025-03,Midtown South Precinct,Grand Larceny,12,90.0%,decreasing,critical"
        );
    }

    #[test]
    fn unknown_precinct_gets_generic_name() {
        let csv = predictions_to_csv(&[prediction(3, 999, 0.9)], &Lookups::embedded()).unwrap();
        assert!(csv.lines().nth(1).unwrap().contains("Precinct 999"));
    }

    #[test]
    fn empty_predictions_write_only_the_header() {
        let csv = predictions_to_csv(&[], &Lookups::embedded()).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }
}
