//! Client for the remote statistical forecasting service.
//!
//! The service receives the raw cluster data and answers with one series
//! of monthly forecasts per (precinct, crime type). Any response that does
//! not match the expected shape is rejected as a whole so the caller can
//! fall back to the local models.

use std::time::Duration;

use chrono::Datelike as _;
use crime_map_forecast_models::{
    ForecastPrediction, RemoteForecastPoint, RemoteForecastRequest, RemoteForecastResponse,
    RiskLevel, Trend,
};

use crate::ForecastError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A source of forecasts computed outside this process.
#[async_trait::async_trait]
pub trait RemoteForecaster: Send + Sync {
    /// Requests forecasts for the given cluster data and parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ForecastError`] if the request fails or the service
    /// answers with an error status or an undecodable body.
    async fn forecast(
        &self,
        request: &RemoteForecastRequest<'_>,
    ) -> Result<RemoteForecastResponse, ForecastError>;
}

/// [`RemoteForecaster`] that POSTs JSON to an HTTP endpoint.
pub struct HttpForecastService {
    url: String,
    client: reqwest::Client,
}

impl HttpForecastService {
    /// Creates a client for the forecasting endpoint at `url`.
    ///
    /// # Errors
    ///
    /// * If the HTTP client cannot be built
    pub fn new(url: impl Into<String>) -> Result<Self, ForecastError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            url: url.into(),
            client,
        })
    }

    /// The endpoint this client talks to.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait::async_trait]
impl RemoteForecaster for HttpForecastService {
    async fn forecast(
        &self,
        request: &RemoteForecastRequest<'_>,
    ) -> Result<RemoteForecastResponse, ForecastError> {
        log::info!(
            "Requesting {}-month {} forecast from {}",
            request.horizon,
            request.model_type,
            self.url
        );

        let resp = self.client.post(&self.url).json(request).send().await?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(ForecastError::InvalidResponse {
                message: format!("HTTP {status}: {body}"),
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

/// Extracts the (year, month) of a forecast timestamp.
///
/// Accepts RFC 3339 timestamps as well as `YYYY-MM-DDTHH:MM:SS` and
/// `YYYY-MM-DD`.
fn parse_year_month(timestamp: &str) -> Result<(i32, u32), ForecastError> {
    let timestamp = timestamp.trim();
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(timestamp) {
        return Ok((dt.year(), dt.month()));
    }
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M:%S") {
        return Ok((dt.year(), dt.month()));
    }
    chrono::NaiveDate::parse_from_str(timestamp, "%Y-%m-%d")
        .map(|d| (d.year(), d.month()))
        .map_err(|e| ForecastError::InvalidResponse {
            message: format!("Invalid timestamp '{timestamp}': {e}"),
        })
}

fn finite(value: f64, field: &str) -> Result<f64, ForecastError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ForecastError::InvalidResponse {
            message: format!("Non-finite {field}: {value}"),
        })
    }
}

fn convert_point(
    precinct: i32,
    crime_type: i32,
    point: &RemoteForecastPoint,
) -> Result<ForecastPrediction, ForecastError> {
    let (year, month) = parse_year_month(&point.timestamp)?;
    let forecast = finite(point.forecast, "forecast")?;
    let confidence = finite(point.confidence, "confidence")?;
    let trend: Trend = point
        .trend
        .parse()
        .map_err(|_| ForecastError::InvalidResponse {
            message: format!("Unknown trend '{}'", point.trend),
        })?;
    let risk_level: RiskLevel =
        point
            .risk_level
            .parse()
            .map_err(|_| ForecastError::InvalidResponse {
                message: format!("Unknown risk level '{}'", point.risk_level),
            })?;

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let predicted_count = forecast.max(0.0).round().min(f64::from(u32::MAX)) as u32;

    Ok(ForecastPrediction {
        year,
        month,
        precinct,
        crime_type,
        predicted_count,
        confidence: confidence.clamp(0.0, 1.0),
        trend,
        risk_level,
    })
}

/// Converts a service response into predictions.
///
/// # Errors
///
/// * If the response contains no series
/// * If any timestamp, trend, risk level or number is invalid
pub fn predictions_from_response(
    response: &RemoteForecastResponse,
) -> Result<Vec<ForecastPrediction>, ForecastError> {
    if response.series.is_empty() {
        return Err(ForecastError::InvalidResponse {
            message: "Response contains no series".to_string(),
        });
    }

    let mut predictions = Vec::new();
    for series in &response.series {
        for point in &series.forecasts {
            predictions.push(convert_point(series.precinct, series.crime_type, point)?);
        }
    }

    Ok(predictions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crime_map_forecast_models::RemoteSeries;

    fn point(timestamp: &str, forecast: f64, trend: &str, risk: &str) -> RemoteForecastPoint {
        RemoteForecastPoint {
            timestamp: timestamp.to_string(),
            forecast,
            confidence: 0.87,
            trend: trend.to_string(),
            risk_level: risk.to_string(),
        }
    }

    fn response(points: Vec<RemoteForecastPoint>) -> RemoteForecastResponse {
        RemoteForecastResponse {
            series: vec![RemoteSeries {
                precinct: 14,
                crime_type: 2,
                forecasts: points,
            }],
        }
    }

    #[test]
    fn accepts_supported_timestamp_formats() {
        assert_eq!(parse_year_month("2025-03-01T00:00:00Z").unwrap(), (2025, 3));
        assert_eq!(
            parse_year_month("2025-04-01T00:00:00.000+02:00").unwrap(),
            (2025, 4)
        );
        assert_eq!(parse_year_month("2025-05-15T12:30:00").unwrap(), (2025, 5));
        assert_eq!(parse_year_month("2025-06-01").unwrap(), (2025, 6));
        assert!(parse_year_month("June 2025").is_err());
    }

    #[test]
    fn converts_valid_response() {
        let predictions = predictions_from_response(&response(vec![
            point("2025-01-01", 7.6, "increasing", "high"),
            point("2025-02-01", -2.0, "Stable", "LOW"),
        ]))
        .unwrap();

        assert_eq!(predictions.len(), 2);
        assert_eq!(predictions[0].predicted_count, 8);
        assert_eq!(predictions[0].trend, Trend::Increasing);
        assert_eq!(predictions[0].risk_level, RiskLevel::High);
        assert_eq!((predictions[0].year, predictions[0].month), (2025, 1));
        assert_eq!(predictions[1].predicted_count, 0);
        assert_eq!(predictions[1].risk_level, RiskLevel::Low);
        assert_eq!(predictions[1].precinct, 14);
    }

    #[test]
    fn rejects_unknown_labels() {
        let result = predictions_from_response(&response(vec![point(
            "2025-01-01",
            3.0,
            "sideways",
            "low",
        )]));
        assert!(matches!(result, Err(ForecastError::InvalidResponse { .. })));

        let result = predictions_from_response(&response(vec![point(
            "2025-01-01",
            3.0,
            "stable",
            "extreme",
        )]));
        assert!(matches!(result, Err(ForecastError::InvalidResponse { .. })));
    }

    #[test]
    fn rejects_non_finite_numbers_and_bad_timestamps() {
        let result =
            predictions_from_response(&response(vec![point("2025-01-01", f64::NAN, "stable", "low")]));
        assert!(matches!(result, Err(ForecastError::InvalidResponse { .. })));

        let result = predictions_from_response(&response(vec![point("soon", 1.0, "stable", "low")]));
        assert!(matches!(result, Err(ForecastError::InvalidResponse { .. })));
    }

    #[test]
    fn rejects_empty_series() {
        let empty = RemoteForecastResponse { series: vec![] };
        assert!(matches!(
            predictions_from_response(&empty),
            Err(ForecastError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn response_shape_is_checked_when_decoding() {
        let json = r#"{"series": [{"precinct": 14, "crimeType": 2, "forecasts": [
            {"timestamp": "2025-01-01", "forecast": 4, "confidence": 0.9,
             "trend": "stable", "riskLevel": "medium"}]}]}"#;
        let decoded: RemoteForecastResponse = serde_json::from_str(json).unwrap();
        assert_eq!(predictions_from_response(&decoded).unwrap().len(), 1);

        assert!(serde_json::from_str::<RemoteForecastResponse>(r#"{"predictions": []}"#).is_err());
    }
}
