#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Forecast input, prediction, reliability and map point types.
//!
//! These types form the contract between the analysis layer that produces
//! incident clusters, the forecasting pipeline, and the dashboard that
//! renders predictions on charts, tables and the map. All of them serialize
//! to `camelCase` JSON.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Identifier of a source incident record.
///
/// Upstream analysis emits either numeric or string case numbers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CaseId {
    /// Numeric case number.
    Number(i64),
    /// Free-form case number (e.g. `"2024-000123"`).
    Text(String),
}

/// A single incident inside a cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterItem {
    /// Source case identifier.
    pub case_id: CaseId,
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// Year the incident occurred.
    pub year: i32,
    /// Month the incident occurred (1-12).
    pub month: u32,
    /// Precinct code.
    pub precinct: i32,
    /// Crime type code.
    pub crime_type: i32,
    /// Raw time-of-day label (e.g. `"14:30"`, `"evening"`).
    #[serde(default)]
    pub time_of_day: String,
}

/// A group of incidents produced by the upstream clustering step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    /// Cluster identifier.
    pub cluster_id: i32,
    /// Incidents assigned to this cluster.
    pub cluster_items: Vec<ClusterItem>,
    /// Number of incidents reported by the clustering step.
    #[serde(default)]
    pub cluster_count: usize,
}

/// The unit of model fitting: one precinct and one crime type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupKey {
    /// Precinct code.
    pub precinct: i32,
    /// Crime type code.
    pub crime_type: i32,
}

/// Monthly incident count for one (precinct, crime type).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalPoint {
    /// Year.
    pub year: i32,
    /// Month (1-12).
    pub month: u32,
    /// Precinct code.
    pub precinct: i32,
    /// Crime type code.
    pub crime_type: i32,
    /// Number of incidents in this month.
    pub count: u32,
    /// Time-of-day label of the first contributing incident.
    pub time_of_day: String,
    /// Cluster of the first contributing incident, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<i32>,
}

impl HistoricalPoint {
    /// Returns the (precinct, crime type) group this point belongs to.
    #[must_use]
    pub const fn group_key(&self) -> GroupKey {
        GroupKey {
            precinct: self.precinct,
            crime_type: self.crime_type,
        }
    }
}

/// Local trend model used to extrapolate a group's series.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase", from = "String")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ForecastModel {
    /// Least-squares line over the last year of data.
    #[default]
    Linear,
    /// Quadratic extrapolation from three bucketed averages.
    Polynomial,
    /// Calendar-month average scaled by the recent trend.
    Seasonal,
    /// Recency-weighted moving average.
    Arima,
}

impl ForecastModel {
    /// Resolves a model name, falling back to [`ForecastModel::Linear`] for
    /// unknown or empty names.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        name.trim().parse().unwrap_or_default()
    }
}

impl From<String> for ForecastModel {
    fn from(value: String) -> Self {
        Self::from_name(&value)
    }
}

/// Minimum forecast horizon in months.
pub const MIN_FORECAST_PERIOD: u32 = 1;
/// Maximum forecast horizon in months.
pub const MAX_FORECAST_PERIOD: u32 = 12;
/// Lowest accepted base confidence.
pub const MIN_CONFIDENCE: f64 = 0.7;
/// Highest accepted base confidence.
pub const MAX_CONFIDENCE: f64 = 0.99;

/// User-supplied forecast configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ForecastParams {
    /// Number of months to forecast (1-12).
    pub forecast_period: u32,
    /// Local model to use.
    pub model: ForecastModel,
    /// Base confidence for the first forecast month (0.7-0.99).
    pub confidence: f64,
    /// Whether seasonal adjustment is allowed.
    pub include_seasonality: bool,
    /// Whether recent months weigh more than older ones.
    pub weight_recent_data: bool,
}

impl Default for ForecastParams {
    fn default() -> Self {
        Self {
            forecast_period: 6,
            model: ForecastModel::Linear,
            confidence: 0.95,
            include_seasonality: true,
            weight_recent_data: true,
        }
    }
}

impl ForecastParams {
    /// Creates parameters with the period and confidence clamped to their
    /// accepted ranges.
    #[must_use]
    pub fn new(
        forecast_period: u32,
        model: ForecastModel,
        confidence: f64,
        include_seasonality: bool,
        weight_recent_data: bool,
    ) -> Self {
        Self {
            forecast_period,
            model,
            confidence,
            include_seasonality,
            weight_recent_data,
        }
        .normalized()
    }

    /// Returns a copy with the period and confidence clamped.
    ///
    /// A non-finite confidence resets to the default.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.forecast_period = self
            .forecast_period
            .clamp(MIN_FORECAST_PERIOD, MAX_FORECAST_PERIOD);
        self.confidence = if self.confidence.is_finite() {
            self.confidence.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
        } else {
            Self::default().confidence
        };
        self
    }
}

/// Direction of a forecast relative to recent history.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Trend {
    /// More than 10% above the recent average.
    Increasing,
    /// More than 10% below the recent average.
    Decreasing,
    /// Within 10% of the recent average.
    Stable,
}

/// Severity bucket derived from the predicted-to-recent ratio.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum RiskLevel {
    /// At most 80% of the recent average.
    Low,
    /// Above 80% of the recent average.
    Medium,
    /// Above 120% of the recent average.
    High,
    /// Above 150% of the recent average.
    Critical,
}

impl RiskLevel {
    /// Returns all variants in ascending severity.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Low, Self::Medium, Self::High, Self::Critical]
    }
}

/// One forecast month for one (precinct, crime type).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastPrediction {
    /// Forecast year.
    pub year: i32,
    /// Forecast month (1-12).
    pub month: u32,
    /// Precinct code.
    pub precinct: i32,
    /// Crime type code.
    pub crime_type: i32,
    /// Predicted incident count.
    pub predicted_count: u32,
    /// Model confidence for this horizon (0-1).
    pub confidence: f64,
    /// Direction relative to recent history.
    pub trend: Trend,
    /// Severity bucket.
    pub risk_level: RiskLevel,
}

impl ForecastPrediction {
    /// Returns the (precinct, crime type) group of this prediction.
    #[must_use]
    pub const fn group_key(&self) -> GroupKey {
        GroupKey {
            precinct: self.precinct,
            crime_type: self.crime_type,
        }
    }
}

/// Data-quality metrics for the history behind a forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReliabilityMetrics {
    /// Composite reliability (0-1).
    pub score: f64,
    /// Number of historical points in the group.
    pub sample_size: usize,
    /// Population variance of the monthly counts.
    pub historical_variance: f64,
    /// Relative half-width of the mean at the forecast's confidence (0-1).
    pub confidence_interval: f64,
    /// Number of distinct years with data.
    pub time_span_coverage: usize,
    /// Whether monthly averages vary enough to indicate seasonality.
    pub seasonal_pattern: bool,
}

/// Coarse period of the day.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum TimeOfDay {
    /// 06:00-11:59
    Morning,
    /// 12:00-17:59
    Afternoon,
    /// 18:00-23:59
    Evening,
    /// 00:00-05:59
    Night,
}

impl TimeOfDay {
    /// Returns all variants in tie-breaking priority order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Morning, Self::Afternoon, Self::Evening, Self::Night]
    }

    /// Returns the period containing the given hour (0-23).
    ///
    /// Hours past 23 wrap around the clock.
    #[must_use]
    pub const fn from_hour(hour: u32) -> Self {
        match hour % 24 {
            6..=11 => Self::Morning,
            12..=17 => Self::Afternoon,
            18..=23 => Self::Evening,
            _ => Self::Night,
        }
    }
}

/// Incident counts per period of the day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeOfDayBreakdown {
    /// Morning incidents.
    pub morning: u32,
    /// Afternoon incidents.
    pub afternoon: u32,
    /// Evening incidents.
    pub evening: u32,
    /// Night incidents.
    pub night: u32,
}

impl TimeOfDayBreakdown {
    /// A breakdown with one incident in every period.
    #[must_use]
    pub const fn uniform() -> Self {
        Self {
            morning: 1,
            afternoon: 1,
            evening: 1,
            night: 1,
        }
    }

    /// Returns the count for a period.
    #[must_use]
    pub const fn count(&self, period: TimeOfDay) -> u32 {
        match period {
            TimeOfDay::Morning => self.morning,
            TimeOfDay::Afternoon => self.afternoon,
            TimeOfDay::Evening => self.evening,
            TimeOfDay::Night => self.night,
        }
    }

    /// Records one incident in the given period.
    pub const fn record(&mut self, period: TimeOfDay) {
        match period {
            TimeOfDay::Morning => self.morning += 1,
            TimeOfDay::Afternoon => self.afternoon += 1,
            TimeOfDay::Evening => self.evening += 1,
            TimeOfDay::Night => self.night += 1,
        }
    }

    /// Total incidents across all periods.
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.morning + self.afternoon + self.evening + self.night
    }

    /// The period with the most incidents.
    ///
    /// Ties resolve in the order morning, afternoon, evening, night.
    #[must_use]
    pub fn primary(&self) -> TimeOfDay {
        let mut best = TimeOfDay::Morning;
        for &period in &TimeOfDay::all()[1..] {
            if self.count(period) > self.count(best) {
                best = period;
            }
        }
        best
    }
}

/// A prediction enriched with location, time-of-day and reliability data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendedForecast {
    /// The underlying prediction.
    #[serde(flatten)]
    pub prediction: ForecastPrediction,
    /// Representative latitude.
    pub latitude: f64,
    /// Representative longitude.
    pub longitude: f64,
    /// Cluster the location was taken from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<i32>,
    /// Historical incidents per period of the day.
    pub time_of_day_breakdown: TimeOfDayBreakdown,
    /// Period with the most historical incidents.
    pub primary_time_of_day: TimeOfDay,
    /// Reliability of the history behind the prediction.
    pub reliability: ReliabilityMetrics,
}

/// A forecast ready for display on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapPoint {
    /// Stable identifier, see [`map_point_id`].
    pub id: String,
    /// Latitude.
    pub latitude: f64,
    /// Longitude.
    pub longitude: f64,
    /// Forecast year.
    pub year: i32,
    /// Forecast month (1-12).
    pub month: u32,
    /// Precinct code.
    pub precinct: i32,
    /// Precinct display name.
    pub precinct_name: String,
    /// Crime type code.
    pub crime_type: i32,
    /// Crime type display name.
    pub crime_type_name: String,
    /// Predicted incident count.
    pub predicted_count: u32,
    /// Model confidence.
    pub confidence: f64,
    /// Trend direction.
    pub trend: Trend,
    /// Risk level.
    pub risk_level: RiskLevel,
    /// Marker color for the risk level.
    pub color: String,
    /// Composite reliability score.
    pub reliability_score: f64,
    /// Number of historical points behind the forecast.
    pub sample_size: usize,
    /// Dominant period of the day.
    pub primary_time_of_day: TimeOfDay,
    /// Source cluster, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<i32>,
}

/// Builds the map point identifier `"{year}-{month}-{precinct}-{crimeType}"`.
#[must_use]
pub fn map_point_id(year: i32, month: u32, precinct: i32, crime_type: i32) -> String {
    format!("{year}-{month}-{precinct}-{crime_type}")
}

/// Request body for the remote statistical forecasting service.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteForecastRequest<'a> {
    /// Cluster data the forecast is based on.
    pub cluster_data: &'a [Cluster],
    /// Number of months to forecast.
    pub horizon: u32,
    /// Requested confidence level.
    pub confidence_level: f64,
    /// Requested model name.
    pub model_type: ForecastModel,
    /// Whether seasonal adjustment is allowed.
    pub include_seasonality: bool,
    /// Whether recent months weigh more than older ones.
    pub weight_recent_data: bool,
}

/// Response body of the remote forecasting service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteForecastResponse {
    /// One entry per (precinct, crime type).
    pub series: Vec<RemoteSeries>,
}

/// Remote forecasts for one (precinct, crime type).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSeries {
    /// Precinct code.
    pub precinct: i32,
    /// Crime type code.
    pub crime_type: i32,
    /// Forecast months.
    pub forecasts: Vec<RemoteForecastPoint>,
}

/// One remote forecast month. Enumerations are kept as strings so that
/// unknown values can be reported precisely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteForecastPoint {
    /// ISO 8601 timestamp of the forecast month.
    pub timestamp: String,
    /// Predicted count.
    pub forecast: f64,
    /// Confidence (0-1).
    pub confidence: f64,
    /// Trend name.
    pub trend: String,
    /// Risk level name.
    pub risk_level: String,
}

/// Counts of predictions per risk level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskLevelCounts {
    /// Low-risk predictions.
    pub low: usize,
    /// Medium-risk predictions.
    pub medium: usize,
    /// High-risk predictions.
    pub high: usize,
    /// Critical-risk predictions.
    pub critical: usize,
}

/// Counts of predictions per trend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendCounts {
    /// Increasing predictions.
    pub increasing: usize,
    /// Decreasing predictions.
    pub decreasing: usize,
    /// Stable predictions.
    pub stable: usize,
}

/// Aggregate view of a forecast run for the dashboard header cards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastSummary {
    /// Number of predictions.
    pub total_predictions: usize,
    /// Sum of predicted counts.
    pub total_predicted_count: u64,
    /// Mean confidence across predictions (0 when empty).
    pub average_confidence: f64,
    /// Predictions per risk level.
    pub by_risk_level: RiskLevelCounts,
    /// Predictions per trend.
    pub by_trend: TrendCounts,
    /// Precincts with at least one high or critical prediction, ascending.
    pub highest_risk_precincts: Vec<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_model_names_fall_back_to_linear() {
        assert_eq!(ForecastModel::from_name("seasonal"), ForecastModel::Seasonal);
        assert_eq!(ForecastModel::from_name("ARIMA"), ForecastModel::Arima);
        assert_eq!(ForecastModel::from_name("prophet"), ForecastModel::Linear);
        assert_eq!(ForecastModel::from_name(""), ForecastModel::Linear);

        let params: ForecastParams =
            serde_json::from_str(r#"{"forecastPeriod":3,"model":"neural"}"#).unwrap();
        assert_eq!(params.model, ForecastModel::Linear);
        assert_eq!(params.forecast_period, 3);
    }

    #[test]
    fn params_are_clamped() {
        let params = ForecastParams::new(40, ForecastModel::Linear, 0.2, true, false);
        assert_eq!(params.forecast_period, MAX_FORECAST_PERIOD);
        assert!((params.confidence - MIN_CONFIDENCE).abs() < f64::EPSILON);

        let params = ForecastParams::new(0, ForecastModel::Linear, 1.5, true, false);
        assert_eq!(params.forecast_period, MIN_FORECAST_PERIOD);
        assert!((params.confidence - MAX_CONFIDENCE).abs() < f64::EPSILON);
    }

    #[test]
    fn hours_map_to_periods() {
        assert_eq!(TimeOfDay::from_hour(0), TimeOfDay::Night);
        assert_eq!(TimeOfDay::from_hour(5), TimeOfDay::Night);
        assert_eq!(TimeOfDay::from_hour(6), TimeOfDay::Morning);
        assert_eq!(TimeOfDay::from_hour(12), TimeOfDay::Afternoon);
        assert_eq!(TimeOfDay::from_hour(18), TimeOfDay::Evening);
        assert_eq!(TimeOfDay::from_hour(23), TimeOfDay::Evening);
    }

    #[test]
    fn primary_period_prefers_earlier_on_ties() {
        assert_eq!(TimeOfDayBreakdown::uniform().primary(), TimeOfDay::Morning);

        let breakdown = TimeOfDayBreakdown {
            morning: 1,
            afternoon: 3,
            evening: 3,
            night: 2,
        };
        assert_eq!(breakdown.primary(), TimeOfDay::Afternoon);
    }

    #[test]
    fn cluster_items_accept_numeric_and_text_case_ids() {
        let json = r#"[
            {"caseId": 17, "latitude": 40.7, "longitude": -74.0, "year": 2024,
             "month": 3, "precinct": 14, "crimeType": 2, "timeOfDay": "21:15"},
            {"caseId": "A-9", "latitude": 40.7, "longitude": -74.0, "year": 2024,
             "month": 3, "precinct": 14, "crimeType": 2}
        ]"#;
        let items: Vec<ClusterItem> = serde_json::from_str(json).unwrap();
        assert_eq!(items[0].case_id, CaseId::Number(17));
        assert_eq!(items[1].case_id, CaseId::Text("A-9".to_string()));
        assert!(items[1].time_of_day.is_empty());
    }

    #[test]
    fn extended_forecast_flattens_prediction() {
        let forecast = ExtendedForecast {
            prediction: ForecastPrediction {
                year: 2025,
                month: 1,
                precinct: 14,
                crime_type: 2,
                predicted_count: 9,
                confidence: 0.9,
                trend: Trend::Stable,
                risk_level: RiskLevel::Medium,
            },
            latitude: 40.75,
            longitude: -73.99,
            cluster_id: None,
            time_of_day_breakdown: TimeOfDayBreakdown::uniform(),
            primary_time_of_day: TimeOfDay::Morning,
            reliability: ReliabilityMetrics {
                score: 0.5,
                sample_size: 4,
                historical_variance: 1.0,
                confidence_interval: 0.2,
                time_span_coverage: 1,
                seasonal_pattern: false,
            },
        };
        let value = serde_json::to_value(&forecast).unwrap();
        assert_eq!(value["predictedCount"], 9);
        assert_eq!(value["riskLevel"], "medium");
        assert_eq!(value["primaryTimeOfDay"], "morning");
        assert!(value.get("clusterId").is_none());
    }
}
