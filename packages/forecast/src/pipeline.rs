//! End-to-end forecast run with remote-first, local-fallback semantics.

use crime_map_forecast_models::{
    Cluster, ForecastParams, ForecastPrediction, GroupKey, HistoricalPoint, RemoteForecastRequest,
};
use serde::Serialize;

use crate::{
    ForecastError,
    aggregate::{
        add_months, aggregate_clusters, group_keys, group_series, latest_month, months_between,
    },
    classify::{classify_risk, classify_trend, horizon_confidence, recent_average},
    estimators::{Estimator, Perturbation, for_params},
    remote::{RemoteForecaster, predictions_from_response},
};

/// Where the predictions of a run came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionSource {
    /// The remote forecasting service.
    Remote,
    /// The local trend models.
    Local,
}

/// Output of [`run_forecast`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastRun {
    /// Monthly counts the forecast is based on.
    pub historical: Vec<HistoricalPoint>,
    /// One prediction per group and forecast month.
    pub predictions: Vec<ForecastPrediction>,
    /// Which forecaster produced `predictions`.
    pub source: PredictionSource,
}

/// Checks the cluster data for structural problems.
///
/// # Errors
///
/// * If an incident's month is outside 1-12
pub fn validate_clusters(clusters: &[Cluster]) -> Result<(), ForecastError> {
    for cluster in clusters {
        if let Some(item) = cluster
            .cluster_items
            .iter()
            .find(|item| !(1..=12).contains(&item.month))
        {
            return Err(ForecastError::InvalidInput {
                message: format!(
                    "Incident {:?} in cluster {} has month {}",
                    item.case_id, cluster.cluster_id, item.month
                ),
            });
        }
    }
    Ok(())
}

/// Forecasts one group for months `anchor + 1 ..= anchor + period`.
///
/// The estimator is asked for the distance from the group's own last
/// point to each forecast month, so a group whose data ends before
/// `anchor` is extrapolated further. Confidence decays with the offset
/// from `anchor`. Works for any series length, including an empty one.
#[must_use]
pub fn forecast_group(
    series: &[HistoricalPoint],
    key: GroupKey,
    anchor: (i32, u32),
    params: &ForecastParams,
    estimator: &dyn Estimator,
) -> Vec<ForecastPrediction> {
    let recent = recent_average(series);
    let last = series.last().map(|p| (p.year, p.month));

    (1..=params.forecast_period)
        .map(|offset| {
            let (year, month) = add_months(anchor.0, anchor.1, offset);
            let months_ahead = last.map_or(offset, |last| {
                u32::try_from(months_between(last, (year, month)).max(1)).unwrap_or(u32::MAX)
            });
            let estimate = estimator.estimate(series, months_ahead);
            let predicted = if estimate.is_finite() {
                estimate.max(0.0).round()
            } else {
                0.0
            };

            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let predicted_count = predicted.min(f64::from(u32::MAX)) as u32;

            ForecastPrediction {
                year,
                month,
                precinct: key.precinct,
                crime_type: key.crime_type,
                predicted_count,
                confidence: horizon_confidence(params.confidence, offset),
                trend: classify_trend(predicted, recent),
                risk_level: classify_risk(predicted, recent),
            }
        })
        .collect()
}

/// Forecasts every group in `history` with the local models.
///
/// All groups forecast the same calendar months, starting after the
/// latest month in the whole history.
#[must_use]
pub fn forecast_locally(
    history: &[HistoricalPoint],
    params: &ForecastParams,
    perturbation: Perturbation,
) -> Vec<ForecastPrediction> {
    let params = params.clone().normalized();
    let Some(anchor) = latest_month(history) else {
        log::info!("No historical data; nothing to forecast");
        return Vec::new();
    };

    let estimator = for_params(&params, perturbation);
    let keys = group_keys(history);
    log::info!(
        "Forecasting {} groups {} months ahead with the {} model",
        keys.len(),
        params.forecast_period,
        estimator.name()
    );

    keys.into_iter()
        .flat_map(|key| {
            let series = group_series(history, key);
            forecast_group(&series, key, anchor, &params, estimator.as_ref())
        })
        .collect()
}

/// Runs a forecast over the clusters.
///
/// When `remote` is given it is asked first. A failed request or an
/// invalid response is logged and replaced by the local models.
///
/// # Errors
///
/// * If the cluster data is structurally malformed
pub async fn run_forecast(
    clusters: &[Cluster],
    params: &ForecastParams,
    perturbation: Perturbation,
    remote: Option<&dyn RemoteForecaster>,
) -> Result<ForecastRun, ForecastError> {
    validate_clusters(clusters)?;

    let params = params.clone().normalized();
    let historical = aggregate_clusters(clusters);
    log::info!(
        "Aggregated {} monthly points across {} groups",
        historical.len(),
        group_keys(&historical).len()
    );

    if let Some(remote) = remote {
        let request = RemoteForecastRequest {
            cluster_data: clusters,
            horizon: params.forecast_period,
            confidence_level: params.confidence,
            model_type: params.model,
            include_seasonality: params.include_seasonality,
            weight_recent_data: params.weight_recent_data,
        };

        match remote
            .forecast(&request)
            .await
            .and_then(|response| predictions_from_response(&response))
        {
            Ok(predictions) => {
                log::info!("Using {} predictions from remote service", predictions.len());
                return Ok(ForecastRun {
                    historical,
                    predictions,
                    source: PredictionSource::Remote,
                });
            }
            Err(e) => {
                log::warn!("Remote forecast failed, falling back to local models: {e}");
            }
        }
    }

    let predictions = forecast_locally(&historical, &params, perturbation);
    Ok(ForecastRun {
        historical,
        predictions,
        source: PredictionSource::Local,
    })
}
