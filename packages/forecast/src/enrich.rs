//! Spatial and time-of-day enrichment of predictions.
//!
//! Each forecast is placed at the centroid of its incidents in the cluster
//! that holds most of them. When no cluster has matching incidents the
//! [`PrecinctLocator`] supplies a fallback location.

use std::collections::BTreeMap;

use crime_map_forecast_models::{
    Cluster, ClusterItem, ExtendedForecast, ForecastPrediction, GroupKey, HistoricalPoint,
    TimeOfDay, TimeOfDayBreakdown,
};
use crime_map_lookup::PrecinctLocator;

use crate::aggregate::group_series;
use crate::reliability::calculate_reliability;

/// Hour assumed when a time-of-day label cannot be interpreted.
const DEFAULT_HOUR: u32 = 12;

/// Named periods recognized in free-form labels, checked in order.
const NAMED_PERIODS: &[(&[&str], u32)] = &[
    (&["morning", "dawn"], 8),
    (&["afternoon", "noon"], 14),
    (&["evening", "dusk"], 20),
    (&["night", "midnight"], 2),
];

/// A representative location for a group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupLocation {
    /// Latitude.
    pub latitude: f64,
    /// Longitude.
    pub longitude: f64,
    /// Cluster the centroid came from, `None` for the precinct fallback.
    pub cluster_id: Option<i32>,
}

fn matches(item: &ClusterItem, key: GroupKey) -> bool {
    item.precinct == key.precinct && item.crime_type == key.crime_type
}

/// Parses the integer at the start of `label`, ignoring leading
/// whitespace. Trailing text such as `":30"` or `"pm"` is ignored.
fn leading_integer(label: &str) -> Option<u32> {
    let trimmed = label.trim_start();
    let end = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    trimmed[..end].parse().ok()
}

/// Interprets a time-of-day label as an hour of the day.
///
/// A leading hour (`"14:30"`, `"9"`) wins. Otherwise named periods such
/// as `"late evening"` map to a representative hour, and anything else
/// falls back to noon.
#[must_use]
pub fn parse_hour(label: &str) -> u32 {
    if let Some(hour) = leading_integer(label).filter(|h| *h < 24) {
        return hour;
    }

    let lower = label.to_lowercase();
    NAMED_PERIODS
        .iter()
        .find(|(names, _)| names.iter().any(|name| lower.contains(name)))
        .map_or(DEFAULT_HOUR, |(_, hour)| *hour)
}

/// Counts the incidents of a group across all clusters by period of day.
///
/// With no matching incidents every period gets one, so that shares and
/// the primary period remain well-defined.
#[must_use]
pub fn time_of_day_breakdown(clusters: &[Cluster], key: GroupKey) -> TimeOfDayBreakdown {
    let mut breakdown = TimeOfDayBreakdown::default();
    for item in clusters
        .iter()
        .flat_map(|c| &c.cluster_items)
        .filter(|item| matches(item, key))
    {
        breakdown.record(TimeOfDay::from_hour(parse_hour(&item.time_of_day)));
    }

    if breakdown.total() == 0 {
        TimeOfDayBreakdown::uniform()
    } else {
        breakdown
    }
}

/// Picks the cluster with the most incidents of the group (first one on
/// ties) and returns the centroid of those incidents.
#[must_use]
pub fn locate_group(
    clusters: &[Cluster],
    key: GroupKey,
    locator: &dyn PrecinctLocator,
) -> GroupLocation {
    let mut best: Option<(&Cluster, usize)> = None;
    for cluster in clusters {
        let matching = cluster
            .cluster_items
            .iter()
            .filter(|item| matches(item, key))
            .count();
        if matching > 0 && best.is_none_or(|(_, most)| matching > most) {
            best = Some((cluster, matching));
        }
    }

    let Some((cluster, matching)) = best else {
        let fallback = locator.locate(key.precinct);
        return GroupLocation {
            latitude: fallback.latitude,
            longitude: fallback.longitude,
            cluster_id: None,
        };
    };

    let (lat_sum, lng_sum) = cluster
        .cluster_items
        .iter()
        .filter(|item| matches(item, key))
        .fold((0.0, 0.0), |(lat, lng), item| {
            (lat + item.latitude, lng + item.longitude)
        });
    #[allow(clippy::cast_precision_loss)]
    let n = matching as f64;

    GroupLocation {
        latitude: lat_sum / n,
        longitude: lng_sum / n,
        cluster_id: Some(cluster.cluster_id),
    }
}

/// Per-group data shared by all predictions of that group.
struct GroupContext {
    series: Vec<HistoricalPoint>,
    location: GroupLocation,
    breakdown: TimeOfDayBreakdown,
}

/// Attaches location, time-of-day profile and reliability to every
/// prediction.
///
/// Reliability is computed from the group's history at each prediction's
/// own confidence, so later months of the same group score lower.
#[must_use]
pub fn extend_forecasts(
    predictions: &[ForecastPrediction],
    history: &[HistoricalPoint],
    clusters: &[Cluster],
    locator: &dyn PrecinctLocator,
) -> Vec<ExtendedForecast> {
    let mut contexts: BTreeMap<GroupKey, GroupContext> = BTreeMap::new();

    predictions
        .iter()
        .map(|prediction| {
            let key = prediction.group_key();
            let context = contexts.entry(key).or_insert_with(|| GroupContext {
                series: group_series(history, key),
                location: locate_group(clusters, key, locator),
                breakdown: time_of_day_breakdown(clusters, key),
            });

            ExtendedForecast {
                prediction: prediction.clone(),
                latitude: context.location.latitude,
                longitude: context.location.longitude,
                cluster_id: context.location.cluster_id,
                time_of_day_breakdown: context.breakdown,
                primary_time_of_day: context.breakdown.primary(),
                reliability: calculate_reliability(&context.series, prediction.confidence),
            }
        })
        .collect()
}
