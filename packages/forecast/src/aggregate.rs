//! Monthly aggregation of cluster incidents.
//!
//! Every incident sharing `(year, month, precinct, crime type)` collapses
//! into one [`HistoricalPoint`]. The output is ordered by `(year, month)`;
//! points within the same month keep the order in which their first
//! incident was seen.

use std::collections::{BTreeMap, BTreeSet, btree_map::Entry};

use crime_map_forecast_models::{Cluster, ClusterItem, GroupKey, HistoricalPoint};

type MonthKey = (i32, u32, i32, i32);

fn collect<'a>(items: impl IntoIterator<Item = (&'a ClusterItem, Option<i32>)>) -> Vec<HistoricalPoint> {
    let mut index: BTreeMap<MonthKey, usize> = BTreeMap::new();
    let mut points: Vec<HistoricalPoint> = Vec::new();

    for (item, cluster_id) in items {
        let key = (item.year, item.month, item.precinct, item.crime_type);
        match index.entry(key) {
            Entry::Occupied(slot) => {
                let point = &mut points[*slot.get()];
                point.count = point.count.saturating_add(1);
            }
            Entry::Vacant(slot) => {
                slot.insert(points.len());
                points.push(HistoricalPoint {
                    year: item.year,
                    month: item.month,
                    precinct: item.precinct,
                    crime_type: item.crime_type,
                    count: 1,
                    time_of_day: item.time_of_day.clone(),
                    cluster_id,
                });
            }
        }
    }

    points.sort_by_key(|p| (p.year, p.month));
    points
}

/// Aggregates loose incidents into monthly counts.
#[must_use]
pub fn aggregate(items: &[ClusterItem]) -> Vec<HistoricalPoint> {
    collect(items.iter().map(|item| (item, None)))
}

/// Aggregates every incident of every cluster into monthly counts,
/// remembering the cluster of the first incident in each month.
#[must_use]
pub fn aggregate_clusters(clusters: &[Cluster]) -> Vec<HistoricalPoint> {
    let points = collect(clusters.iter().flat_map(|cluster| {
        cluster
            .cluster_items
            .iter()
            .map(move |item| (item, Some(cluster.cluster_id)))
    }));
    log::debug!(
        "Aggregated {} clusters into {} monthly points",
        clusters.len(),
        points.len()
    );
    points
}

/// Returns the points of one (precinct, crime type), in series order.
#[must_use]
pub fn group_series(history: &[HistoricalPoint], key: GroupKey) -> Vec<HistoricalPoint> {
    history
        .iter()
        .filter(|p| p.group_key() == key)
        .cloned()
        .collect()
}

/// Returns every distinct group in the history, ascending.
#[must_use]
pub fn group_keys(history: &[HistoricalPoint]) -> Vec<GroupKey> {
    history
        .iter()
        .map(HistoricalPoint::group_key)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// The latest `(year, month)` present in the history.
#[must_use]
pub fn latest_month(history: &[HistoricalPoint]) -> Option<(i32, u32)> {
    history.iter().map(|p| (p.year, p.month)).max()
}

/// Adds `offset` months to a `(year, month)` pair.
#[must_use]
pub fn add_months(year: i32, month: u32, offset: u32) -> (i32, u32) {
    let zero_based = i64::from(year) * 12 + i64::from(month.clamp(1, 12) - 1) + i64::from(offset);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let shifted = (
        zero_based.div_euclid(12) as i32,
        zero_based.rem_euclid(12) as u32 + 1,
    );
    shifted
}

/// Number of months from `from` to `to`, negative when `to` is earlier.
#[must_use]
pub fn months_between(from: (i32, u32), to: (i32, u32)) -> i64 {
    let index = |(year, month): (i32, u32)| i64::from(year) * 12 + i64::from(month.clamp(1, 12));
    index(to) - index(from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crime_map_forecast_models::CaseId;

    fn item(case: i64, year: i32, month: u32, precinct: i32, crime_type: i32) -> ClusterItem {
        ClusterItem {
            case_id: CaseId::Number(case),
            latitude: 40.75,
            longitude: -73.99,
            year,
            month,
            precinct,
            crime_type,
            time_of_day: format!("{}:00", case % 24),
        }
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(aggregate(&[]).is_empty());
        assert!(aggregate_clusters(&[]).is_empty());
    }

    #[test]
    fn same_key_increments_count() {
        let items = vec![
            item(1, 2024, 3, 14, 2),
            item(2, 2024, 3, 14, 2),
            item(3, 2024, 3, 14, 1),
            item(4, 2024, 3, 14, 2),
        ];
        let points = aggregate(&items);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].crime_type, 2);
        assert_eq!(points[0].count, 3);
        assert_eq!(points[0].time_of_day, "1:00");
        assert_eq!(points[1].count, 1);
        assert!(points[0].cluster_id.is_none());
    }

    #[test]
    fn output_is_sorted_by_year_and_month() {
        let items = vec![
            item(1, 2024, 5, 14, 2),
            item(2, 2023, 11, 14, 2),
            item(3, 2024, 1, 14, 2),
            item(4, 2023, 12, 9, 2),
        ];
        let months: Vec<(i32, u32)> = aggregate(&items)
            .iter()
            .map(|p| (p.year, p.month))
            .collect();
        assert_eq!(months, vec![(2023, 11), (2023, 12), (2024, 1), (2024, 5)]);
    }

    #[test]
    fn clusters_record_first_contributing_cluster() {
        let clusters = vec![
            Cluster {
                cluster_id: 7,
                cluster_items: vec![item(1, 2024, 3, 14, 2)],
                cluster_count: 1,
            },
            Cluster {
                cluster_id: 8,
                cluster_items: vec![item(2, 2024, 3, 14, 2), item(3, 2024, 4, 14, 2)],
                cluster_count: 2,
            },
        ];
        let points = aggregate_clusters(&clusters);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].count, 2);
        assert_eq!(points[0].cluster_id, Some(7));
        assert_eq!(points[1].cluster_id, Some(8));
    }

    #[test]
    fn groups_and_latest_month() {
        let points = aggregate(&[
            item(1, 2024, 3, 14, 2),
            item(2, 2024, 6, 9, 1),
            item(3, 2023, 8, 14, 2),
        ]);
        let keys = group_keys(&points);
        assert_eq!(
            keys,
            vec![
                GroupKey {
                    precinct: 9,
                    crime_type: 1
                },
                GroupKey {
                    precinct: 14,
                    crime_type: 2
                },
            ]
        );
        assert_eq!(group_series(&points, keys[1]).len(), 2);
        assert_eq!(latest_month(&points), Some((2024, 6)));
        assert_eq!(latest_month(&[]), None);
    }

    #[test]
    fn adding_months_rolls_over_years() {
        assert_eq!(add_months(2024, 11, 1), (2024, 12));
        assert_eq!(add_months(2024, 12, 1), (2025, 1));
        assert_eq!(add_months(2024, 6, 12), (2025, 6));
        assert_eq!(add_months(2024, 1, 0), (2024, 1));
    }

    #[test]
    fn months_between_spans_years() {
        assert_eq!(months_between((2023, 12), (2024, 4)), 4);
        assert_eq!(months_between((2024, 3), (2024, 3)), 0);
        assert_eq!(months_between((2024, 5), (2024, 3)), -2);
        assert_eq!(months_between((2022, 1), (2024, 1)), 24);
    }
}
