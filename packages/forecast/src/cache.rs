//! Cached analysis input.
//!
//! The analysis step stores its clusters as a JSON array. A forecast run
//! reads the file once and never writes it back.

use std::path::Path;

use crime_map_forecast_models::Cluster;

use crate::ForecastError;

/// Loads the cached clusters from `path`.
///
/// # Errors
///
/// * If the file cannot be read
/// * If the file is not a JSON array of clusters
pub fn load_cluster_data(path: &Path) -> Result<Vec<Cluster>, ForecastError> {
    let contents = std::fs::read_to_string(path)?;
    let clusters: Vec<Cluster> = serde_json::from_str(&contents)?;

    log::info!(
        "Loaded {} clusters ({} incidents) from {}",
        clusters.len(),
        clusters.iter().map(|c| c.cluster_items.len()).sum::<usize>(),
        path.display()
    );

    Ok(clusters)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "crime_map_forecast_{}_{name}",
            std::process::id()
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn loads_clusters_from_json() {
        let path = temp_file(
            "clusters.json",
            r#"[{"clusterId": 4, "clusterCount": 1, "clusterItems": [
                {"caseId": "X1", "latitude": 40.75, "longitude": -73.99, "year": 2024,
                 "month": 2, "precinct": 14, "crimeType": 3, "timeOfDay": "evening"}
            ]}]"#,
        );
        let clusters = load_cluster_data(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].cluster_id, 4);
        assert_eq!(clusters[0].cluster_items[0].crime_type, 3);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = load_cluster_data(Path::new("/nonexistent/analysis_cache.json"));
        assert!(matches!(result, Err(ForecastError::Io(_))));
    }

    #[test]
    fn malformed_json_is_a_json_error() {
        let path = temp_file("broken.json", r#"{"clusters": "#);
        let result = load_cluster_data(&path);
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(result, Err(ForecastError::Json(_))));
    }
}
