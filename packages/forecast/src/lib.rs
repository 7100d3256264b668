#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Crime count forecasting for the dashboard.
//!
//! The pipeline is a single synchronous pass over in-memory data:
//!
//! 1. [`aggregate`] collapses cluster incidents into monthly counts per
//!    (precinct, crime type).
//! 2. [`estimators`] extrapolates each group's series with one of four
//!    trend models.
//! 3. [`classify`] derives trend direction, risk level and horizon
//!    confidence.
//! 4. [`reliability`] scores the data behind each prediction.
//! 5. [`enrich`] attaches a representative location and time-of-day
//!    profile.
//! 6. [`map_points`] filters reliable forecasts and projects them for the
//!    map.
//!
//! An optional remote statistical service ([`remote`]) can replace step 2
//! and 3; any failure falls back to the local models (see
//! [`pipeline::run_forecast`]).

pub mod aggregate;
pub mod cache;
pub mod classify;
pub mod enrich;
pub mod estimators;
pub mod export;
pub mod map_points;
pub mod pipeline;
pub mod reliability;
pub mod remote;
pub mod summary;

use thiserror::Error;

/// Errors that can occur while producing a forecast.
#[derive(Debug, Error)]
pub enum ForecastError {
    /// HTTP request to the forecasting service failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV export failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Reading or writing a file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The forecasting service answered with an unusable payload.
    #[error("Invalid forecast response: {message}")]
    InvalidResponse {
        /// Description of what was wrong.
        message: String,
    },

    /// The cluster data is structurally malformed.
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Description of what was wrong.
        message: String,
    },
}
