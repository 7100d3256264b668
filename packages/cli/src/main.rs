#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for crime count forecasting.
//!
//! Reads the cached analysis clusters, runs the forecast (remote service
//! first when configured, local models otherwise) and prints predictions,
//! map points or a summary as JSON, or exports predictions as CSV.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use crime_map_forecast::{
    ForecastError,
    cache::load_cluster_data,
    enrich::extend_forecasts,
    estimators::Perturbation,
    export::write_predictions_csv,
    map_points::{
        DEFAULT_MIN_RELIABILITY, MapFilterThresholds, create_forecast_map_points,
        filter_reliable_forecasts,
    },
    pipeline::{ForecastRun, run_forecast},
    remote::{HttpForecastService, RemoteForecaster},
    summary::summarize,
};
use crime_map_forecast_models::{Cluster, ForecastModel, ForecastParams};
use crime_map_lookup::Lookups;
use serde::Serialize;

const DEFAULT_ANALYSIS_CACHE: &str = "data/analysis_cache.json";

/// Forecast crime counts from cached cluster analysis.
#[derive(Parser)]
#[command(name = "crime_map_forecast")]
#[command(about = "Forecast crime counts per precinct and crime type")]
struct Cli {
    /// Cached analysis input. Defaults to `$CRIME_MAP_ANALYSIS_CACHE`, then
    /// `data/analysis_cache.json`.
    #[arg(long)]
    input: Option<PathBuf>,

    /// Remote forecasting endpoint. Defaults to `$FORECAST_SERVICE_URL`;
    /// only local models are used when neither is set.
    #[arg(long)]
    service_url: Option<String>,

    /// TOML file overriding the built-in lookup tables.
    #[arg(long)]
    lookups: Option<PathBuf>,

    /// Subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Forecast parameters shared by every subcommand.
#[derive(Args)]
struct ForecastArgs {
    /// Months to forecast (1-12).
    #[arg(long, default_value_t = 6)]
    period: u32,

    /// Model: linear, polynomial, seasonal or arima. Unknown names use linear.
    #[arg(long, default_value = "linear")]
    model: String,

    /// Base confidence for the first month (0.7-0.99).
    #[arg(long, default_value_t = 0.95)]
    confidence: f64,

    /// Disable seasonal adjustment.
    #[arg(long)]
    no_seasonality: bool,

    /// Weight all months equally in the arima model instead of favoring
    /// recent ones.
    #[arg(long)]
    no_weight_recent: bool,

    /// Seed for reproducible jitter in the arima model.
    #[arg(long, conflicts_with = "jitter_random")]
    jitter_seed: Option<u64>,

    /// Apply non-reproducible jitter in the arima model.
    #[arg(long)]
    jitter_random: bool,
}

impl ForecastArgs {
    fn params(&self) -> ForecastParams {
        ForecastParams::new(
            self.period,
            ForecastModel::from_name(&self.model),
            self.confidence,
            !self.no_seasonality,
            !self.no_weight_recent,
        )
    }

    const fn perturbation(&self) -> Perturbation {
        match self.jitter_seed {
            Some(seed) => Perturbation::Seeded(seed),
            None if self.jitter_random => Perturbation::Entropy,
            None => Perturbation::Disabled,
        }
    }
}

/// Top-level subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Print historical points and predictions as JSON.
    Predict {
        #[command(flatten)]
        forecast: ForecastArgs,
    },

    /// Print reliable forecasts as map points (JSON).
    Map {
        #[command(flatten)]
        forecast: ForecastArgs,

        /// Lowest reliability score to keep.
        #[arg(long, default_value_t = DEFAULT_MIN_RELIABILITY)]
        min_reliability: f64,

        /// Fewest historical points to keep.
        #[arg(long, default_value_t = 3)]
        min_sample_size: usize,

        /// Highest historical variance to keep.
        #[arg(long, default_value_t = 1.5)]
        max_variance: f64,
    },

    /// Write predictions as CSV.
    Export {
        #[command(flatten)]
        forecast: ForecastArgs,

        /// Output file (default: stdout).
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Print aggregate statistics of the forecast as JSON.
    Summary {
        #[command(flatten)]
        forecast: ForecastArgs,
    },
}

impl Commands {
    const fn forecast_args(&self) -> &ForecastArgs {
        match self {
            Self::Predict { forecast }
            | Self::Map { forecast, .. }
            | Self::Export { forecast, .. }
            | Self::Summary { forecast } => forecast,
        }
    }
}

fn input_path(cli: &Cli) -> PathBuf {
    cli.input.clone().unwrap_or_else(|| {
        std::env::var("CRIME_MAP_ANALYSIS_CACHE")
            .map_or_else(|_| PathBuf::from(DEFAULT_ANALYSIS_CACHE), PathBuf::from)
    })
}

fn service_url(cli: &Cli) -> Option<String> {
    cli.service_url
        .clone()
        .or_else(|| std::env::var("FORECAST_SERVICE_URL").ok())
        .filter(|url| !url.trim().is_empty())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn forecast(
    clusters: &[Cluster],
    args: &ForecastArgs,
    service: Option<&HttpForecastService>,
) -> Result<ForecastRun, ForecastError> {
    let params = args.params();
    log::info!(
        "Forecasting {} months with the {} model at {:.0}% confidence",
        params.forecast_period,
        params.model,
        params.confidence * 100.0
    );

    let remote = service.map(|s| s as &dyn RemoteForecaster);
    let run = run_forecast(clusters, &params, args.perturbation(), remote).await?;

    log::info!(
        "Produced {} predictions from {} historical points ({:?})",
        run.predictions.len(),
        run.historical.len(),
        run.source
    );

    Ok(run)
}

fn export_csv(
    run: &ForecastRun,
    lookups: &Lookups,
    output: Option<&Path>,
) -> Result<(), ForecastError> {
    match output {
        Some(path) => {
            let file = std::fs::File::create(path)?;
            write_predictions_csv(file, &run.predictions, lookups)?;
            log::info!(
                "Wrote {} predictions to {}",
                run.predictions.len(),
                path.display()
            );
        }
        None => write_predictions_csv(std::io::stdout().lock(), &run.predictions, lookups)?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_custom_env("RUST_LOG");
    let cli = Cli::parse();

    let lookups = match &cli.lookups {
        Some(path) => Lookups::load(path)?,
        None => Lookups::embedded(),
    };
    let service = service_url(&cli).map(HttpForecastService::new).transpose()?;
    let clusters = load_cluster_data(&input_path(&cli))?;

    let run = match forecast(&clusters, cli.command.forecast_args(), service.as_ref()).await {
        Ok(run) => run,
        Err(e) => {
            log::error!("Forecast generation failed: {e}");
            return Err(e.into());
        }
    };

    match &cli.command {
        Commands::Predict { .. } => print_json(&run)?,
        Commands::Map {
            min_reliability,
            min_sample_size,
            max_variance,
            ..
        } => {
            let thresholds = MapFilterThresholds {
                min_reliability: *min_reliability,
                min_sample_size: *min_sample_size,
                max_variance: *max_variance,
            };
            let extended = extend_forecasts(
                &run.predictions,
                &run.historical,
                &clusters,
                lookups.precincts(),
            );
            let reliable = filter_reliable_forecasts(&extended, &thresholds);
            let points =
                create_forecast_map_points(&reliable, thresholds.min_reliability, &lookups);
            log::info!("{} of {} forecasts shown on the map", points.len(), extended.len());
            print_json(&points)?;
        }
        Commands::Export { output, .. } => export_csv(&run, &lookups, output.as_deref())?,
        Commands::Summary { .. } => print_json(&summarize(&run.predictions))?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("crime_map_forecast").chain(args.iter().copied()))
    }

    #[test]
    fn recent_months_are_weighted_by_default() {
        let cli = parse(&["predict", "--model", "arima"]).unwrap();
        let params = cli.command.forecast_args().params();
        assert!(params.weight_recent_data);
        assert!(params.include_seasonality);
    }

    #[test]
    fn no_weight_recent_switch_disables_recency_weights() {
        let cli = parse(&["summary", "--model", "arima", "--no-weight-recent"]).unwrap();
        assert!(!cli.command.forecast_args().params().weight_recent_data);
    }

    #[test]
    fn weight_recent_takes_no_value() {
        assert!(parse(&["predict", "--weight-recent", "false"]).is_err());
        assert!(parse(&["predict", "--no-weight-recent", "false"]).is_err());
    }

    #[test]
    fn jitter_seed_conflicts_with_random_jitter() {
        assert!(parse(&["predict", "--jitter-seed", "7", "--jitter-random"]).is_err());

        let cli = parse(&["predict", "--jitter-seed", "7"]).unwrap();
        assert!(matches!(
            cli.command.forecast_args().perturbation(),
            Perturbation::Seeded(7)
        ));
    }
}
