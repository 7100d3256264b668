#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Lookup tables for the forecast dashboard.
//!
//! Precinct names and fallback coordinates, crime type names, and risk
//! level colors are process-wide constant data. They are defined in TOML
//! files under `tables/`, embedded at compile time, and can be replaced
//! wholesale by a single override file (see [`Lookups::load`]).
//!
//! Fallback coordinates are exposed through the [`PrecinctLocator`] trait
//! so that a real geocoding service can stand in for the static table
//! without touching the forecasting pipeline.

use std::collections::BTreeMap;
use std::path::Path;

use crime_map_forecast_models::RiskLevel;
use serde::Deserialize;
use thiserror::Error;

/// Errors from loading lookup tables.
#[derive(Debug, Error)]
pub enum LookupError {
    /// The TOML document could not be parsed.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// The override file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The same id appears twice in one table.
    #[error("Duplicate id {id} in {table} table")]
    Duplicate {
        /// Table name.
        table: &'static str,
        /// The repeated id.
        id: i32,
    },
}

/// A WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    /// Latitude.
    pub latitude: f64,
    /// Longitude.
    pub longitude: f64,
}

/// Resolves a representative location for a precinct.
///
/// Implementations must always return a location: unknown precinct ids
/// resolve to a default.
pub trait PrecinctLocator: Send + Sync {
    /// Returns the location for `precinct`, or the default location.
    fn locate(&self, precinct: i32) -> Coordinates;
}

/// One row of the precinct table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PrecinctEntry {
    /// Precinct code.
    pub id: i32,
    /// Display name.
    pub name: String,
    /// Fallback latitude.
    pub latitude: f64,
    /// Fallback longitude.
    pub longitude: f64,
}

impl PrecinctEntry {
    /// The entry's coordinates.
    #[must_use]
    pub const fn coordinates(&self) -> Coordinates {
        Coordinates {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

/// One row of the crime type table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CrimeTypeEntry {
    /// Crime type code.
    pub id: i32,
    /// Display name.
    pub name: String,
}

/// Marker colors per risk level (CSS color strings).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RiskColors {
    /// Low risk.
    pub low: String,
    /// Medium risk.
    pub medium: String,
    /// High risk.
    pub high: String,
    /// Critical risk.
    pub critical: String,
}

impl RiskColors {
    /// Returns the color for a risk level.
    #[must_use]
    pub fn color(&self, level: RiskLevel) -> &str {
        match level {
            RiskLevel::Low => &self.low,
            RiskLevel::Medium => &self.medium,
            RiskLevel::High => &self.high,
            RiskLevel::Critical => &self.critical,
        }
    }
}

/// Precinct lookup with a default entry for unknown ids.
#[derive(Debug, Clone)]
pub struct PrecinctTable {
    default: PrecinctEntry,
    by_id: BTreeMap<i32, PrecinctEntry>,
}

impl PrecinctTable {
    /// Builds a table from its rows.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::Duplicate`] if two rows share an id.
    pub fn new(default: PrecinctEntry, entries: Vec<PrecinctEntry>) -> Result<Self, LookupError> {
        let mut by_id = BTreeMap::new();
        for entry in entries {
            let id = entry.id;
            if by_id.insert(id, entry).is_some() {
                return Err(LookupError::Duplicate {
                    table: "precincts",
                    id,
                });
            }
        }
        Ok(Self { default, by_id })
    }

    /// Returns the row for `precinct`, if present.
    #[must_use]
    pub fn get(&self, precinct: i32) -> Option<&PrecinctEntry> {
        self.by_id.get(&precinct)
    }

    /// Returns the row used for unknown precincts.
    #[must_use]
    pub const fn default_entry(&self) -> &PrecinctEntry {
        &self.default
    }

    /// Number of known precincts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Whether the table has no known precincts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

impl PrecinctLocator for PrecinctTable {
    fn locate(&self, precinct: i32) -> Coordinates {
        self.get(precinct)
            .unwrap_or(&self.default)
            .coordinates()
    }
}

#[derive(Deserialize)]
struct PrecinctFile {
    default: PrecinctEntry,
    #[serde(default)]
    precincts: Vec<PrecinctEntry>,
}

#[derive(Deserialize)]
struct CrimeTypeFile {
    #[serde(default)]
    crime_types: Vec<CrimeTypeEntry>,
}

#[derive(Deserialize)]
struct RiskColorFile {
    risk_colors: RiskColors,
}

/// An override file carries all three tables in one document.
#[derive(Deserialize)]
struct LookupFile {
    default: PrecinctEntry,
    #[serde(default)]
    precincts: Vec<PrecinctEntry>,
    #[serde(default)]
    crime_types: Vec<CrimeTypeEntry>,
    risk_colors: RiskColors,
}

// ── Compile-time embedded TOML files ────────────────────────────────

const PRECINCTS_TOML: &str = include_str!("../tables/precincts.toml");
const CRIME_TYPES_TOML: &str = include_str!("../tables/crime_types.toml");
const RISK_COLORS_TOML: &str = include_str!("../tables/risk_colors.toml");

/// All lookup tables used by enrichment and presentation.
#[derive(Debug, Clone)]
pub struct Lookups {
    precincts: PrecinctTable,
    crime_types: BTreeMap<i32, String>,
    risk_colors: RiskColors,
}

impl Lookups {
    /// Builds lookups from already-parsed tables.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::Duplicate`] if a crime type id repeats.
    pub fn new(
        precincts: PrecinctTable,
        crime_types: Vec<CrimeTypeEntry>,
        risk_colors: RiskColors,
    ) -> Result<Self, LookupError> {
        let mut by_id = BTreeMap::new();
        for entry in crime_types {
            if by_id.insert(entry.id, entry.name).is_some() {
                return Err(LookupError::Duplicate {
                    table: "crime_types",
                    id: entry.id,
                });
            }
        }
        Ok(Self {
            precincts,
            crime_types: by_id,
            risk_colors,
        })
    }

    /// Returns the tables compiled into the binary.
    ///
    /// # Panics
    ///
    /// Panics if an embedded table is malformed (the files are fixed at
    /// compile time and covered by tests).
    #[must_use]
    pub fn embedded() -> Self {
        Self::parse_embedded()
            .unwrap_or_else(|e| panic!("Failed to parse embedded lookup tables: {e}"))
    }

    fn parse_embedded() -> Result<Self, LookupError> {
        let precincts: PrecinctFile = toml::de::from_str(PRECINCTS_TOML)?;
        let crime_types: CrimeTypeFile = toml::de::from_str(CRIME_TYPES_TOML)?;
        let colors: RiskColorFile = toml::de::from_str(RISK_COLORS_TOML)?;

        Self::new(
            PrecinctTable::new(precincts.default, precincts.precincts)?,
            crime_types.crime_types,
            colors.risk_colors,
        )
    }

    /// Parses an override document containing `[default]`,
    /// `[[precincts]]`, `[[crime_types]]` and `[risk_colors]`.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] if the document is malformed or an id
    /// repeats.
    pub fn from_toml_str(document: &str) -> Result<Self, LookupError> {
        let file: LookupFile = toml::de::from_str(document)?;
        Self::new(
            PrecinctTable::new(file.default, file.precincts)?,
            file.crime_types,
            file.risk_colors,
        )
    }

    /// Reads an override file from disk.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, LookupError> {
        let document = std::fs::read_to_string(path)?;
        let lookups = Self::from_toml_str(&document)?;
        log::info!(
            "Loaded {} precincts and {} crime types from {}",
            lookups.precincts.len(),
            lookups.crime_types.len(),
            path.display()
        );
        Ok(lookups)
    }

    /// The precinct table, which doubles as the fallback locator.
    #[must_use]
    pub const fn precincts(&self) -> &PrecinctTable {
        &self.precincts
    }

    /// Display name of a precinct, `"Precinct {id}"` when unknown.
    #[must_use]
    pub fn precinct_name(&self, precinct: i32) -> String {
        self.precincts
            .get(precinct)
            .map_or_else(|| format!("Precinct {precinct}"), |p| p.name.clone())
    }

    /// Display name of a crime type, `"Crime Type {id}"` when unknown.
    #[must_use]
    pub fn crime_type_name(&self, crime_type: i32) -> String {
        self.crime_types
            .get(&crime_type)
            .cloned()
            .unwrap_or_else(|| format!("Crime Type {crime_type}"))
    }

    /// Marker color for a risk level.
    #[must_use]
    pub fn risk_color(&self, level: RiskLevel) -> &str {
        self.risk_colors.color(level)
    }
}

impl Default for Lookups {
    fn default() -> Self {
        Self::embedded()
    }
}
