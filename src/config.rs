use std::{fs::File, io::BufReader, path::{Path, PathBuf}};

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

/// Unit prices used to turn consumption into cost.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnergyPrice {
    pub gas: f64,
    pub electricity: f64,
}

impl Default for EnergyPrice {
    fn default() -> Self {
        Self { gas: 0.1, electricity: 0.3 }
    }
}

/// Numeric parameters of the fusion pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionParams {
    /// Rounds of constrained nearest matching.
    pub join_attempts: usize,
    /// Matching cutoff between an address and a solar centroid, meters.
    pub max_distance: f64,
    /// Radius of the solar proximity feature, meters.
    pub proximity_buffer: f64,
    /// Fraction of solar sites (by production) counted by the proximity feature.
    pub top_percentile: f64,
    pub energy_price: EnergyPrice,
    /// How many residential consumers one non-residential consumer is worth.
    pub other_residential_energy_ratio: f64,
    pub green_energy_ratio: f64,
    pub solar_panel_cost_per_m2: f64,
}

impl Default for FusionParams {
    fn default() -> Self {
        Self {
            join_attempts: 5,
            max_distance: 200.0,
            proximity_buffer: 500.0,
            top_percentile: 0.1,
            energy_price: EnergyPrice::default(),
            other_residential_energy_ratio: 5.0,
            green_energy_ratio: 0.2,
            solar_panel_cost_per_m2: 250.0,
        }
    }
}

impl FusionParams {
    /// Reject out-of-range parameters before anything runs.
    pub fn validate(&self) -> Result<()> {
        fn non_negative(name: &str, value: f64) -> Result<()> {
            ensure!(value.is_finite() && value >= 0.0, "[config] {name} must be a finite value >= 0, got {value}");
            Ok(())
        }

        ensure!(self.join_attempts >= 1, "[config] join_attempts must be at least 1, got {}", self.join_attempts);
        ensure!(self.max_distance.is_finite() && self.max_distance > 0.0,
            "[config] max_distance must be positive, got {}", self.max_distance);
        ensure!(self.proximity_buffer.is_finite() && self.proximity_buffer > 0.0,
            "[config] proximity_buffer must be positive, got {}", self.proximity_buffer);
        ensure!(self.top_percentile > 0.0 && self.top_percentile <= 1.0,
            "[config] top_percentile must be in (0, 1], got {}", self.top_percentile);
        ensure!((0.0..=1.0).contains(&self.green_energy_ratio),
            "[config] green_energy_ratio must be in [0, 1], got {}", self.green_energy_ratio);
        non_negative("energy_price.gas", self.energy_price.gas)?;
        non_negative("energy_price.electricity", self.energy_price.electricity)?;
        non_negative("other_residential_energy_ratio", self.other_residential_energy_ratio)?;
        non_negative("solar_panel_cost_per_m2", self.solar_panel_cost_per_m2)?;
        Ok(())
    }
}

/// A delimited text table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSource {
    pub path: PathBuf,
    #[serde(default = "default_separator")]
    pub separator: char,
}

fn default_separator() -> char { ',' }

/// The address table. `lon`/`lat` hold x/y in the source CRS given as a
/// PROJ.4 string, or WGS84 degrees when it is absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressSource {
    #[serde(flatten)]
    pub table: TableSource,
    #[serde(default)]
    pub proj4: Option<String>,
}

/// A polygon layer (GeoJSON or shapefile), with its source CRS as a PROJ.4 string.
/// Layers without a CRS are assumed to be WGS84 lon/lat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSource {
    pub path: PathBuf,
    #[serde(default)]
    pub proj4: Option<String>,
}

/// Where every input dataset lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcePaths {
    /// Sector polygons, with a `sector_code` attribute.
    pub sector_boundaries: LayerSource,
    /// Tables keyed by `sector_code` (sector mapping, deprivation index, population, income).
    #[serde(default)]
    pub sector_tables: Vec<TableSource>,
    /// Address points with `lat`/`lon` columns.
    pub addresses: AddressSource,
    /// Tables keyed by `postcode` (EV charging power, decentralized production).
    #[serde(default)]
    pub postcode_tables: Vec<TableSource>,
    /// Street consumption table keyed by `street`.
    #[serde(default)]
    pub street_consumption: Option<TableSource>,
    /// Land-use polygons with an `item2012` category.
    #[serde(default)]
    pub land_use: Option<LayerSource>,
    /// Solar rooftop footprints with `energy_production` and related attributes.
    pub solar: LayerSource,
}

/// Where the pipeline writes its artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputPaths {
    pub feature_table: PathBuf,
    pub solar_table: PathBuf,
    pub manifest: PathBuf,
}

/// Full configuration of a fusion run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub paths: SourcePaths,
    pub output: OutputPaths,
    #[serde(default)]
    pub params: FusionParams,
}

impl Config {
    /// Read and validate a JSON configuration file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("[config] failed to open {}", path.display()))?;
        let config: Config = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("[config] failed to parse {}", path.display()))?;
        config.params.validate()?;
        Ok(config)
    }
}
