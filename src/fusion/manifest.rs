use std::{collections::BTreeMap, fs::File, io::BufWriter, path::Path};

use anyhow::{Context, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::common::{column_names, ensure_parent_dir, sha256_file};

/// Columns that locate an address rather than describe it.
pub const LOCATION_COLUMNS: [&str; 15] = [
    "sector_code", "postcode", "sector", "housenumber", "boxnumber", "id", "year", "status",
    "status_valid_from", "streetname", "lat", "lon", "lat_solar", "lon_solar", "address_id",
];

/// Columns carried over from the matched solar site, plus the proximity feature.
pub const SOLAR_COLUMNS: [&str; 11] = [
    "building_type", "building_cat", "building_surface_area", "building_length",
    "solar_opportunity_area", "solar_opportunity_3d", "solar_irradiation",
    "total_solar_irradiation", "solar_id", "energy_production", "top_10_per_energy_prod_in_500m",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHash {
    pub sha256: String,
}

/// Classification of the fused table's columns, written next to the outputs
/// so downstream consumers know which columns are features.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnManifest {
    pub geometry_columns: Vec<String>,
    pub location_columns: Vec<String>,
    pub solar_columns: Vec<String>,
    /// Every column that is neither geometry nor location.
    pub features: Vec<String>,
    /// Features that do not come from the solar data.
    pub info_columns: Vec<String>,
    pub files: BTreeMap<String, FileHash>,
}

impl ColumnManifest {
    /// Classify the columns of `df`; `geometry` names the columns written as WKT.
    pub fn classify(df: &DataFrame, geometry: &[&str]) -> Self {
        let names = column_names(df);
        let owned = |list: &[&str]| list.iter().map(|name| name.to_string()).collect::<Vec<_>>();

        let features = names.iter()
            .filter(|name| !geometry.contains(&name.as_str()) && !LOCATION_COLUMNS.contains(&name.as_str()))
            .cloned()
            .collect::<Vec<_>>();
        let info_columns = features.iter()
            .filter(|name| !SOLAR_COLUMNS.contains(&name.as_str()))
            .cloned()
            .collect();

        Self {
            geometry_columns: owned(geometry),
            location_columns: owned(&LOCATION_COLUMNS[..]),
            solar_columns: owned(&SOLAR_COLUMNS[..]),
            features,
            info_columns,
            files: BTreeMap::new(),
        }
    }

    /// Record the sha256 of a written artifact under `key`.
    pub fn record_file(&mut self, key: impl Into<String>, path: &Path) -> Result<()> {
        self.files.insert(key.into(), FileHash { sha256: sha256_file(path)? });
        Ok(())
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        ensure_parent_dir(path)?;
        let file = File::create(path)
            .with_context(|| format!("[fusion::manifest] failed to create {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)
            .with_context(|| format!("[fusion::manifest] failed to write {}", path.display()))
    }

    pub fn read(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("[fusion::manifest] failed to open {}", path.display()))?;
        serde_json::from_reader(std::io::BufReader::new(file))
            .with_context(|| format!("[fusion::manifest] failed to parse {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_columns() {
        let df = DataFrame::new(vec![
            Column::new("address_id".into(), [0u32]),
            Column::new("coordinates".into(), ["POINT (3.7 51)"]),
            Column::new("streetname".into(), ["Veldstraat"]),
            Column::new("energy_production".into(), [12.0]),
            Column::new("population".into(), [900.0]),
        ]).unwrap();

        let manifest = ColumnManifest::classify(&df, &["coordinates"]);
        assert_eq!(manifest.geometry_columns, vec!["coordinates"]);
        assert_eq!(manifest.features, vec!["energy_production", "population"]);
        assert_eq!(manifest.info_columns, vec!["population"]);
        assert!(manifest.solar_columns.contains(&"top_10_per_energy_prod_in_500m".to_string()));
    }

    #[test]
    fn writes_and_reads_back_with_hashes() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("features.csv");
        std::fs::write(&artifact, "a\n1\n").unwrap();

        let df = DataFrame::new(vec![Column::new("population".into(), [1.0])]).unwrap();
        let mut manifest = ColumnManifest::classify(&df, &[]);
        manifest.record_file("feature_table", &artifact).unwrap();

        let path = dir.path().join("out/columns.json");
        manifest.write(&path).unwrap();
        let read = ColumnManifest::read(&path).unwrap();

        assert_eq!(read, manifest);
        assert_eq!(read.files["feature_table"].sha256.len(), 64);
    }
}
