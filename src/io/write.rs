use std::path::Path;

use anyhow::Result;
use geo::Point;
use log::info;

use crate::{
    common::{f64_values, set_str},
    config::OutputPaths,
    fusion::{ColumnManifest, FusionOutput},
    layer::SolarLayer,
    table::FeatureTable,
};

use super::{
    tables::write_table,
    wkt::{multipolygon_wkt, point_wkt},
};

/// Name of the WKT point column of the feature table.
pub const COORDINATES_COLUMN: &str = "coordinates";

/// Write the feature table with its `lon`/`lat` rendered as a WKT `coordinates` column.
pub fn write_feature_table(table: &FeatureTable, path: &Path) -> Result<()> {
    let mut df = table.data().clone();
    let lon = f64_values(&df, "lon")?;
    let lat = f64_values(&df, "lat")?;
    let wkt = lon.into_iter().zip(lat)
        .map(|pair| match pair {
            (Some(lon), Some(lat)) => Some(point_wkt(&Point::new(lon, lat))),
            _ => None,
        })
        .collect();
    set_str(&mut df, COORDINATES_COLUMN, wkt)?;

    write_table(&mut df, path)?;
    info!("[io::write] wrote {} addresses to {}", df.height(), path.display());
    Ok(())
}

/// Write the solar table with WKT `centroid` and `geometry_building` columns.
pub fn write_solar_table(solar: &SolarLayer, path: &Path) -> Result<()> {
    let mut df = solar.data().clone();
    let centroids = if solar.centroids().is_empty() {
        vec![None; df.height()]
    } else {
        solar.centroids().iter().map(|centroid| centroid.as_ref().map(point_wkt)).collect()
    };
    set_str(&mut df, "centroid", centroids)?;
    set_str(&mut df, "geometry_building",
        solar.footprints().shapes().iter().map(|shape| Some(multipolygon_wkt(shape))).collect())?;

    write_table(&mut df, path)?;
    info!("[io::write] wrote {} solar sites to {}", df.height(), path.display());
    Ok(())
}

/// Write both tables and the column manifest, which records their hashes.
pub fn write_outputs(output: &FusionOutput, paths: &OutputPaths) -> Result<ColumnManifest> {
    write_feature_table(&output.features, &paths.feature_table)?;
    write_solar_table(&output.solar, &paths.solar_table)?;

    let mut manifest = ColumnManifest::classify(output.features.data(), &[COORDINATES_COLUMN]);
    manifest.record_file("feature_table", &paths.feature_table)?;
    manifest.record_file("solar_table", &paths.solar_table)?;
    manifest.write(&paths.manifest)?;

    info!("[io::write] {} feature columns, manifest at {}", manifest.features.len(), paths.manifest.display());
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;
    use polars::prelude::*;
    use crate::{geom::{Crs, Polygons}, io::read_csv};

    #[test]
    fn feature_table_gets_wkt_coordinates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("features.csv");
        let table = FeatureTable::from_addresses(DataFrame::new(vec![
            Column::new("lat".into(), [51.05]),
            Column::new("lon".into(), [3.72]),
        ]).unwrap()).unwrap();

        write_feature_table(&table, &path).unwrap();
        let df = read_csv(&path, ',').unwrap();
        assert_eq!(crate::common::str_values(&df, "coordinates").unwrap(), vec![Some("POINT (3.72 51.05)".to_string())]);
    }

    #[test]
    fn solar_table_gets_wkt_geometry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("solar.csv");
        let footprint = geo::MultiPolygon(vec![polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0)]]);
        let solar = SolarLayer::new(
            DataFrame::new(vec![Column::new("energy_production".into(), [4.0])]).unwrap(),
            Polygons::new(vec![footprint], Crs::Wgs84),
        ).unwrap();

        write_solar_table(&solar, &path).unwrap();
        let df = read_csv(&path, ',').unwrap();
        assert_eq!(crate::common::str_values(&df, "geometry_building").unwrap(),
            vec![Some("MULTIPOLYGON (((0 0, 1 0, 1 1, 0 0)))".to_string())]);
        assert_eq!(df.column("centroid").unwrap().null_count(), 1);
    }
}
