use std::path::Path;

use anyhow::{bail, Context, Result};
use geo::{Coord, MultiPolygon};
use log::{debug, info};
use polars::prelude::*;

use crate::{
    common::{f64_values, set_f64},
    config::{AddressSource, LayerSource, SourcePaths, TableSource},
    fusion::FusionInputs,
    geom::{Crs, Polygons, Projector},
    layer::{PolygonLayer, SolarLayer},
};

use super::{geojson::read_geojson, shp::read_shapefile, tables::read_csv};

fn read_shapes(path: &Path) -> Result<(DataFrame, Vec<MultiPolygon<f64>>)> {
    let ext = path.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("geojson" | "json") => read_geojson(path),
        Some("shp") => read_shapefile(path),
        _ => bail!("[io::load] unsupported polygon layer format: {}", path.display()),
    }
}

/// Read a polygon layer and normalise its shapes to WGS84.
pub fn read_polygon_layer(source: &LayerSource) -> Result<(DataFrame, Polygons)> {
    let (data, shapes) = read_shapes(&source.path)?;
    let crs = source.proj4.as_deref().map_or(Crs::Wgs84, Crs::from_proj4);
    let polygons = Polygons::new(shapes, crs.clone());

    let polygons = if crs == Crs::Wgs84 {
        polygons
    } else {
        debug!("[io::load] reprojecting {} from {crs}", source.path.display());
        polygons.project(&Projector::new(crs, Crs::Wgs84)?)?
    };

    info!("[io::load] read {} shapes from {}", polygons.len(), source.path.display());
    Ok((data, polygons))
}

fn read_table(source: &TableSource) -> Result<DataFrame> {
    let df = read_csv(&source.path, source.separator)?;
    info!("[io::load] read {} rows from {}", df.height(), source.path.display());
    Ok(df)
}

/// Read the address table and reproject its `lon`/`lat` to WGS84 degrees.
pub fn read_addresses(source: &AddressSource) -> Result<DataFrame> {
    let mut df = read_table(&source.table)?;
    let crs = source.proj4.as_deref().map_or(Crs::Wgs84, Crs::from_proj4);
    if crs == Crs::Wgs84 {
        return Ok(df);
    }

    debug!("[io::load] reprojecting addresses from {crs}");
    let projector = Projector::new(crs, Crs::Wgs84)?;
    let coords = f64_values(&df, "lon")?.into_iter().zip(f64_values(&df, "lat")?)
        .map(|pair| match pair {
            (Some(x), Some(y)) => projector.project_coord(Coord { x, y }).map(Some),
            _ => Ok(None),
        })
        .collect::<Result<Vec<_>>>()?;

    set_f64(&mut df, "lon", coords.iter().map(|c| c.map(|c| c.x)).collect())?;
    set_f64(&mut df, "lat", coords.iter().map(|c| c.map(|c| c.y)).collect())?;
    Ok(df)
}

/// Read every configured dataset into pipeline inputs.
pub fn load_inputs(paths: &SourcePaths) -> Result<FusionInputs> {
    let (data, shapes) = read_polygon_layer(&paths.sector_boundaries)
        .context("[io::load] failed to read sector boundaries")?;
    let sectors = PolygonLayer::new(data, shapes)?;

    let land_use = paths.land_use.as_ref()
        .map(|source| {
            let (data, shapes) = read_polygon_layer(source)
                .context("[io::load] failed to read land use")?;
            PolygonLayer::new(data, shapes)
        })
        .transpose()?;

    let (data, shapes) = read_polygon_layer(&paths.solar)
        .context("[io::load] failed to read solar footprints")?;
    let solar = SolarLayer::new(data, shapes)?;

    Ok(FusionInputs {
        sectors,
        sector_tables: paths.sector_tables.iter().map(read_table).collect::<Result<_>>()?,
        addresses: read_addresses(&paths.addresses).context("[io::load] failed to read addresses")?,
        postcode_tables: paths.postcode_tables.iter().map(read_table).collect::<Result<_>>()?,
        street_consumption: paths.street_consumption.as_ref().map(read_table).transpose()?,
        land_use,
        solar,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_layer_formats() {
        let source = LayerSource { path: "sectors.kml".into(), proj4: None };
        assert!(read_polygon_layer(&source).is_err());
    }

    #[test]
    fn reprojects_metric_addresses_to_degrees() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("addresses.csv");
        std::fs::write(&path, "lon;lat;streetname\n500000;5650000;Veldstraat\n").unwrap();

        let source = AddressSource {
            table: TableSource { path, separator: ';' },
            proj4: Some("+proj=utm +zone=31 +datum=WGS84 +units=m +no_defs".to_string()),
        };
        let df = read_addresses(&source).unwrap();
        let lon = f64_values(&df, "lon").unwrap()[0].unwrap();
        let lat = f64_values(&df, "lat").unwrap()[0].unwrap();
        assert!((lon - 3.0).abs() < 1e-6, "lon {lon}");
        assert!((lat - 51.0).abs() < 0.01, "lat {lat}");
    }

    #[test]
    fn reads_geojson_layers_as_wgs84() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sectors.geojson");
        std::fs::write(&path, r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "properties": {"sector_code": "A01"},
             "geometry": {"type": "Polygon", "coordinates": [[[3.7, 51.0], [3.8, 51.0], [3.8, 51.1], [3.7, 51.1], [3.7, 51.0]]]}}
        ]}"#).unwrap();

        let (data, polygons) = read_polygon_layer(&LayerSource { path, proj4: None }).unwrap();
        assert_eq!(data.height(), 1);
        assert_eq!(polygons.crs(), &Crs::Wgs84);
        assert_eq!(polygons.covering(&geo::Point::new(3.75, 51.05)), Some(0));
    }
}
