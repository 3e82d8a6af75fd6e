//! GeoJSON polygon layers: Polygon / MultiPolygon features plus their properties.

use std::{fs, path::Path};

use anyhow::{anyhow, bail, Context, Result};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use polars::prelude::*;
use serde_json::{Map, Value};

/// Read a GeoJSON FeatureCollection into an attribute table and one shape per feature.
pub fn read_geojson(path: &Path) -> Result<(DataFrame, Vec<MultiPolygon<f64>>)> {
    let bytes = fs::read(path)
        .with_context(|| format!("[io::geojson] failed to read {}", path.display()))?;
    read_geojson_bytes(&bytes)
        .with_context(|| format!("[io::geojson] failed to parse {}", path.display()))
}

pub(crate) fn read_geojson_bytes(bytes: &[u8]) -> Result<(DataFrame, Vec<MultiPolygon<f64>>)> {
    let value: Value = serde_json::from_slice(bytes).context("[io::geojson] invalid JSON")?;
    let features = value["features"].as_array()
        .ok_or_else(|| anyhow!("[io::geojson] expected a FeatureCollection"))?;

    let mut shapes = Vec::with_capacity(features.len());
    let mut properties = Vec::with_capacity(features.len());
    for (i, feature) in features.iter().enumerate() {
        shapes.push(parse_geometry(&feature["geometry"])
            .with_context(|| format!("[io::geojson] feature {i}"))?);
        properties.push(feature["properties"].as_object());
    }

    Ok((properties_to_dataframe(&properties)?, shapes))
}

fn parse_geometry(geometry: &Value) -> Result<MultiPolygon<f64>> {
    let coords = geometry["coordinates"].as_array()
        .ok_or_else(|| anyhow!("geometry has no coordinates"))?;
    match geometry["type"].as_str() {
        Some("Polygon") => Ok(MultiPolygon(vec![parse_polygon(coords)?])),
        Some("MultiPolygon") => coords.iter()
            .map(|polygon| parse_polygon(polygon.as_array().ok_or_else(|| anyhow!("invalid MultiPolygon"))?))
            .collect::<Result<Vec<_>>>()
            .map(MultiPolygon),
        other => bail!("unsupported geometry type {other:?}"),
    }
}

/// `[exterior, hole, hole, ...]`
fn parse_polygon(rings: &[Value]) -> Result<Polygon<f64>> {
    let mut rings = rings.iter().map(|ring| parse_ring(ring.as_array().ok_or_else(|| anyhow!("invalid ring"))?));
    let exterior = rings.next().ok_or_else(|| anyhow!("polygon has no exterior ring"))??;
    let interiors = rings.collect::<Result<Vec<_>>>()?;
    Ok(Polygon::new(exterior, interiors))
}

fn parse_ring(coords: &[Value]) -> Result<LineString<f64>> {
    let mut points = coords.iter()
        .map(|pair| match pair.as_array().map(Vec::as_slice) {
            Some([x, y, ..]) => Ok(Coord {
                x: x.as_f64().ok_or_else(|| anyhow!("x must be a number"))?,
                y: y.as_f64().ok_or_else(|| anyhow!("y must be a number"))?,
            }),
            _ => bail!("invalid coordinate {pair}"),
        })
        .collect::<Result<Vec<_>>>()?;

    if points.first() != points.last() {
        points.push(points[0]);
    }
    Ok(LineString(points))
}

/// One column per property key, in first-seen order. Columns whose values are
/// all numbers (or null) become Float64, booleans become Boolean, anything
/// else is stringified.
fn properties_to_dataframe(properties: &[Option<&Map<String, Value>>]) -> Result<DataFrame> {
    let mut keys: Vec<&str> = Vec::new();
    for map in properties.iter().flatten() {
        for key in map.keys() {
            if !keys.contains(&key.as_str()) { keys.push(key) }
        }
    }

    let columns = keys.iter()
        .map(|&key| {
            let values = properties.iter()
                .map(|map| map.and_then(|map| map.get(key)).filter(|value| !value.is_null()))
                .collect::<Vec<_>>();

            if values.iter().flatten().all(|value| value.is_number()) {
                Column::new(key.into(), values.iter().map(|value| value.and_then(Value::as_f64)).collect::<Vec<_>>())
            } else if values.iter().flatten().all(|value| value.is_boolean()) {
                Column::new(key.into(), values.iter().map(|value| value.and_then(Value::as_bool)).collect::<Vec<_>>())
            } else {
                Column::new(key.into(), values.iter()
                    .map(|value| value.map(|value| match value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    }))
                    .collect::<Vec<_>>())
            }
        })
        .collect::<Vec<_>>();

    if columns.is_empty() {
        return Ok(DataFrame::empty_with_height(properties.len()));
    }
    Ok(DataFrame::new(columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{f64_values, str_values};

    const LAYER: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": { "sector_code": "A01", "area": 12.5 },
                "geometry": { "type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 1], [0, 0]]] }
            },
            {
                "type": "Feature",
                "properties": { "sector_code": 1002, "area": null },
                "geometry": { "type": "MultiPolygon", "coordinates": [
                    [[[2, 0], [3, 0], [3, 1], [2, 0]]],
                    [[[4, 0], [6, 0], [6, 2], [4, 2]], [[4.5, 0.5], [5, 0.5], [5, 1], [4.5, 0.5]]]
                ] }
            }
        ]
    }"#;

    #[test]
    fn reads_polygons_and_properties() {
        let (df, shapes) = read_geojson_bytes(LAYER.as_bytes()).unwrap();

        assert_eq!(shapes.len(), 2);
        assert_eq!(shapes[0].0.len(), 1);
        assert_eq!(shapes[1].0.len(), 2);
        assert_eq!(shapes[1].0[1].interiors().len(), 1);
        // Unclosed rings are closed.
        assert_eq!(shapes[1].0[1].exterior().0.len(), 5);

        assert_eq!(str_values(&df, "sector_code").unwrap(), vec![Some("A01".to_string()), Some("1002".to_string())]);
        assert_eq!(f64_values(&df, "area").unwrap(), vec![Some(12.5), None]);
    }

    #[test]
    fn rejects_non_polygon_features() {
        let point = r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "properties": {}, "geometry": {"type": "Point", "coordinates": [0, 0]}}
        ]}"#;
        assert!(read_geojson_bytes(point.as_bytes()).is_err());
    }
}
