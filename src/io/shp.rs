//! ESRI shapefile polygon layers.

use std::path::Path;

use anyhow::{bail, Context, Result};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use polars::prelude::*;
use shapefile::{dbase::{FieldValue, Record}, Reader, Shape};

/// Read all polygon shapes and their dBase attributes from a `.shp` file.
pub fn read_shapefile(path: &Path) -> Result<(DataFrame, Vec<MultiPolygon<f64>>)> {
    let mut reader = Reader::from_path(path)
        .with_context(|| format!("[io::shp] failed to open shapefile {}", path.display()))?;

    let mut shapes = Vec::new();
    let mut records = Vec::new();
    for (i, item) in reader.iter_shapes_and_records().enumerate() {
        let (shape, record) = item.with_context(|| format!("[io::shp] error reading shape {i} of {}", path.display()))?;
        shapes.push(match shape {
            Shape::Polygon(polygon) => shp_to_geo(&polygon),
            other => bail!("[io::shp] found non-Polygon shape in {}: {:?}", path.display(), other.shapetype()),
        });
        records.push(record);
    }

    Ok((records_to_dataframe(&records)?, shapes))
}

/// Convert a shapefile polygon to a MultiPolygon. Rings come in shapefile order:
/// each clockwise exterior is followed by its counter-clockwise holes.
pub(crate) fn shp_to_geo(polygon: &shapefile::Polygon) -> MultiPolygon<f64> {
    fn signed_area(pts: &[Coord<f64>]) -> f64 {
        pts.windows(2).map(|w| w[0].x * w[1].y - w[1].x * w[0].y).sum::<f64>() / 2.0
    }

    let mut polygons = Vec::new();
    let mut exterior: Option<LineString<f64>> = None;
    let mut holes = Vec::new();

    for ring in polygon.rings() {
        let mut coords = ring.points().iter().map(|pt| Coord { x: pt.x, y: pt.y }).collect::<Vec<_>>();
        if coords.first() != coords.last() {
            coords.push(coords[0]);
        }

        if signed_area(&coords) < 0.0 {
            if let Some(ext) = exterior.take() {
                polygons.push(Polygon::new(ext, std::mem::take(&mut holes)));
            }
            exterior = Some(LineString(coords));
        } else {
            holes.push(LineString(coords));
        }
    }
    if let Some(ext) = exterior {
        polygons.push(Polygon::new(ext, holes));
    }

    MultiPolygon(polygons)
}

/// Value of a dBase field as a number, if it is a numeric kind.
fn numeric(value: &FieldValue) -> Option<Option<f64>> {
    match value {
        FieldValue::Numeric(n) => Some(*n),
        FieldValue::Float(f) => Some(f.map(f64::from)),
        FieldValue::Integer(i) => Some(Some(f64::from(*i))),
        FieldValue::Double(d) | FieldValue::Currency(d) => Some(Some(*d)),
        _ => None,
    }
}

fn text(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Character(s) => s.as_ref().map(|s| s.trim().to_string()),
        FieldValue::Memo(s) => Some(s.trim().to_string()),
        FieldValue::Logical(b) => b.map(|b| b.to_string()),
        other => numeric(other).map_or_else(|| Some(format!("{other:?}")), |n| n.map(|n| n.to_string())),
    }
}

/// One column per dBase field (sorted by name): Float64 when every value is
/// numeric, String otherwise.
fn records_to_dataframe(records: &[Record]) -> Result<DataFrame> {
    let mut names = records.iter()
        .flat_map(|record| record.clone().into_iter().map(|(name, _)| name))
        .collect::<Vec<_>>();
    names.sort();
    names.dedup();

    let columns = names.iter()
        .map(|name| {
            let values = records.iter().map(|record| record.get(name)).collect::<Vec<_>>();
            if values.iter().flatten().all(|value| numeric(value).is_some()) {
                Column::new(name.as_str().into(), values.iter()
                    .map(|value| value.and_then(numeric).flatten())
                    .collect::<Vec<_>>())
            } else {
                Column::new(name.as_str().into(), values.iter()
                    .map(|value| value.and_then(text))
                    .collect::<Vec<_>>())
            }
        })
        .collect::<Vec<_>>();

    if columns.is_empty() {
        return Ok(DataFrame::empty_with_height(records.len()));
    }
    Ok(DataFrame::new(columns)?)
}
