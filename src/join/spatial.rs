use anyhow::{ensure, Result};
use log::debug;
use polars::prelude::*;

use crate::{common::{set_str, str_values}, geom::PointSet, layer::PolygonLayer};

/// Copy `layer[source]` onto each row of `df` from the first polygon covering the row's point.
/// Rows outside every polygon get null. `points` must be aligned with the rows of `df`.
pub fn attach_covering(
    df: &DataFrame,
    points: &PointSet,
    layer: &PolygonLayer,
    source: &str,
    target: &str,
) -> Result<DataFrame> {
    ensure!(points.len() == df.height(),
        "[join::spatial] {} points for {} rows", points.len(), df.height());

    let values = str_values(layer.data(), source)?;
    let assigned = layer.geoms().assign(points)?;

    let column = assigned.iter()
        .map(|idx| idx.and_then(|i| values[i].clone()))
        .collect::<Vec<_>>();

    debug!("[join::spatial] {} of {} points covered by {source:?}",
        assigned.iter().filter(|idx| idx.is_some()).count(), points.len());

    let mut df = df.clone();
    set_str(&mut df, target, column)?;
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{common::str_values, geom::{Crs, Polygons}};
    use geo::{polygon, MultiPolygon, Point};

    #[test]
    fn copies_attribute_of_covering_polygon() {
        let layer = PolygonLayer::new(
            DataFrame::new(vec![Column::new("sector_code".into(), ["A", "B"])]).unwrap(),
            Polygons::new(vec![
                MultiPolygon::new(vec![polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)]]),
                MultiPolygon::new(vec![polygon![(x: 1.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 1.0), (x: 1.0, y: 1.0)]]),
            ], Crs::Wgs84),
        ).unwrap();

        let df = DataFrame::new(vec![Column::new("address_id".into(), [0u32, 1, 2])]).unwrap();
        let points = PointSet::new(
            vec![Point::new(1.5, 0.5), Point::new(0.5, 0.5), Point::new(5.0, 5.0)],
            Crs::Wgs84,
        );

        let joined = attach_covering(&df, &points, &layer, "sector_code", "sector_code").unwrap();
        assert_eq!(
            str_values(&joined, "sector_code").unwrap(),
            vec![Some("B".to_string()), Some("A".to_string()), None],
        );
    }
}
