use ahash::AHashSet;
use anyhow::{anyhow, ensure, Result};
use geo::Point;
use polars::prelude::*;

use crate::{common::{f64_values, has_column}, geom::{Crs, PointSet}};

/// The per-address table threaded through the pipeline.
///
/// Each row is one address identified by `address_id`; its point geometry is
/// the `lon`/`lat` pair (WGS84).
#[derive(Debug, Clone)]
pub struct FeatureTable {
    data: DataFrame,
}

impl FeatureTable {
    /// Wrap an address table, assigning `address_id` from row order if absent.
    pub fn from_addresses(data: DataFrame) -> Result<Self> {
        let data = if has_column(&data, "address_id") {
            data
        } else {
            data.with_row_index("address_id".into(), None)?
        };
        Self::new(data)
    }

    /// Wrap a table that already carries `address_id`, `lat` and `lon`.
    pub fn new(data: DataFrame) -> Result<Self> {
        for name in ["address_id", "lat", "lon"] {
            ensure!(has_column(&data, name), "[table] feature table is missing column {name:?}");
        }

        let ids = data.column("address_id")?.cast(&DataType::String)?;
        let mut seen = AHashSet::new();
        for id in ids.str()?.into_iter() {
            let id = id.ok_or_else(|| anyhow!("[table] null address_id"))?;
            ensure!(seen.insert(id), "[table] duplicate address_id {id:?}");
        }

        Ok(Self { data })
    }

    #[inline] pub fn data(&self) -> &DataFrame { &self.data }

    #[inline] pub fn into_data(self) -> DataFrame { self.data }

    #[inline] pub fn height(&self) -> usize { self.data.height() }

    /// Address points in WGS84, aligned with rows.
    pub fn coordinates(&self) -> Result<PointSet> {
        let lon = f64_values(&self.data, "lon")?;
        let lat = f64_values(&self.data, "lat")?;

        let points = lon.into_iter().zip(lat).enumerate()
            .map(|(row, pair)| match pair {
                (Some(lon), Some(lat)) if (-180.0..=180.0).contains(&lon) && (-90.0..=90.0).contains(&lat) => {
                    Ok(Point::new(lon, lat))
                }
                (Some(lon), Some(lat)) => Err(anyhow!(
                    "[table] address at row {row} is not WGS84 lon/lat ({lon}, {lat}); set the address proj4"
                )),
                _ => Err(anyhow!("[table] address at row {row} has no valid lat/lon")),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(PointSet::new(points, Crs::Wgs84))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assigns_address_ids() {
        let df = DataFrame::new(vec![
            Column::new("lat".into(), [51.0, 51.1]),
            Column::new("lon".into(), [3.7, 3.8]),
        ]).unwrap();
        let table = FeatureTable::from_addresses(df).unwrap();
        assert_eq!(f64_values(table.data(), "address_id").unwrap(), vec![Some(0.0), Some(1.0)]);

        let points = table.coordinates().unwrap();
        assert_eq!(points.points()[1], Point::new(3.8, 51.1));
        assert_eq!(points.crs(), &Crs::Wgs84);
    }

    #[test]
    fn rejects_duplicate_ids_and_missing_coordinates() {
        let duplicate = DataFrame::new(vec![
            Column::new("address_id".into(), [1u32, 1]),
            Column::new("lat".into(), [51.0, 51.1]),
            Column::new("lon".into(), [3.7, 3.8]),
        ]).unwrap();
        assert!(FeatureTable::new(duplicate).is_err());

        let missing = DataFrame::new(vec![
            Column::new("address_id".into(), [1u32, 2]),
            Column::new("lat".into(), [Some(51.0), None]),
            Column::new("lon".into(), [3.7, 3.8]),
        ]).unwrap();
        assert!(FeatureTable::new(missing).unwrap().coordinates().is_err());
    }

    #[test]
    fn rejects_projected_coordinates() {
        let projected = DataFrame::new(vec![
            Column::new("lat".into(), [51.0, 5_650_000.0]),
            Column::new("lon".into(), [3.7, 500_000.0]),
        ]).unwrap();
        let err = FeatureTable::from_addresses(projected).unwrap().coordinates().unwrap_err();
        assert!(err.to_string().contains("row 1"));
    }
}
