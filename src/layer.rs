use anyhow::{anyhow, ensure, Result};
use geo::Point;
use polars::prelude::*;

use crate::{common::set_f64, geom::{Crs, PointSet, Polygons, Projector}};

/// Attribute table plus one polygon per row (sector boundaries, land-use areas).
#[derive(Debug, Clone)]
pub struct PolygonLayer {
    data: DataFrame,
    geoms: Polygons,
}

impl PolygonLayer {
    pub fn new(data: DataFrame, geoms: Polygons) -> Result<Self> {
        ensure!(data.height() == geoms.len(),
            "[layer] attribute table has {} rows but layer has {} shapes", data.height(), geoms.len());
        Ok(Self { data, geoms })
    }

    #[inline] pub fn data(&self) -> &DataFrame { &self.data }

    #[inline] pub fn geoms(&self) -> &Polygons { &self.geoms }

    #[inline] pub fn len(&self) -> usize { self.geoms.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.geoms.is_empty() }

    /// Replace the attribute table, keeping the row count.
    pub fn with_data(self, data: DataFrame) -> Result<Self> {
        Self::new(data, self.geoms)
    }

    /// Reproject the shapes, leaving attributes untouched.
    pub fn project(&self, projector: &Projector) -> Result<Self> {
        Ok(Self { data: self.data.clone(), geoms: self.geoms.project(projector)? })
    }
}

/// Solar rooftop footprints with their attributes.
///
/// Rows are identified by `solar_id`, which is always the row position.
/// Centroids are computed in a metric CRS by [`SolarLayer::locate`] and
/// inverse-projected to WGS84 as `lat_solar`/`lon_solar`.
#[derive(Debug, Clone)]
pub struct SolarLayer {
    data: DataFrame,
    footprints: Polygons,
    centroids: Vec<Option<Point<f64>>>,
    centroids_meters: Option<PointSet>,
}

impl SolarLayer {
    pub fn new(data: DataFrame, footprints: Polygons) -> Result<Self> {
        ensure!(data.height() == footprints.len(),
            "[layer] solar table has {} rows but {} footprints", data.height(), footprints.len());
        footprints.crs().ensure_matches(&Crs::Wgs84, "solar footprints")?;

        let ids = (0..data.height() as u32).collect::<Vec<_>>();
        let mut data = data;
        data.with_column(Column::new("solar_id".into(), ids))?;

        Ok(Self { data, footprints, centroids: Vec::new(), centroids_meters: None })
    }

    #[inline] pub fn data(&self) -> &DataFrame { &self.data }

    #[inline] pub fn footprints(&self) -> &Polygons { &self.footprints }

    #[inline] pub fn len(&self) -> usize { self.footprints.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.footprints.is_empty() }

    /// WGS84 centroids, empty until located.
    #[inline] pub fn centroids(&self) -> &[Option<Point<f64>>] { &self.centroids }

    /// Projected centroids; ids are solar row positions.
    pub fn centroids_meters(&self) -> Result<&PointSet> {
        self.centroids_meters.as_ref()
            .ok_or_else(|| anyhow!("[layer] solar centroids have not been located yet"))
    }

    /// Compute centroids in the projector's metric CRS, then add `lat_solar`/`lon_solar`.
    pub fn locate(&mut self, to_metric: &Projector) -> Result<()> {
        ensure!(to_metric.target().is_metric(),
            "[layer] solar centroids must be computed in a metric CRS, got {}", to_metric.target());

        let metric = self.footprints.project(to_metric)?.centroids();
        let to_geographic = to_metric.inverse()?;

        self.centroids = metric.iter()
            .map(|centroid| centroid.map(|p| to_geographic.project_point(p)).transpose())
            .collect::<Result<Vec<_>>>()?;

        set_f64(&mut self.data, "lat_solar", self.centroids.iter().map(|p| p.map(|p| p.y())).collect())?;
        set_f64(&mut self.data, "lon_solar", self.centroids.iter().map(|p| p.map(|p| p.x())).collect())?;

        self.centroids_meters = Some(PointSet::from_optional(&metric, to_metric.target().clone()));
        Ok(())
    }
}
