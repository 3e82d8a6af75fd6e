use std::{fmt, sync::Arc};

use anyhow::{anyhow, ensure, Context, Result};
use geo::{Coord, MapCoords, MultiPolygon, Point};
use proj4rs::{proj::Proj as Proj4, transform::transform};

/// Coordinate reference system attached to every geometry collection.
/// Spatial predicates refuse to compare collections with different tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Crs {
    /// EPSG:4326, lon/lat degrees.
    Wgs84,
    /// WGS84 / UTM, meters. EPSG:326zz (north) or 327zz (south).
    Utm { zone: u8, south: bool },
    /// Any other source CRS, described by a PROJ.4 string.
    Proj4(Arc<str>),
}

impl Crs {
    /// Pick the UTM zone containing a lon/lat center.
    pub fn utm_for(center: Coord<f64>) -> Self {
        let zone = (((center.x + 180.0) / 6.0).floor() as i32 + 1).clamp(1, 60) as u8;
        Crs::Utm { zone, south: center.y < 0.0 }
    }

    /// Build a CRS tag from a PROJ.4 string, recognising plain WGS84 lon/lat.
    pub fn from_proj4(proj_string: &str) -> Self {
        let normalized = proj_string.split_whitespace().collect::<Vec<_>>();
        let is_longlat = normalized.iter().any(|p| *p == "+proj=longlat" || *p == "+proj=latlong");
        let is_wgs84 = normalized.iter().any(|p| *p == "+datum=WGS84" || *p == "+ellps=WGS84");
        if is_longlat && is_wgs84 { Crs::Wgs84 } else { Crs::Proj4(Arc::from(proj_string)) }
    }

    /// True if coordinates are expressed in degrees (radians in/out of PROJ).
    pub fn is_geographic(&self) -> bool {
        match self {
            Crs::Wgs84 => true,
            Crs::Utm { .. } => false,
            Crs::Proj4(s) => s.contains("+proj=longlat") || s.contains("+proj=latlong"),
        }
    }

    /// True if Euclidean distances in this CRS are meters.
    #[inline] pub fn is_metric(&self) -> bool { !self.is_geographic() }

    /// PROJ.4 definition of this CRS.
    pub fn to_proj4(&self) -> String {
        match self {
            Crs::Wgs84 => "+proj=longlat +datum=WGS84 +no_defs +type=crs".to_string(),
            Crs::Utm { zone, south } => {
                let south = if *south { " +south" } else { "" };
                format!("+proj=utm +zone={zone}{south} +datum=WGS84 +units=m +no_defs +type=crs")
            }
            Crs::Proj4(s) => s.to_string(),
        }
    }

    /// Fail unless both tags describe the same CRS.
    pub fn ensure_matches(&self, other: &Crs, context: &str) -> Result<()> {
        ensure!(self == other, "[geom::crs] CRS mismatch in {context}: {self} vs {other}");
        Ok(())
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Crs::Wgs84 => write!(f, "EPSG:4326"),
            Crs::Utm { zone, south: false } => write!(f, "EPSG:326{zone:02}"),
            Crs::Utm { zone, south: true } => write!(f, "EPSG:327{zone:02}"),
            Crs::Proj4(s) => write!(f, "{s}"),
        }
    }
}

/// A PROJ.4 transformation between two CRS tags.
pub struct Projector {
    source: Crs,
    target: Crs,
    from: Proj4,
    to: Proj4,
}

impl fmt::Debug for Projector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Projector")
            .field("source", &self.source)
            .field("target", &self.target)
            .finish()
    }
}

impl Projector {
    pub fn new(source: Crs, target: Crs) -> Result<Self> {
        let from = {
            let proj_string = source.to_proj4();
            Proj4::from_proj_string(&proj_string)
                .map_err(|e| anyhow!("{e:?}"))
                .with_context(|| format!("[geom::crs] failed to build source PROJ.4: {proj_string}"))?
        };

        let to = {
            let proj_string = target.to_proj4();
            Proj4::from_proj_string(&proj_string)
                .map_err(|e| anyhow!("{e:?}"))
                .with_context(|| format!("[geom::crs] failed to build target PROJ.4: {proj_string}"))?
        };

        Ok(Self { source, target, from, to })
    }

    #[inline] pub fn source(&self) -> &Crs { &self.source }

    #[inline] pub fn target(&self) -> &Crs { &self.target }

    /// The transformation running the other way.
    pub fn inverse(&self) -> Result<Self> {
        Self::new(self.target.clone(), self.source.clone())
    }

    /// Transform a single coordinate. Degrees are converted to and from radians as PROJ expects.
    pub fn project_coord(&self, coord: Coord<f64>) -> Result<Coord<f64>> {
        if self.source == self.target { return Ok(coord) }

        let mut point = if self.source.is_geographic() {
            (coord.x.to_radians(), coord.y.to_radians(), 0.0)
        } else {
            (coord.x, coord.y, 0.0)
        };

        transform(&self.from, &self.to, &mut point)
            .map_err(|e| anyhow!("[geom::crs] transform {} -> {} failed: {e:?}", self.source, self.target))?;

        Ok(if self.target.is_geographic() {
            Coord { x: point.0.to_degrees(), y: point.1.to_degrees() }
        } else {
            Coord { x: point.0, y: point.1 }
        })
    }

    #[inline]
    pub fn project_point(&self, point: Point<f64>) -> Result<Point<f64>> {
        self.project_coord(point.0).map(Point)
    }

    /// Transform every coordinate of a MultiPolygon.
    pub fn project_shape(&self, shape: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>> {
        shape.try_map_coords(|coord| self.project_coord(coord))
    }
}
