use anyhow::{ensure, Result};
use geo::{Distance, Euclidean, Point};
use rstar::AABB;

/// A circular buffer around a point, in the units of the point's CRS.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Buffer {
    center: Point<f64>,
    radius: f64,
}

impl Buffer {
    pub fn new(center: Point<f64>, radius: f64) -> Result<Self> {
        ensure!(radius.is_finite() && radius > 0.0, "[geom::buffer] radius must be positive, got {radius}");
        Ok(Self { center, radius })
    }

    #[inline] pub fn center(&self) -> Point<f64> { self.center }

    #[inline] pub fn radius(&self) -> f64 { self.radius }

    /// Axis-aligned envelope of the disc, for R-tree prefiltering.
    pub(crate) fn envelope(&self) -> AABB<[f64; 2]> {
        AABB::from_corners(
            [self.center.x() - self.radius, self.center.y() - self.radius],
            [self.center.x() + self.radius, self.center.y() + self.radius],
        )
    }

    /// True if the point lies inside or on the boundary of the disc.
    #[inline]
    pub fn contains(&self, point: &Point<f64>) -> bool {
        Euclidean.distance(self.center, *point) <= self.radius
    }
}
