use anyhow::{Context, Result};
use geo::{BoundingRect, Centroid, Coord, Intersects, MultiPolygon, Point, Rect};
use rstar::{RTree, AABB};

use crate::geom::{bbox::BoundingBox, Crs, PointSet, Projector};

/// A list of MultiPolygons tagged with a CRS and indexed by an R-tree of bounding boxes.
#[derive(Debug, Clone)]
pub struct Polygons {
    shapes: Vec<MultiPolygon<f64>>,
    rtree: RTree<BoundingBox>,
    crs: Crs,
}

impl Polygons {
    /// Construct a Polygons object from a vector of MultiPolygons.
    /// Empty shapes are kept (so indices stay aligned) but never match a query.
    pub fn new(shapes: Vec<MultiPolygon<f64>>, crs: Crs) -> Self {
        Self {
            rtree: RTree::bulk_load(
                shapes.iter().enumerate()
                    .filter_map(|(i, shape)| shape.bounding_rect().map(|rect| BoundingBox::new(i, rect)))
                    .collect()
            ),
            shapes,
            crs,
        }
    }

    /// Get the number of MultiPolygons.
    #[inline] pub fn len(&self) -> usize { self.shapes.len() }

    /// Check if there are no MultiPolygons.
    #[inline] pub fn is_empty(&self) -> bool { self.shapes.is_empty() }

    /// Get a reference to the list of MultiPolygons.
    #[inline] pub fn shapes(&self) -> &[MultiPolygon<f64>] { &self.shapes }

    #[inline] pub fn crs(&self) -> &Crs { &self.crs }

    /// Compute the bounding rectangle of all MultiPolygons.
    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.shapes.iter()
            .filter_map(|shape| shape.bounding_rect())
            .reduce(|a, b| Rect::new(
                Coord { x: a.min().x.min(b.min().x), y: a.min().y.min(b.min().y) },
                Coord { x: a.max().x.max(b.max().x), y: a.max().y.max(b.max().y) },
            ))
    }

    /// Compute the centroids of all MultiPolygons, None for empty shapes.
    pub fn centroids(&self) -> Vec<Option<Point<f64>>> {
        self.shapes.iter().map(|shape| shape.centroid()).collect()
    }

    /// Index of the first shape (in layer order) covering `point`, boundary included.
    pub fn covering(&self, point: &Point<f64>) -> Option<usize> {
        let envelope = AABB::from_point([point.x(), point.y()]);
        self.rtree.locate_in_envelope_intersecting(&envelope)
            .map(|candidate| candidate.idx())
            .filter(|&i| self.shapes[i].intersects(point))
            .min()
    }

    /// For each point, the first shape covering it. Both sides must share a CRS.
    pub fn assign(&self, points: &PointSet) -> Result<Vec<Option<usize>>> {
        self.crs.ensure_matches(points.crs(), "point-in-polygon join")?;
        Ok(points.points().iter().map(|point| self.covering(point)).collect())
    }

    /// Reproject every shape into the projector's target CRS.
    pub fn project(&self, projector: &Projector) -> Result<Self> {
        self.crs.ensure_matches(projector.source(), "polygon projection")?;
        let shapes = self.shapes.iter().enumerate()
            .map(|(i, shape)| projector.project_shape(shape)
                .with_context(|| format!("[geom::polygons] failed to reproject shape {i}")))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(shapes, projector.target().clone()))
    }
}
