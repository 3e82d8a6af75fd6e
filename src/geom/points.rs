use anyhow::{ensure, Result};
use geo::{BoundingRect, Coord, MultiPoint, Point, Rect};
use rstar::{primitives::GeomWithData, RTree};

use crate::geom::{Buffer, Crs, Projector};

type IndexedPoint = GeomWithData<[f64; 2], usize>;

/// A set of points tagged with a CRS and indexed by an R-tree.
/// Every point carries an id: its row index in the owning table.
#[derive(Debug, Clone)]
pub struct PointSet {
    points: Vec<Point<f64>>,
    ids: Vec<usize>,
    crs: Crs,
    rtree: RTree<IndexedPoint>,
}

impl PointSet {
    /// Build a point set whose ids are the positions `0..points.len()`.
    pub fn new(points: Vec<Point<f64>>, crs: Crs) -> Self {
        let ids = (0..points.len()).collect();
        Self::with_ids(points, ids, crs)
    }

    /// Build a point set from optional points; ids are positions of the present ones.
    pub fn from_optional(points: &[Option<Point<f64>>], crs: Crs) -> Self {
        let (points, ids) = points.iter().enumerate()
            .filter_map(|(id, p)| p.map(|p| (p, id)))
            .unzip();
        Self::with_ids(points, ids, crs)
    }

    fn with_ids(points: Vec<Point<f64>>, ids: Vec<usize>, crs: Crs) -> Self {
        debug_assert_eq!(points.len(), ids.len());
        Self {
            rtree: RTree::bulk_load(
                points.iter().zip(&ids)
                    .map(|(p, &id)| IndexedPoint::new([p.x(), p.y()], id))
                    .collect()
            ),
            points,
            ids,
            crs,
        }
    }

    /// Get the number of points.
    #[inline] pub fn len(&self) -> usize { self.points.len() }

    /// Check if there are no points.
    #[inline] pub fn is_empty(&self) -> bool { self.points.is_empty() }

    #[inline] pub fn crs(&self) -> &Crs { &self.crs }

    #[inline] pub fn points(&self) -> &[Point<f64>] { &self.points }

    #[inline] pub fn ids(&self) -> &[usize] { &self.ids }

    /// Iterate over `(id, point)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, Point<f64>)> + '_ {
        self.ids.iter().copied().zip(self.points.iter().copied())
    }

    /// Bounding rectangle of all points.
    pub fn bounds(&self) -> Option<Rect<f64>> {
        MultiPoint::new(self.points.clone()).bounding_rect()
    }

    /// Center of the bounding rectangle, if any.
    pub fn center(&self) -> Option<Coord<f64>> {
        self.bounds().map(|rect| rect.center())
    }

    /// Keep only the points whose id satisfies `keep`, preserving ids.
    pub fn retain(&self, keep: impl Fn(usize) -> bool) -> Self {
        let (points, ids) = self.iter()
            .filter(|(id, _)| keep(*id))
            .map(|(id, p)| (p, id))
            .unzip();
        Self::with_ids(points, ids, self.crs.clone())
    }

    /// Reproject into the projector's target CRS, preserving ids.
    pub fn project(&self, projector: &Projector) -> Result<Self> {
        self.crs.ensure_matches(projector.source(), "point projection")?;
        let points = self.points.iter()
            .map(|&p| projector.project_point(p))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::with_ids(points, self.ids.clone(), projector.target().clone()))
    }

    /// Fail unless both sets share a CRS measured in meters.
    pub fn ensure_metric_with(&self, other: &PointSet, context: &str) -> Result<()> {
        self.crs.ensure_matches(&other.crs, context)?;
        ensure!(self.crs.is_metric(), "[geom::points] {context} requires a metric CRS, got {}", self.crs);
        Ok(())
    }

    /// Nearest point within `max_distance` of `query`, as `(id, distance)`.
    /// Equidistant candidates resolve to the lowest id.
    pub fn nearest_within(&self, query: Point<f64>, max_distance: f64) -> Option<(usize, f64)> {
        if !(max_distance > 0.0) { return None }

        let mut neighbors = self.rtree.nearest_neighbor_iter_with_distance_2(&[query.x(), query.y()]);
        let (first, best_d2) = neighbors.next()?;
        if best_d2 > max_distance * max_distance { return None }

        let id = neighbors
            .take_while(|(_, d2)| *d2 == best_d2)
            .map(|(candidate, _)| candidate.data)
            .fold(first.data, usize::min);

        Some((id, best_d2.sqrt()))
    }

    /// Ids of all points inside a buffer.
    pub fn within(&self, buffer: &Buffer) -> impl Iterator<Item = usize> + '_ {
        let buffer = *buffer;
        self.rtree.locate_in_envelope(&buffer.envelope())
            .filter(move |candidate| {
                let [x, y] = *candidate.geom();
                buffer.contains(&Point::new(x, y))
            })
            .map(|candidate| candidate.data)
    }
}
