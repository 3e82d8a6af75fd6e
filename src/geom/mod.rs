//! Geometry operations: CRS tags and reprojection, point sets with nearest and
//! radius queries, buffers, and polygon layers with point-in-polygon lookup.

mod bbox;
mod buffer;
mod crs;
mod points;
mod polygons;

pub use buffer::Buffer;
pub use crs::{Crs, Projector};
pub use points::PointSet;
pub use polygons::Polygons;
