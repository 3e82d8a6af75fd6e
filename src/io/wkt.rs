//! Well-Known Text rendering for the geometry columns of output tables.

use std::fmt::Write;

use geo::{LineString, MultiPolygon, Point};

/// `POINT (x y)`
pub(crate) fn point_wkt(point: &Point<f64>) -> String {
    format!("POINT ({} {})", point.x(), point.y())
}

fn ring(out: &mut String, ring: &LineString<f64>) {
    out.push('(');
    for (i, coord) in ring.coords().enumerate() {
        if i > 0 { out.push_str(", ") }
        let _ = write!(out, "{} {}", coord.x, coord.y);
    }
    out.push(')');
}

/// `MULTIPOLYGON (((x y, ...), (hole ...)), ...)`, or `MULTIPOLYGON EMPTY`.
pub(crate) fn multipolygon_wkt(shape: &MultiPolygon<f64>) -> String {
    if shape.0.is_empty() {
        return "MULTIPOLYGON EMPTY".to_string();
    }

    let mut out = String::from("MULTIPOLYGON (");
    for (i, polygon) in shape.0.iter().enumerate() {
        if i > 0 { out.push_str(", ") }
        out.push('(');
        ring(&mut out, polygon.exterior());
        for hole in polygon.interiors() {
            out.push_str(", ");
            ring(&mut out, hole);
        }
        out.push(')');
    }
    out.push(')');
    out
}
