//! Thin wrappers over the `geo` algorithms the pipeline needs.
//!
//! The join and aggregation stages only ever call through this module
//! (area, overlap, containment, centroid, envelope), so the rest of the
//! crate does not depend on any one library's API shape.

use geo::{
    Area, BooleanOps, BoundingRect, Centroid, Contains, Coord, MultiPolygon, Point, Polygon,
    Validation,
};
use rstar::AABB;

/// Planar area in the square unit of the normalized CRS (m² in Web Mercator).
pub fn planar_area(geometry: &MultiPolygon<f64>) -> f64 {
    geometry.unsigned_area()
}

/// Area of the geometric intersection of two polygons.
pub fn overlap_area(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> f64 {
    a.intersection(b).unsigned_area()
}

pub fn contains_point(geometry: &MultiPolygon<f64>, point: Point<f64>) -> bool {
    geometry.contains(&point)
}

pub fn polygon_contains_point(polygon: &Polygon<f64>, point: Point<f64>) -> bool {
    polygon.contains(&point)
}

/// Centroid of a geometry; `None` for empty geometries.
pub fn centroid(geometry: &MultiPolygon<f64>) -> Option<Point<f64>> {
    geometry.centroid()
}

/// Axis-aligned bounding box in the envelope type the R-tree expects.
/// Empty geometries collapse to a degenerate box at the origin.
pub fn envelope(geometry: &MultiPolygon<f64>) -> AABB<[f64; 2]> {
    match geometry.bounding_rect() {
        Some(rect) => AABB::from_corners(
            [rect.min().x, rect.min().y],
            [rect.max().x, rect.max().y],
        ),
        None => AABB::from_point([0.0, 0.0]),
    }
}

/// OGC validity check (ring orientation, self-intersection, nesting).
/// Invalid geometries cannot be overlapped reliably, so the loader rejects
/// them up front instead of letting the join stage misbehave.
pub fn is_valid(geometry: &MultiPolygon<f64>) -> bool {
    geometry.is_valid()
}

/// A regular polygon approximating a circle, for station buffers.
/// 64 segments keeps the area error below 0.2%.
pub fn circle(center: Coord<f64>, radius: f64, segments: usize) -> Polygon<f64> {
    let mut ring = Vec::with_capacity(segments + 1);
    for i in 0..segments {
        let theta = 2.0 * std::f64::consts::PI * (i as f64) / (segments as f64);
        ring.push(Coord {
            x: center.x + radius * theta.cos(),
            y: center.y + radius * theta.sin(),
        });
    }
    ring.push(ring[0]);
    Polygon::new(geo::LineString::new(ring), vec![])
}
