//! Conversions between kernel API coordinates and `geo` geometries.

use geo::{Coord, LineString, MultiPolygon, Polygon};
use kernel_api::{PlanarPolygon, Ring, Vec2D};

pub fn to_line_string(points: &[Vec2D]) -> LineString<f64> {
    points
        .iter()
        .filter(|p| p.is_finite())
        .map(|p| Coord { x: p.x, y: p.y })
        .collect()
}

pub fn points_to_polygon(points: &[Vec2D]) -> Polygon<f64> {
    Polygon::new(to_line_string(points), Vec::new())
}

pub fn ring_to_polygon(ring: &Ring) -> Polygon<f64> {
    points_to_polygon(ring.points())
}

pub fn from_line_string(line: &LineString<f64>) -> Vec<Vec2D> {
    line.coords().map(|c| Vec2D::new(c.x, c.y)).collect()
}

pub fn from_polygon(polygon: &Polygon<f64>) -> PlanarPolygon {
    PlanarPolygon {
        exterior: from_line_string(polygon.exterior()),
        interiors: polygon.interiors().iter().map(from_line_string).collect(),
    }
}

pub fn from_multi_polygon(polygons: &MultiPolygon<f64>) -> Vec<PlanarPolygon> {
    polygons.0.iter().map(from_polygon).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Area;

    #[test]
    fn ring_round_trips_through_geo() {
        let ring = Ring::new(vec![
            Vec2D::new(0.0, 0.0),
            Vec2D::new(2.0, 0.0),
            Vec2D::new(2.0, 2.0),
        ])
        .unwrap();
        let polygon = ring_to_polygon(&ring);
        assert!((polygon.unsigned_area() - ring.area()).abs() < 1e-12);
        assert_eq!(from_polygon(&polygon).exterior, ring.points().to_vec());
    }

    #[test]
    fn non_finite_points_are_dropped() {
        let line = to_line_string(&[
            Vec2D::new(0.0, 0.0),
            Vec2D::new(f64::NAN, 0.0),
            Vec2D::new(1.0, 1.0),
        ]);
        assert_eq!(line.0.len(), 2);
    }
}
