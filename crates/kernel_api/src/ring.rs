//! Planar coordinates, closed rings and the tagged segment geometry.
//!
//! Coordinates are meters in a planar map projection (`x` grows east, `y`
//! grows north). Rings are stored closed: the last point repeats the first.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::units::normalize_bearing;

/// Two coincident points closer than this are treated as the same vertex.
pub const COINCIDENT_EPSILON: f64 = 1e-9;

/// 2D point or vector in planar map meters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2D {
    pub x: f64,
    pub y: f64,
}

impl Vec2D {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn length(self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn distance(self, other: Self) -> f64 {
        (other - self).length()
    }

    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y
    }

    pub fn midpoint(self, other: Self) -> Self {
        Self::new((self.x + other.x) * 0.5, (self.y + other.y) * 0.5)
    }

    /// Unit vector pointing along a compass bearing (degrees clockwise from north).
    pub fn from_bearing(bearing_deg: f64) -> Self {
        let rad = bearing_deg.to_radians();
        Self::new(rad.sin(), rad.cos())
    }

    /// Compass bearing in degrees from `self` towards `other`.
    pub fn bearing_to(self, other: Self) -> f64 {
        let d = other - self;
        normalize_bearing(d.x.atan2(d.y).to_degrees())
    }

    /// Point reached by travelling `distance` meters along `bearing_deg`.
    pub fn destination(self, bearing_deg: f64, distance: f64) -> Self {
        self + Self::from_bearing(bearing_deg) * distance
    }

    pub fn approx_eq(self, other: Self) -> bool {
        self.distance(other) <= COINCIDENT_EPSILON
    }
}

impl std::ops::Add for Vec2D {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }
}

impl std::ops::Sub for Vec2D {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }
}

impl std::ops::Mul<f64> for Vec2D {
    type Output = Self;

    fn mul(self, scale: f64) -> Self {
        Self {
            x: self.x * scale,
            y: self.y * scale,
        }
    }
}

impl From<(f64, f64)> for Vec2D {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Errors raised when a ring or line string fails validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("ring has {0} distinct vertices, at least 3 are required")]
    TooFewVertices(usize),
    #[error("line string has {0} points, at least 2 are required")]
    TooFewPoints(usize),
    #[error("vertex {index} has a non-finite coordinate ({x}, {y})")]
    NonFinite { index: usize, x: f64, y: f64 },
    #[error("edge {0} has zero length")]
    ZeroLengthEdge(usize),
    #[error("ring is not closed")]
    NotClosed,
    #[error("vertex index {index} is out of range ({len} vertices)")]
    VertexOutOfRange { index: usize, len: usize },
}

/// Iterates the usable edges of a vertex list as `(edge_index, a, b)`.
///
/// Edges touching a non-finite vertex and zero-length edges are skipped one
/// at a time; the rest of the list is still produced. With `closed` set, the
/// closing edge from the last vertex back to the first is included.
pub fn edge_pairs(vertices: &[Vec2D], closed: bool) -> impl Iterator<Item = (usize, Vec2D, Vec2D)> + '_ {
    let n = vertices.len();
    let count = match (closed, n) {
        (_, 0 | 1) => 0,
        (true, 2) => 1,
        (true, _) => n,
        (false, _) => n - 1,
    };
    (0..count).filter_map(move |i| {
        let a = vertices[i];
        let b = vertices[(i + 1) % n];
        if !a.is_finite() || !b.is_finite() || a.approx_eq(b) {
            return None;
        }
        Some((i, a, b))
    })
}

/// Shoelace area of the finite vertices of an open vertex list.
pub fn shoelace_area(vertices: &[Vec2D]) -> f64 {
    let finite: Vec<Vec2D> = vertices.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.len() < 3 {
        return 0.0;
    }
    let mut twice = 0.0;
    for i in 0..finite.len() {
        let a = finite[i];
        let b = finite[(i + 1) % finite.len()];
        twice += a.x * b.y - b.x * a.y;
    }
    (twice * 0.5).abs()
}

/// A closed polygon ring.
///
/// Deserialization is lenient so that a stored ring with one bad vertex can
/// still be loaded and rendered; every mutation goes through [`Ring::new`]
/// or [`Ring::with_vertex`], which validate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ring {
    points: Vec<Vec2D>,
}

impl Ring {
    /// Build a validated, closed ring from an open or closed vertex list.
    pub fn new(points: Vec<Vec2D>) -> Result<Self, GeometryError> {
        let mut vertices = points;
        if vertices.len() > 1 {
            let first = vertices[0];
            if vertices.last().is_some_and(|last| last.approx_eq(first)) {
                vertices.pop();
            }
        }
        check_vertices(&vertices)?;
        let first = vertices[0];
        vertices.push(first);
        Ok(Self { points: vertices })
    }

    /// Wrap already-closed points without validating them.
    pub fn from_raw(points: Vec<Vec2D>) -> Self {
        Self { points }
    }

    /// Closed point list (last point repeats the first).
    pub fn points(&self) -> &[Vec2D] {
        &self.points
    }

    /// Distinct vertices, without the closing point.
    pub fn vertices(&self) -> &[Vec2D] {
        match self.points.split_last() {
            Some((last, rest)) if !rest.is_empty() && last.approx_eq(rest[0]) => rest,
            _ => &self.points,
        }
    }

    pub fn validate(&self) -> Result<(), GeometryError> {
        let closed = self.points.len() > 1
            && self.points[0].approx_eq(self.points[self.points.len() - 1]);
        if !closed {
            return Err(GeometryError::NotClosed);
        }
        check_vertices(self.vertices())
    }

    /// Planar area in square meters.
    pub fn area(&self) -> f64 {
        shoelace_area(self.vertices())
    }

    pub fn perimeter(&self) -> f64 {
        self.edges().map(|(_, a, b)| a.distance(b)).sum()
    }

    /// Usable edges including the closing edge.
    pub fn edges(&self) -> impl Iterator<Item = (usize, Vec2D, Vec2D)> + '_ {
        edge_pairs(self.vertices(), true)
    }

    /// A copy of this ring with vertex `index` moved to `position`.
    pub fn with_vertex(&self, index: usize, position: Vec2D) -> Result<Self, GeometryError> {
        let mut vertices = self.vertices().to_vec();
        let len = vertices.len();
        let slot = vertices
            .get_mut(index)
            .ok_or(GeometryError::VertexOutOfRange { index, len })?;
        *slot = position;
        Self::new(vertices)
    }

    /// The same ring starting at vertex `start`.
    pub fn rotated(&self, start: usize) -> Self {
        let vertices = self.vertices();
        if vertices.is_empty() {
            return self.clone();
        }
        let start = start % vertices.len();
        let mut points: Vec<Vec2D> = vertices[start..]
            .iter()
            .chain(vertices[..start].iter())
            .copied()
            .collect();
        points.push(points[0]);
        Self { points }
    }
}

fn check_vertices(vertices: &[Vec2D]) -> Result<(), GeometryError> {
    for (index, v) in vertices.iter().enumerate() {
        if !v.is_finite() {
            return Err(GeometryError::NonFinite {
                index,
                x: v.x,
                y: v.y,
            });
        }
    }
    let n = vertices.len();
    if n < 3 {
        return Err(GeometryError::TooFewVertices(n));
    }
    for i in 0..n {
        if vertices[i].approx_eq(vertices[(i + 1) % n]) {
            return Err(GeometryError::ZeroLengthEdge(i));
        }
    }
    let mut distinct: Vec<Vec2D> = Vec::with_capacity(n);
    for v in vertices {
        if !distinct.iter().any(|d| d.approx_eq(*v)) {
            distinct.push(*v);
        }
    }
    if distinct.len() < 3 {
        return Err(GeometryError::TooFewVertices(distinct.len()));
    }
    Ok(())
}

/// Geometry attached to a field segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum SegmentGeometry {
    Polygon(Ring),
    LineString(Vec<Vec2D>),
}

impl SegmentGeometry {
    pub fn validate(&self) -> Result<(), GeometryError> {
        match self {
            SegmentGeometry::Polygon(ring) => ring.validate(),
            SegmentGeometry::LineString(points) => {
                if points.len() < 2 {
                    return Err(GeometryError::TooFewPoints(points.len()));
                }
                for (index, v) in points.iter().enumerate() {
                    if !v.is_finite() {
                        return Err(GeometryError::NonFinite {
                            index,
                            x: v.x,
                            y: v.y,
                        });
                    }
                }
                Ok(())
            }
        }
    }

    pub fn ring(&self) -> Option<&Ring> {
        match self {
            SegmentGeometry::Polygon(ring) => Some(ring),
            SegmentGeometry::LineString(_) => None,
        }
    }

    /// Area in square meters; line strings have none.
    pub fn area(&self) -> f64 {
        self.ring().map(Ring::area).unwrap_or(0.0)
    }
}
