//! Oriented module-grid packing inside a setback-inset segment.
//!
//! The grid is laid out in a local frame whose `u` axis points along
//! `azimuth + 90°` (frame width) and whose `v` axis points along the azimuth
//! (frame height). Frames are tiled over the oriented bounding box of the
//! buildable region and every module is kept only when it lies entirely
//! inside that region.

use geo::{Area, Centroid, Contains, MultiPolygon, Polygon};
use kernel_api::{
    units::normalize_bearing, Alignment, KernelError, KernelResult, LayoutRequest, ModuleRect,
    PackedLayout, Ring, Vec2D,
};
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, warn};

use crate::convert::{from_polygon, points_to_polygon, ring_to_polygon};

/// Tolerance absorbing floating point noise when counting columns and rows.
const GRID_EPSILON: f64 = 1e-9;

/// Module rectangles are shrunk by this much before the containment test so
/// that modules flush with the boundary still count as inside.
const CONTAINMENT_SLACK: f64 = 1e-6;

/// Candidate modules tested for one segment before the grid is cut short.
/// A 4 km square field of 1 m modules stays under it.
pub const MAX_MODULE_CANDIDATES: usize = 20_000_000;

/// The buildable region for a ring and setback, and whether the inset had to
/// fall back to the unmodified ring.
pub fn buildable_region(ring: &Ring, setback_m: f64) -> (Polygon<f64>, bool) {
    let original = ring_to_polygon(ring);
    if !(setback_m.is_finite() && setback_m > 0.0) {
        return (original, false);
    }

    let inset = panic::catch_unwind(AssertUnwindSafe(|| {
        geo_buf::buffer_polygon(&original, -setback_m)
    }));
    match inset {
        Ok(pieces) => match largest_piece(pieces) {
            Some(piece) => (piece, false),
            None => {
                debug!(setback_m, "setback consumes the whole segment, using original ring");
                (original, true)
            }
        },
        Err(_) => {
            warn!(setback_m, "setback inset failed, using original ring");
            (original, true)
        }
    }
}

fn largest_piece(pieces: MultiPolygon<f64>) -> Option<Polygon<f64>> {
    pieces
        .0
        .into_iter()
        .filter(|p| p.unsigned_area() > 0.0)
        .max_by(|a, b| a.unsigned_area().total_cmp(&b.unsigned_area()))
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}

/// Number of `size`-wide cells, `step` apart, that fit in `extent`.
fn cell_count(extent: f64, size: f64, step: f64) -> usize {
    if extent + GRID_EPSILON < size {
        return 0;
    }
    ((extent - size) / step + GRID_EPSILON).floor() as usize + 1
}

/// Leftover span placed before the first column.
pub fn alignment_offset(alignment: Alignment, remainder: f64) -> f64 {
    match alignment {
        Alignment::Left => 0.0,
        Alignment::Center | Alignment::Justify => remainder / 2.0,
        Alignment::Right => remainder,
    }
}

/// Local packing frame anchored at the region centroid.
struct LocalAxes {
    origin: Vec2D,
    u: Vec2D,
    v: Vec2D,
}

impl LocalAxes {
    fn new(origin: Vec2D, azimuth_deg: f64) -> Self {
        Self {
            origin,
            u: Vec2D::from_bearing(normalize_bearing(azimuth_deg + 90.0)),
            v: Vec2D::from_bearing(normalize_bearing(azimuth_deg)),
        }
    }

    fn project(&self, p: Vec2D) -> (f64, f64) {
        let d = p - self.origin;
        (d.dot(self.u), d.dot(self.v))
    }

    fn to_world(&self, u: f64, v: f64) -> Vec2D {
        self.origin + self.u * u + self.v * v
    }
}

pub fn pack(request: &LayoutRequest) -> KernelResult<PackedLayout> {
    pack_limited(request, MAX_MODULE_CANDIDATES)
}

fn pack_limited(request: &LayoutRequest, limit: usize) -> KernelResult<PackedLayout> {
    request.ring.validate()?;

    let module = request.module.oriented(request.orientation);
    if !(module.width.is_finite() && module.height.is_finite())
        || module.width <= 0.0
        || module.height <= 0.0
    {
        return Err(KernelError::InvalidInput(format!(
            "module dimensions must be positive, got {} x {}",
            module.width, module.height
        )));
    }
    if request.frame_size_up == 0 || request.frame_size_wide == 0 {
        return Err(KernelError::InvalidInput(format!(
            "frame size must be at least 1x1, got {}x{}",
            request.frame_size_up, request.frame_size_wide
        )));
    }
    if !request.azimuth_deg.is_finite() {
        return Err(KernelError::InvalidInput(format!(
            "module azimuth {} is not finite",
            request.azimuth_deg
        )));
    }

    let module_spacing = non_negative(request.module_spacing_m);
    let frame_spacing = non_negative(request.frame_spacing_m);
    let row_spacing = non_negative(request.row_spacing_m);
    let wide = request.frame_size_wide as usize;
    let up = request.frame_size_up as usize;

    let frame_w = wide as f64 * module.width + (wide - 1) as f64 * module_spacing;
    let frame_h = up as f64 * module.height + (up - 1) as f64 * module_spacing;
    let step_x = frame_w + frame_spacing;
    let step_y = frame_h + row_spacing;

    let (region, inset_fallback) = buildable_region(&request.ring, request.setback_m);
    let buildable = from_polygon(&region);

    let origin = region
        .centroid()
        .map(|c| Vec2D::new(c.x(), c.y()))
        .unwrap_or_else(|| {
            let vertices = request.ring.vertices();
            let sum = vertices.iter().fold(Vec2D::default(), |acc, v| acc + *v);
            sum * (1.0 / vertices.len().max(1) as f64)
        });
    let axes = LocalAxes::new(origin, request.azimuth_deg);

    let (mut min_u, mut max_u, mut min_v, mut max_v) = (f64::MAX, f64::MIN, f64::MAX, f64::MIN);
    for c in region.exterior().coords() {
        let (u, v) = axes.project(Vec2D::new(c.x, c.y));
        min_u = min_u.min(u);
        max_u = max_u.max(u);
        min_v = min_v.min(v);
        max_v = max_v.max(v);
    }
    if min_u > max_u || min_v > max_v {
        return Ok(PackedLayout {
            buildable,
            inset_fallback,
            ..PackedLayout::default()
        });
    }

    let extent_x = max_u - min_u;
    let extent_y = max_v - min_v;
    let columns = cell_count(extent_x, frame_w, step_x);
    let rows = cell_count(extent_y, frame_h, step_y);

    let candidates = columns
        .saturating_mul(rows)
        .saturating_mul(wide)
        .saturating_mul(up);
    let truncated = candidates > limit;
    if truncated {
        warn!(candidates, limit, "module grid too large, packing the first frames only");
    }

    let remainder = if columns == 0 {
        0.0
    } else {
        (extent_x - frame_w - (columns - 1) as f64 * step_x).max(0.0)
    };
    let start_u = min_u + alignment_offset(request.alignment, remainder);

    let per_frame = wide * up;
    let mut tested = 0usize;
    let mut modules = Vec::new();
    let mut frame_count = 0;
    'grid: for row in 0..rows {
        for column in 0..columns {
            if tested + per_frame > limit {
                break 'grid;
            }
            tested += per_frame;
            let frame = row * columns + column;
            let frame_u = start_u + column as f64 * step_x;
            let frame_v = min_v + row as f64 * step_y;
            let placed_before = modules.len();

            for j in 0..up {
                for i in 0..wide {
                    let u0 = frame_u + i as f64 * (module.width + module_spacing);
                    let v0 = frame_v + j as f64 * (module.height + module_spacing);
                    let u1 = u0 + module.width;
                    let v1 = v0 + module.height;

                    let s = CONTAINMENT_SLACK;
                    let frame_poly = points_to_polygon(&[
                        axes.to_world(u0 + s, v0 + s),
                        axes.to_world(u1 - s, v0 + s),
                        axes.to_world(u1 - s, v1 - s),
                        axes.to_world(u0 + s, v1 - s),
                        axes.to_world(u0 + s, v0 + s),
                    ]);
                    if !region.contains(&frame_poly) {
                        continue;
                    }

                    modules.push(ModuleRect {
                        frame,
                        row: j as u32,
                        column: i as u32,
                        corners: [
                            axes.to_world(u0, v0),
                            axes.to_world(u1, v0),
                            axes.to_world(u1, v1),
                            axes.to_world(u0, v1),
                        ],
                    });
                }
            }

            if modules.len() > placed_before {
                frame_count += 1;
            }
        }
    }

    debug!(
        columns,
        rows,
        modules = modules.len(),
        frame_count,
        inset_fallback,
        truncated,
        "packed module layout"
    );

    Ok(PackedLayout {
        buildable,
        modules,
        frame_count,
        inset_fallback,
        truncated,
    })
}
