//! Vertical wall and parapet quads for a flat footprint.

use glam::DVec3;
use kernel_api::{Ring, Vec2D, WallKind, WallQuad};

/// Build one wall quad per usable ring edge, plus a parapet strip stacked on
/// top when `parapet_height_m > 0`.
///
/// Heights are meters. Non-finite or negative heights count as zero; walls of
/// zero height are not emitted. Degenerate edges are skipped.
pub fn build_walls(ring: &Ring, surface_height_m: f64, parapet_height_m: f64) -> Vec<WallQuad> {
    let z = sanitize(surface_height_m);
    let para_z = sanitize(parapet_height_m);

    let mut quads = Vec::new();
    for (edge, a, b) in ring.edges() {
        if z > 0.0 {
            quads.push(quad(edge, WallKind::Wall, a, b, 0.0, z));
        }
        if para_z > 0.0 {
            quads.push(quad(edge, WallKind::Parapet, a, b, z, z + para_z));
        }
    }
    quads
}

fn sanitize(height: f64) -> f64 {
    if height.is_finite() {
        height.max(0.0)
    } else {
        0.0
    }
}

fn quad(edge: usize, kind: WallKind, a: Vec2D, b: Vec2D, bottom: f64, top: f64) -> WallQuad {
    WallQuad {
        edge,
        kind,
        corners: [
            DVec3::new(a.x, a.y, top),
            DVec3::new(b.x, b.y, top),
            DVec3::new(b.x, b.y, bottom),
            DVec3::new(a.x, a.y, bottom),
        ],
    }
}
