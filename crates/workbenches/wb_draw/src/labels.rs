//! Distance labels, vertex markers and hints derived from geometry.
//!
//! Everything here is a pure function of vertices, the view rotation and
//! the unit preference, so hosts can memoize it by those inputs.

use kernel_api::{
    edge_pairs,
    units::{format_angle, format_area, format_distance},
    Ring, UnitSystem, Vec2D,
};
use serde::Serialize;

use crate::editor::{EditorPhase, EditorState};

pub const CLOSE_HINT: &str = "Click to close";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistanceLabel {
    /// Index of the edge's start vertex.
    pub edge: usize,
    pub anchor: Vec2D,
    pub text: String,
    /// Clockwise screen rotation of the text, in `(-90, 90]`.
    pub rotation_deg: f64,
    pub length_m: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MarkerStyle {
    Restful,
    /// Larger marker shown while the cursor is inside the closing radius.
    SnapActive,
    /// First vertex while the closing snap is active.
    Closing,
    /// Draggable handle of a segment being reshaped.
    Handle,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VertexMarker {
    pub index: usize,
    pub position: Vec2D,
    pub style: MarkerStyle,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HintLabel {
    pub anchor: Vec2D,
    pub text: String,
}

/// Rotation that lays text along an edge without turning it upside down.
pub fn readable_rotation(edge_bearing_deg: f64, view_rotation_deg: f64) -> f64 {
    let screen = edge_bearing_deg - view_rotation_deg - 90.0;
    let mut angle = (screen + 180.0).rem_euclid(360.0) - 180.0;
    if angle <= -90.0 {
        angle += 180.0;
    } else if angle > 90.0 {
        angle -= 180.0;
    }
    angle
}

fn distance_label(
    edge: usize,
    a: Vec2D,
    b: Vec2D,
    text: String,
    view_rotation_deg: f64,
) -> DistanceLabel {
    DistanceLabel {
        edge,
        anchor: a.midpoint(b),
        text,
        rotation_deg: readable_rotation(a.bearing_to(b), view_rotation_deg),
        length_m: a.distance(b),
    }
}

/// One label per usable edge. Non-finite and zero-length edges are skipped
/// individually.
pub fn edge_labels(
    vertices: &[Vec2D],
    closed: bool,
    view_rotation_deg: f64,
    units: UnitSystem,
) -> Vec<DistanceLabel> {
    edge_pairs(vertices, closed)
        .map(|(edge, a, b)| {
            let text = format_distance(a.distance(b), units);
            distance_label(edge, a, b, text, view_rotation_deg)
        })
        .collect()
}

/// Live label from the last committed vertex to the cursor, e.g.
/// `"32.8 ft · 45°"`.
pub fn preview_label(
    edge: usize,
    from: Vec2D,
    to: Vec2D,
    view_rotation_deg: f64,
    units: UnitSystem,
) -> Option<DistanceLabel> {
    if !from.is_finite() || !to.is_finite() || from.approx_eq(to) {
        return None;
    }
    let text = format!(
        "{} · {}",
        format_distance(from.distance(to), units),
        format_angle(from.bearing_to(to))
    );
    Some(distance_label(edge, from, to, text, view_rotation_deg))
}

pub fn vertex_markers(vertices: &[Vec2D], closing_snap: bool) -> Vec<VertexMarker> {
    vertices
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .map(|(index, &position)| VertexMarker {
            index,
            position,
            style: match (closing_snap, index) {
                (true, 0) => MarkerStyle::Closing,
                (true, _) => MarkerStyle::SnapActive,
                (false, _) => MarkerStyle::Restful,
            },
        })
        .collect()
}

/// Persistent annotations of a stored segment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentAnnotations {
    pub edges: Vec<DistanceLabel>,
    pub area_text: String,
    pub area_anchor: Option<Vec2D>,
}

impl SegmentAnnotations {
    pub fn for_ring(ring: &Ring, view_rotation_deg: f64, units: UnitSystem) -> Self {
        let finite: Vec<Vec2D> = ring
            .vertices()
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .collect();
        let area_anchor = (!finite.is_empty()).then(|| {
            let sum = finite.iter().fold(Vec2D::default(), |acc, v| acc + *v);
            sum * (1.0 / finite.len() as f64)
        });
        Self {
            edges: edge_labels(ring.vertices(), true, view_rotation_deg, units),
            area_text: format_area(ring.area(), units),
            area_anchor,
        }
    }
}

/// Transient overlay of the draw/edit tools.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DrawOverlay {
    pub markers: Vec<VertexMarker>,
    pub edges: Vec<DistanceLabel>,
    pub preview: Option<Vec2D>,
    pub preview_label: Option<DistanceLabel>,
    pub hint: Option<HintLabel>,
}

impl DrawOverlay {
    pub fn from_editor(editor: &EditorState, view_rotation_deg: f64, units: UnitSystem) -> Self {
        match editor.phase() {
            EditorPhase::Idle => Self::default(),
            EditorPhase::Drawing => {
                let vertices = editor.vertices();
                let closing = editor.closing_snap_active();
                let preview_label = match (vertices.last(), editor.preview()) {
                    (Some(&last), Some(cursor)) => preview_label(
                        vertices.len() - 1,
                        last,
                        cursor,
                        view_rotation_deg,
                        units,
                    ),
                    _ => None,
                };
                Self {
                    markers: vertex_markers(vertices, closing),
                    edges: edge_labels(vertices, false, view_rotation_deg, units),
                    preview: editor.preview(),
                    preview_label,
                    hint: vertices
                        .first()
                        .filter(|_| closing)
                        .map(|&anchor| HintLabel {
                            anchor,
                            text: CLOSE_HINT.to_string(),
                        }),
                }
            }
            EditorPhase::Saving => match editor.pending_ring() {
                Some(ring) => {
                    let closing = editor.closing_snap_active();
                    Self {
                        markers: vertex_markers(ring.vertices(), closing),
                        edges: edge_labels(ring.vertices(), true, view_rotation_deg, units),
                        hint: ring
                            .vertices()
                            .first()
                            .filter(|_| closing)
                            .map(|&anchor| HintLabel {
                                anchor,
                                text: CLOSE_HINT.to_string(),
                            }),
                        ..Self::default()
                    }
                }
                None => Self::default(),
            },
            EditorPhase::EditingVertices { .. } => {
                let vertices = editor.vertices();
                let mut markers = vertex_markers(vertices, false);
                for marker in &mut markers {
                    marker.style = if editor.drag_index() == Some(marker.index) {
                        MarkerStyle::SnapActive
                    } else {
                        MarkerStyle::Handle
                    };
                }
                Self {
                    markers,
                    edges: edge_labels(vertices, true, view_rotation_deg, units),
                    ..Self::default()
                }
            }
        }
    }
}
