//! Polygon draw and vertex-edit state machine.
//!
//! `Idle -> Drawing -> Saving -> Idle` for new segments, and
//! `Idle -> EditingVertices -> Idle` for reshaping an existing one. The
//! state is plain data; the workbench feeds it snapped map positions and
//! forwards the [`EditorEvent`]s it returns to the host.

use core_design::SegmentId;
use kernel_api::{GeometryError, Ring, Vec2D};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditorPhase {
    #[default]
    Idle,
    Drawing,
    /// A closed polygon is being created by the host.
    Saving,
    EditingVertices {
        segment: SegmentId,
    },
}

/// Snap radius and magnetic targets for one input event.
#[derive(Debug, Clone, Copy)]
pub struct Snap<'a> {
    pub distance_m: f64,
    pub targets: &'a [Vec2D],
}

impl<'a> Snap<'a> {
    pub fn new(distance_m: f64, targets: &'a [Vec2D]) -> Self {
        Self {
            distance_m,
            targets,
        }
    }

    pub fn within(&self, a: Vec2D, b: Vec2D) -> bool {
        self.distance_m > 0.0 && a.distance(b) <= self.distance_m
    }

    /// `p` moved onto the nearest target inside the snap radius, if any.
    pub fn magnetize(&self, p: Vec2D) -> Vec2D {
        self.targets
            .iter()
            .copied()
            .filter(|t| t.is_finite() && self.within(p, *t))
            .min_by(|a, b| a.distance(p).total_cmp(&b.distance(p)))
            .unwrap_or(p)
    }
}

/// Something the host has to act on.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    /// The drawn polygon was closed.
    Closed(Ring),
    /// Closing or finishing produced an invalid ring.
    Rejected(GeometryError),
    ShapeChanged { segment: SegmentId, ring: Ring },
    Finished { segment: SegmentId, ring: Ring },
}

#[derive(Debug, Clone, Default)]
pub struct EditorState {
    phase: EditorPhase,
    /// Committed vertices while drawing, the live ring while editing.
    vertices: Vec<Vec2D>,
    preview: Option<Vec2D>,
    closing_snap: bool,
    /// First vertex of the last auto-closed polygon; cleared once the cursor
    /// leaves its snap radius.
    auto_close_latch: Option<Vec2D>,
    modifier_held: bool,
    drag_index: Option<usize>,
    original: Option<Ring>,
    pending: Option<Ring>,
}

impl EditorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> EditorPhase {
        self.phase
    }

    pub fn is_drawing(&self) -> bool {
        self.phase == EditorPhase::Drawing
    }

    pub fn vertices(&self) -> &[Vec2D] {
        &self.vertices
    }

    pub fn preview(&self) -> Option<Vec2D> {
        self.preview
    }

    pub fn closing_snap_active(&self) -> bool {
        self.closing_snap
    }

    pub fn auto_close_latched(&self) -> bool {
        self.auto_close_latch.is_some()
    }

    pub fn modifier_held(&self) -> bool {
        self.modifier_held
    }

    pub fn drag_index(&self) -> Option<usize> {
        self.drag_index
    }

    /// Ring handed to the host and not yet confirmed.
    pub fn pending_ring(&self) -> Option<&Ring> {
        self.pending.as_ref()
    }

    pub fn editing_segment(&self) -> Option<SegmentId> {
        match self.phase {
            EditorPhase::EditingVertices { segment } => Some(segment),
            _ => None,
        }
    }

    fn near_first(&self, p: Vec2D, snap: &Snap) -> bool {
        self.vertices.len() >= 3 && snap.within(p, self.vertices[0])
    }

    fn reset(&mut self) {
        self.phase = EditorPhase::Idle;
        self.vertices.clear();
        self.preview = None;
        self.closing_snap = false;
        self.drag_index = None;
        self.original = None;
    }

    /// Close on vertex 0. The closing highlight stays on the pending ring
    /// until the cursor leaves the snap radius.
    fn close(&mut self) -> EditorEvent {
        self.auto_close_latch = self.vertices.first().copied();
        let vertices = std::mem::take(&mut self.vertices);
        self.reset();
        match Ring::new(vertices) {
            Ok(ring) => {
                self.phase = EditorPhase::Saving;
                self.closing_snap = true;
                self.pending = Some(ring.clone());
                EditorEvent::Closed(ring)
            }
            Err(err) => EditorEvent::Rejected(err),
        }
    }

    /// Pointer click while the draw tool is active.
    pub fn click(&mut self, p: Vec2D, snap: &Snap) -> Option<EditorEvent> {
        if !p.is_finite() {
            return None;
        }
        match self.phase {
            EditorPhase::Idle => {
                if self.modifier_held {
                    return None;
                }
                self.phase = EditorPhase::Drawing;
                self.vertices = vec![snap.magnetize(p)];
                self.preview = None;
                None
            }
            EditorPhase::Drawing => {
                if self.near_first(p, snap) {
                    return Some(self.close());
                }
                let vertex = snap.magnetize(p);
                if self.vertices.last().is_some_and(|last| last.approx_eq(vertex)) {
                    return None;
                }
                self.vertices.push(vertex);
                None
            }
            EditorPhase::Saving | EditorPhase::EditingVertices { .. } => None,
        }
    }

    /// Pointer movement while the draw tool is active.
    pub fn hover(&mut self, p: Vec2D, snap: &Snap) -> Option<EditorEvent> {
        if !p.is_finite() {
            return None;
        }
        if let Some(anchor) = self.auto_close_latch {
            if !snap.within(p, anchor) {
                self.auto_close_latch = None;
                self.closing_snap = false;
            }
        }
        if self.phase != EditorPhase::Drawing {
            return None;
        }
        if self.near_first(p, snap) {
            self.closing_snap = true;
            self.preview = Some(self.vertices[0]);
            if self.auto_close_latch.is_none() {
                return Some(self.close());
            }
            return None;
        }
        self.closing_snap = false;
        self.preview = Some(snap.magnetize(p));
        None
    }

    /// Track the draw-blocking modifier. Returns true if a draw was cancelled.
    pub fn set_modifier(&mut self, held: bool) -> bool {
        self.modifier_held = held;
        if held && self.phase == EditorPhase::Drawing {
            self.reset();
            return true;
        }
        false
    }

    /// Drop the last committed vertex; an empty draw returns to idle.
    pub fn undo_vertex(&mut self) -> bool {
        if self.phase != EditorPhase::Drawing {
            return false;
        }
        self.vertices.pop();
        self.closing_snap = false;
        if self.vertices.is_empty() {
            self.reset();
        }
        true
    }

    /// Abort the draw or vertex edit in progress. Aborting an edit restores
    /// the ring it started from.
    pub fn cancel(&mut self) -> Option<EditorEvent> {
        match self.phase {
            EditorPhase::Drawing => {
                self.reset();
                None
            }
            EditorPhase::EditingVertices { segment } => {
                let original = self.original.take();
                self.reset();
                original.map(|ring| EditorEvent::ShapeChanged { segment, ring })
            }
            EditorPhase::Idle | EditorPhase::Saving => None,
        }
    }

    /// Leave vertex editing without restoring anything, e.g. after the
    /// segment disappeared.
    pub fn abandon(&mut self) {
        if matches!(self.phase, EditorPhase::EditingVertices { .. }) {
            self.reset();
        }
    }

    /// The host finished creating the pending segment, successfully or not.
    pub fn settle(&mut self) -> bool {
        if self.phase != EditorPhase::Saving {
            return false;
        }
        self.phase = EditorPhase::Idle;
        self.pending = None;
        self.closing_snap = false;
        true
    }

    pub fn begin_editing(&mut self, segment: SegmentId, ring: &Ring) -> bool {
        if self.phase != EditorPhase::Idle {
            return false;
        }
        self.phase = EditorPhase::EditingVertices { segment };
        self.vertices = ring.vertices().to_vec();
        self.original = Some(ring.clone());
        true
    }

    /// Pick up the handle nearest to `p` within the snap radius.
    pub fn grab(&mut self, p: Vec2D, snap: &Snap) -> bool {
        if self.editing_segment().is_none() || !p.is_finite() {
            return false;
        }
        self.drag_index = self
            .vertices
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_finite() && snap.within(p, **v))
            .min_by(|(_, a), (_, b)| a.distance(p).total_cmp(&b.distance(p)))
            .map(|(index, _)| index);
        self.drag_index.is_some()
    }

    /// Move the grabbed handle. Positions that would break the ring are
    /// ignored and the handle stays where it was.
    pub fn drag(&mut self, p: Vec2D, snap: &Snap) -> Option<EditorEvent> {
        let segment = self.editing_segment()?;
        let index = self.drag_index?;
        if !p.is_finite() {
            return None;
        }
        let target = snap.magnetize(p);
        let mut candidate = self.vertices.clone();
        *candidate.get_mut(index)? = target;
        let ring = Ring::new(candidate).ok()?;
        self.vertices[index] = target;
        Some(EditorEvent::ShapeChanged { segment, ring })
    }

    pub fn release(&mut self) -> bool {
        self.drag_index.take().is_some()
    }

    /// Explicit "done": hand the edited ring over for persistence.
    pub fn finish_editing(&mut self) -> Option<EditorEvent> {
        let segment = self.editing_segment()?;
        match Ring::new(self.vertices.clone()) {
            Ok(ring) => {
                self.reset();
                Some(EditorEvent::Finished { segment, ring })
            }
            Err(err) => Some(EditorEvent::Rejected(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_TARGETS: &[Vec2D] = &[];

    fn snap() -> Snap<'static> {
        Snap::new(1.0, NO_TARGETS)
    }

    fn draw_triangle(editor: &mut EditorState) {
        for (x, y) in [(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)] {
            assert!(editor.click(Vec2D::new(x, y), &snap()).is_none());
        }
    }

    #[test]
    fn clicking_near_first_vertex_closes() {
        let mut editor = EditorState::new();
        draw_triangle(&mut editor);
        let event = editor.click(Vec2D::new(0.5, 0.2), &snap());
        match event {
            Some(EditorEvent::Closed(ring)) => assert_eq!(ring.vertices().len(), 3),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(editor.phase(), EditorPhase::Saving);
        assert!(editor.vertices().is_empty());
        assert!(editor.closing_snap_active());

        editor.hover(Vec2D::new(0.4, 0.4), &snap());
        assert!(editor.closing_snap_active());
        assert!(editor.settle());
        assert!(!editor.closing_snap_active());
    }

    #[test]
    fn saving_blocks_new_draws_until_settled() {
        let mut editor = EditorState::new();
        draw_triangle(&mut editor);
        editor.click(Vec2D::new(0.0, 0.0), &snap());
        assert!(editor.click(Vec2D::new(50.0, 50.0), &snap()).is_none());
        assert_eq!(editor.phase(), EditorPhase::Saving);

        assert!(editor.settle());
        assert!(editor.pending_ring().is_none());
        editor.click(Vec2D::new(50.0, 50.0), &snap());
        assert!(editor.is_drawing());
    }

    #[test]
    fn modifier_cancels_and_blocks_drawing() {
        let mut editor = EditorState::new();
        editor.click(Vec2D::new(0.0, 0.0), &snap());
        assert!(editor.set_modifier(true));
        assert_eq!(editor.phase(), EditorPhase::Idle);

        editor.click(Vec2D::new(5.0, 5.0), &snap());
        assert_eq!(editor.phase(), EditorPhase::Idle);

        assert!(!editor.set_modifier(false));
        editor.click(Vec2D::new(5.0, 5.0), &snap());
        assert!(editor.is_drawing());
    }

    #[test]
    fn magnetic_targets_pull_vertices() {
        let targets = [Vec2D::new(20.0, 20.0)];
        let snap = Snap::new(1.0, &targets);
        let mut editor = EditorState::new();
        editor.click(Vec2D::new(0.0, 0.0), &snap);
        editor.click(Vec2D::new(20.4, 19.7), &snap);
        assert_eq!(editor.vertices()[1], Vec2D::new(20.0, 20.0));

        editor.hover(Vec2D::new(30.0, 0.0), &snap);
        assert_eq!(editor.preview(), Some(Vec2D::new(30.0, 0.0)));
    }

    #[test]
    fn undo_and_cancel() {
        let mut editor = EditorState::new();
        draw_triangle(&mut editor);
        assert!(editor.undo_vertex());
        assert_eq!(editor.vertices().len(), 2);
        assert!(editor.cancel().is_none());
        assert_eq!(editor.phase(), EditorPhase::Idle);
        assert!(!editor.undo_vertex());
    }

    #[test]
    fn dragging_rejects_degenerate_positions() {
        let ring = Ring::new(vec![
            Vec2D::new(0.0, 0.0),
            Vec2D::new(4.0, 0.0),
            Vec2D::new(4.0, 4.0),
        ])
        .unwrap();
        let segment = SegmentId::new();
        let mut editor = EditorState::new();
        assert!(editor.begin_editing(segment, &ring));
        assert!(editor.grab(Vec2D::new(4.2, 4.1), &snap()));
        assert_eq!(editor.drag_index(), Some(2));

        // onto its neighbour: zero-length edge
        assert!(editor.drag(Vec2D::new(4.0, 0.0), &snap()).is_none());
        assert_eq!(editor.vertices()[2], Vec2D::new(4.0, 4.0));

        assert!(editor.drag(Vec2D::new(6.0, 6.0), &snap()).is_some());
        assert!(editor.release());
        match editor.cancel() {
            Some(EditorEvent::ShapeChanged { ring: restored, .. }) => assert_eq!(restored, ring),
            other => panic!("unexpected {other:?}"),
        }
    }
}
