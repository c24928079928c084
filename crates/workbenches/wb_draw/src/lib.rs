pub mod editor;
pub mod labels;

use core_design::{
    CommandDescriptor, DesignCommand, InputResult, KeyCode, MouseButton, PersistOutcome,
    ToolDescriptor, ToolKind, Workbench, WorkbenchContext, WorkbenchDescriptor,
    WorkbenchInputEvent, WorkbenchRuntimeContext,
};
use kernel_api::{units::format_area, UnitSystem};

pub use editor::{EditorEvent, EditorPhase, EditorState, Snap};
pub use labels::{DrawOverlay, SegmentAnnotations};

pub const WORKBENCH_ID: &str = "wb.draw";
pub const TOOL_DRAW: &str = "draw.polygon";
pub const TOOL_EDIT: &str = "draw.edit-vertices";
pub const COMMAND_FINISH_EDITING: &str = "draw.finish-editing";
pub const COMMAND_CANCEL: &str = "draw.cancel";

/// Draw workbench: outlines field segments and reshapes their rings.
#[derive(Debug, Default)]
pub struct DrawWorkbench {
    editor: EditorState,
}

impl DrawWorkbench {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn editor(&self) -> &EditorState {
        &self.editor
    }

    /// Markers and labels of whatever is being drawn or edited.
    pub fn overlay(&self, view_rotation_deg: f64, units: UnitSystem) -> DrawOverlay {
        DrawOverlay::from_editor(&self.editor, view_rotation_deg, units)
    }

    fn forward(&mut self, event: Option<EditorEvent>, ctx: &mut WorkbenchRuntimeContext) {
        let Some(event) = event else {
            return;
        };
        match event {
            EditorEvent::Closed(ring) => {
                ctx.log_info(format!(
                    "Polygon closed with {} vertices ({})",
                    ring.vertices().len(),
                    format_area(ring.area(), ctx.units)
                ));
                ctx.submit(DesignCommand::CreateSegment { ring });
            }
            EditorEvent::Rejected(err) => {
                ctx.log_warn(format!("Polygon rejected: {}", err));
            }
            EditorEvent::ShapeChanged { segment, ring } => {
                ctx.submit(DesignCommand::ShapeChanged { segment, ring });
            }
            EditorEvent::Finished { segment, ring } => {
                ctx.log_info(format!("Finished editing segment {}", segment));
                ctx.submit(DesignCommand::CommitGeometry { segment, ring });
            }
        }
    }

    fn cancel(&mut self, ctx: &mut WorkbenchRuntimeContext) -> InputResult {
        match self.editor.phase() {
            EditorPhase::Drawing => {
                self.editor.cancel();
                ctx.log_info("Drawing cancelled");
                InputResult::consumed()
            }
            EditorPhase::EditingVertices { .. } => {
                let restored = self.editor.cancel();
                self.forward(restored, ctx);
                ctx.log_info("Vertex edit cancelled");
                InputResult::consumed()
            }
            EditorPhase::Idle | EditorPhase::Saving => InputResult::ignored(),
        }
    }

    fn finish_editing(&mut self, ctx: &mut WorkbenchRuntimeContext) -> InputResult {
        match self.editor.finish_editing() {
            Some(event) => {
                self.forward(Some(event), ctx);
                InputResult::consumed()
            }
            None => {
                ctx.log_warn("No vertex edit to finish");
                InputResult::ignored()
            }
        }
    }

    fn draw_input(
        &mut self,
        event: &WorkbenchInputEvent,
        ctx: &mut WorkbenchRuntimeContext,
    ) -> InputResult {
        let targets = ctx.snap_targets(None);
        let snap = Snap::new(ctx.snap_distance_m(), &targets);
        match *event {
            WorkbenchInputEvent::MousePress {
                button: MouseButton::Left,
                map_pos,
            } => {
                if self.editor.phase() == EditorPhase::Saving {
                    ctx.log_warn("Still saving the previous segment");
                    return InputResult::consumed();
                }
                let closed = self.editor.click(map_pos, &snap);
                let handled = closed.is_some() || self.editor.is_drawing();
                self.forward(closed, ctx);
                if handled {
                    InputResult::consumed()
                } else {
                    InputResult::ignored()
                }
            }
            WorkbenchInputEvent::MouseMove { map_pos } => {
                let was_drawing = self.editor.is_drawing();
                let closed = self.editor.hover(map_pos, &snap);
                self.forward(closed, ctx);
                if was_drawing {
                    InputResult::redraw_only()
                } else {
                    InputResult::ignored()
                }
            }
            _ => InputResult::ignored(),
        }
    }

    fn edit_input(
        &mut self,
        event: &WorkbenchInputEvent,
        ctx: &mut WorkbenchRuntimeContext,
    ) -> InputResult {
        if let Some(segment) = self.editor.editing_segment() {
            if ctx.design.segment(segment).is_none() {
                self.editor.abandon();
                ctx.log_warn(format!("Segment {} is gone, vertex edit dropped", segment));
            }
        }
        let editing = self.editor.editing_segment();
        let targets = ctx.snap_targets(editing.or(ctx.selected_segment));
        let snap = Snap::new(ctx.snap_distance_m(), &targets);
        match *event {
            WorkbenchInputEvent::MousePress {
                button: MouseButton::Left,
                map_pos,
            } => {
                if editing.is_none() && !self.begin_editing(ctx) {
                    return InputResult::ignored();
                }
                if self.editor.grab(map_pos, &snap) {
                    InputResult::consumed()
                } else {
                    InputResult::ignored()
                }
            }
            WorkbenchInputEvent::MouseMove { map_pos } => {
                if self.editor.drag_index().is_none() {
                    return InputResult::ignored();
                }
                let changed = self.editor.drag(map_pos, &snap);
                self.forward(changed, ctx);
                InputResult::consumed()
            }
            WorkbenchInputEvent::MouseRelease {
                button: MouseButton::Left,
                ..
            } => {
                if self.editor.release() {
                    InputResult::consumed()
                } else {
                    InputResult::ignored()
                }
            }
            _ => InputResult::ignored(),
        }
    }

    fn begin_editing(&mut self, ctx: &mut WorkbenchRuntimeContext) -> bool {
        let Some(segment) = ctx.selected_segment else {
            return false;
        };
        let design = ctx.design;
        let Some(field) = design.segment(segment) else {
            ctx.log_warn(format!("Selected segment {} is not in the design", segment));
            return false;
        };
        let Some(ring) = field.ring() else {
            ctx.log_warn(format!("Segment {} has no polygon to edit", field.name));
            return false;
        };
        if !self.editor.begin_editing(segment, ring) {
            return false;
        }
        ctx.log_info(format!("Editing vertices of {}", field.name));
        true
    }
}

impl Workbench for DrawWorkbench {
    fn descriptor(&self) -> WorkbenchDescriptor {
        WorkbenchDescriptor::new(
            WORKBENCH_ID,
            "Draw",
            "Outline field segments on the map and reshape their vertices.",
        )
    }

    fn configure(&self, context: &mut WorkbenchContext) {
        context.register_tool(ToolDescriptor::new(TOOL_DRAW, "Draw Segment", ToolKind::Draw));
        context.register_tool(ToolDescriptor::new(TOOL_EDIT, "Edit Vertices", ToolKind::Edit));
        context.register_command(CommandDescriptor::new(COMMAND_FINISH_EDITING, "Done"));
        context.register_command(CommandDescriptor::new(COMMAND_CANCEL, "Cancel"));
    }

    fn on_activate(&mut self, ctx: &mut WorkbenchRuntimeContext) {
        ctx.log_info("Draw workbench activated");
    }

    fn on_deactivate(&mut self, ctx: &mut WorkbenchRuntimeContext) {
        if self.editor.is_drawing() {
            self.editor.cancel();
        }
        ctx.log_info("Draw workbench deactivated");
    }

    fn on_input(
        &mut self,
        event: &WorkbenchInputEvent,
        active_tool: Option<&str>,
        ctx: &mut WorkbenchRuntimeContext,
    ) -> InputResult {
        match *event {
            WorkbenchInputEvent::KeyPress {
                key: KeyCode::Control,
            } => {
                if self.editor.set_modifier(true) {
                    ctx.log_info("Drawing cancelled");
                    return InputResult::consumed();
                }
                return InputResult::ignored();
            }
            WorkbenchInputEvent::KeyRelease {
                key: KeyCode::Control,
            } => {
                self.editor.set_modifier(false);
                return InputResult::ignored();
            }
            WorkbenchInputEvent::KeyPress {
                key: KeyCode::Escape,
            } => return self.cancel(ctx),
            WorkbenchInputEvent::KeyPress {
                key: KeyCode::Backspace,
            } => {
                if self.editor.undo_vertex() {
                    return InputResult::consumed();
                }
                return InputResult::ignored();
            }
            WorkbenchInputEvent::KeyPress { key: KeyCode::Enter }
                if self.editor.editing_segment().is_some() =>
            {
                return self.finish_editing(ctx);
            }
            _ => {}
        }

        match active_tool {
            Some(TOOL_DRAW) => self.draw_input(event, ctx),
            Some(TOOL_EDIT) => self.edit_input(event, ctx),
            _ => InputResult::ignored(),
        }
    }

    fn on_command(&mut self, command: &str, ctx: &mut WorkbenchRuntimeContext) -> InputResult {
        match command {
            COMMAND_FINISH_EDITING => self.finish_editing(ctx),
            COMMAND_CANCEL => self.cancel(ctx),
            _ => {
                ctx.log_warn(format!("Unknown command `{}`", command));
                InputResult::ignored()
            }
        }
    }

    fn on_persisted(&mut self, outcome: &PersistOutcome, ctx: &mut WorkbenchRuntimeContext) {
        match outcome {
            PersistOutcome::Created { segment } => {
                self.editor.settle();
                ctx.log_info(format!("Segment {} saved", segment));
            }
            PersistOutcome::CreateFailed { reason } => {
                self.editor.settle();
                ctx.log_error(format!("Failed to save segment: {}", reason));
            }
            PersistOutcome::GeometrySaved { segment } => {
                ctx.log_info(format!("Geometry of segment {} saved", segment));
            }
            PersistOutcome::GeometryFailed { segment, reason } => {
                ctx.log_error(format!(
                    "Failed to save geometry of segment {}: {}",
                    segment, reason
                ));
            }
        }
    }
}
