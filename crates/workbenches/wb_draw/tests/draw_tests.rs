mod support;

use core_design::{
    Design, DesignCommand, FieldSegment, FixedView, KeyCode, PersistOutcome, SegmentId, Workbench,
    WorkbenchContext, WorkbenchRuntimeContext,
};
use kernel_api::{UnitSystem, Vec2D};
use support::{approx_eq, hover, key, key_up, press, release, square};
use wb_draw::{
    labels::{MarkerStyle, CLOSE_HINT},
    DrawWorkbench, EditorPhase, COMMAND_CANCEL, COMMAND_FINISH_EDITING, TOOL_DRAW, TOOL_EDIT,
    WORKBENCH_ID,
};

// 10 px at 0.1 m/px: a 1 m snap radius
const SNAP_PX: f64 = 10.0;

fn view() -> FixedView {
    FixedView::new(0.1)
}

fn creates(commands: &[DesignCommand]) -> usize {
    commands
        .iter()
        .filter(|c| matches!(c, DesignCommand::CreateSegment { .. }))
        .count()
}

#[test]
fn hovering_near_the_first_vertex_closes_once() {
    let design = Design::new("roof");
    let view = view();
    let mut ctx = WorkbenchRuntimeContext::new(&design, &view, SNAP_PX);
    let mut wb = DrawWorkbench::new();
    let tool = Some(TOOL_DRAW);

    for (x, y) in [(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)] {
        wb.on_input(&press(x, y), tool, &mut ctx);
    }
    assert_eq!(wb.editor().vertices().len(), 4);

    wb.on_input(&hover(0.6, 0.5), tool, &mut ctx);
    wb.on_input(&hover(0.3, 0.2), tool, &mut ctx);
    wb.on_input(&hover(0.1, 0.1), tool, &mut ctx);

    let commands = ctx.drain_commands();
    assert_eq!(creates(&commands), 1);
    match &commands[0] {
        DesignCommand::CreateSegment { ring } => {
            assert_eq!(ring.vertices().len(), 4);
            assert_eq!(ring.edges().count(), 4);
            assert!(approx_eq(ring.area(), 100.0, 1e-9));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(wb.editor().phase(), EditorPhase::Saving);
    assert!(wb.editor().auto_close_latched());
    assert!(wb.editor().closing_snap_active());

    let overlay = wb.overlay(0.0, UnitSystem::Imperial);
    let hint = overlay.hint.expect("closing hint");
    assert_eq!(hint.text, CLOSE_HINT);
    assert_eq!(hint.anchor, Vec2D::new(0.0, 0.0));
    assert_eq!(overlay.markers[0].style, MarkerStyle::Closing);
    assert!(overlay.markers[1..]
        .iter()
        .all(|m| m.style == MarkerStyle::SnapActive));

    wb.on_input(&hover(5.0, 5.0), tool, &mut ctx);
    assert!(!wb.editor().auto_close_latched());
    assert!(!wb.editor().closing_snap_active());
    let overlay = wb.overlay(0.0, UnitSystem::Imperial);
    assert!(overlay.hint.is_none());
    assert!(overlay
        .markers
        .iter()
        .all(|m| m.style == MarkerStyle::Restful));
}

#[test]
fn latched_snap_shows_the_hint_instead_of_closing_again() {
    let design = Design::new("roof");
    let view = view();
    let mut ctx = WorkbenchRuntimeContext::new(&design, &view, SNAP_PX);
    let mut wb = DrawWorkbench::new();
    let tool = Some(TOOL_DRAW);

    for (x, y) in [(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)] {
        wb.on_input(&press(x, y), tool, &mut ctx);
    }
    wb.on_input(&hover(0.2, 0.0), tool, &mut ctx);
    wb.on_persisted(
        &PersistOutcome::Created {
            segment: SegmentId::new(),
        },
        &mut ctx,
    );
    assert_eq!(wb.editor().phase(), EditorPhase::Idle);

    // second polygon drawn by clicks alone, cursor never leaving the radius
    for (x, y) in [(0.1, 0.1), (-10.0, 0.0), (-10.0, -10.0)] {
        wb.on_input(&press(x, y), tool, &mut ctx);
    }
    wb.on_input(&hover(0.2, 0.1), tool, &mut ctx);
    assert!(wb.editor().is_drawing());
    assert!(wb.editor().closing_snap_active());
    assert_eq!(wb.editor().preview(), Some(Vec2D::new(0.1, 0.1)));

    let overlay = wb.overlay(0.0, UnitSystem::Imperial);
    let hint = overlay.hint.expect("closing hint");
    assert_eq!(hint.text, CLOSE_HINT);
    assert_eq!(hint.anchor, Vec2D::new(0.1, 0.1));
    assert_eq!(overlay.markers[0].style, MarkerStyle::Closing);
    assert!(overlay.markers[1..]
        .iter()
        .all(|m| m.style == MarkerStyle::SnapActive));

    wb.on_input(&hover(-5.0, -2.0), tool, &mut ctx);
    assert!(!wb.editor().closing_snap_active());
    assert!(wb.on_input(&hover(0.3, 0.3), tool, &mut ctx).redraw);
    assert_eq!(creates(&ctx.drain_commands()), 2);
}

#[test]
fn saving_blocks_drawing_until_the_create_settles() {
    let design = Design::new("roof");
    let view = view();
    let mut ctx = WorkbenchRuntimeContext::new(&design, &view, SNAP_PX);
    let mut wb = DrawWorkbench::new();
    let tool = Some(TOOL_DRAW);

    for (x, y) in [(0.0, 0.0), (6.0, 0.0), (6.0, 6.0), (0.0, 0.0)] {
        wb.on_input(&press(x, y), tool, &mut ctx);
    }
    assert_eq!(wb.editor().phase(), EditorPhase::Saving);

    let saving = wb.overlay(0.0, UnitSystem::Metric);
    assert_eq!(saving.edges.len(), 3);

    wb.on_input(&press(20.0, 20.0), tool, &mut ctx);
    assert_eq!(wb.editor().phase(), EditorPhase::Saving);

    wb.on_persisted(
        &PersistOutcome::CreateFailed {
            reason: "offline".into(),
        },
        &mut ctx,
    );
    assert_eq!(wb.editor().phase(), EditorPhase::Idle);
    assert!(ctx
        .drain_logs()
        .iter()
        .any(|log| log.message.contains("offline")));

    wb.on_input(&press(20.0, 20.0), tool, &mut ctx);
    assert!(wb.editor().is_drawing());
}

#[test]
fn control_cancels_and_blocks_drawing() {
    let design = Design::new("roof");
    let view = view();
    let mut ctx = WorkbenchRuntimeContext::new(&design, &view, SNAP_PX);
    let mut wb = DrawWorkbench::new();
    let tool = Some(TOOL_DRAW);

    wb.on_input(&press(0.0, 0.0), tool, &mut ctx);
    wb.on_input(&press(5.0, 0.0), tool, &mut ctx);
    assert!(wb.on_input(&key(KeyCode::Control), tool, &mut ctx).consumed);
    assert_eq!(wb.editor().phase(), EditorPhase::Idle);

    assert!(!wb.on_input(&press(1.0, 1.0), tool, &mut ctx).consumed);
    assert_eq!(wb.editor().phase(), EditorPhase::Idle);

    wb.on_input(&key_up(KeyCode::Control), tool, &mut ctx);
    wb.on_input(&press(1.0, 1.0), tool, &mut ctx);
    assert!(wb.editor().is_drawing());
    assert!(ctx.drain_commands().is_empty());
}

#[test]
fn escape_and_backspace_edit_the_draft() {
    let design = Design::new("roof");
    let view = view();
    let mut ctx = WorkbenchRuntimeContext::new(&design, &view, SNAP_PX);
    let mut wb = DrawWorkbench::new();
    let tool = Some(TOOL_DRAW);

    for (x, y) in [(0.0, 0.0), (5.0, 0.0), (5.0, 5.0)] {
        wb.on_input(&press(x, y), tool, &mut ctx);
    }
    wb.on_input(&key(KeyCode::Backspace), tool, &mut ctx);
    assert_eq!(wb.editor().vertices().len(), 2);

    wb.on_input(&key(KeyCode::Escape), tool, &mut ctx);
    assert_eq!(wb.editor().phase(), EditorPhase::Idle);
    assert!(wb.overlay(0.0, UnitSystem::Metric).markers.is_empty());
}

#[test]
fn preview_label_follows_the_cursor() {
    let design = Design::new("roof");
    let view = view();
    let mut ctx = WorkbenchRuntimeContext::new(&design, &view, SNAP_PX);
    let mut wb = DrawWorkbench::new();
    let tool = Some(TOOL_DRAW);

    wb.on_input(&press(0.0, 0.0), tool, &mut ctx);
    wb.on_input(&hover(3.048, 0.0), tool, &mut ctx);
    let overlay = wb.overlay(0.0, UnitSystem::Imperial);
    let label = overlay.preview_label.expect("preview label");
    assert_eq!(label.text, "10.0 ft · 90°");
    assert!(approx_eq(label.rotation_deg, 0.0, 1e-9));
    assert!(overlay.hint.is_none());
}

#[test]
fn drawing_snaps_to_existing_segment_vertices() {
    let mut design = Design::new("roof");
    let neighbour = FieldSegment::from_ring(design.id(), square(10.0)).unwrap();
    design.insert(neighbour).unwrap();
    let view = view();
    let mut ctx = WorkbenchRuntimeContext::new(&design, &view, SNAP_PX);
    let mut wb = DrawWorkbench::new();

    wb.on_input(&press(10.3, 10.4), Some(TOOL_DRAW), &mut ctx);
    assert_eq!(wb.editor().vertices()[0], Vec2D::new(10.0, 10.0));
}

#[test]
fn vertex_drags_stream_shape_changes_and_done_commits() {
    let mut design = Design::new("roof");
    let segment = FieldSegment::from_ring(design.id(), square(10.0)).unwrap();
    let id = segment.id;
    design.insert(segment).unwrap();
    let view = view();
    let mut ctx = WorkbenchRuntimeContext::new(&design, &view, SNAP_PX);
    ctx.selected_segment = Some(id);
    let mut wb = DrawWorkbench::new();
    let tool = Some(TOOL_EDIT);

    assert!(wb.on_input(&press(10.2, 10.1), tool, &mut ctx).consumed);
    assert_eq!(wb.editor().phase(), EditorPhase::EditingVertices { segment: id });
    assert_eq!(wb.editor().drag_index(), Some(2));

    wb.on_input(&hover(12.0, 11.0), tool, &mut ctx);
    wb.on_input(&hover(14.0, 12.0), tool, &mut ctx);
    wb.on_input(&release(14.0, 12.0), tool, &mut ctx);

    let live = ctx.drain_commands();
    assert_eq!(live.len(), 2);
    assert!(live
        .iter()
        .all(|c| matches!(c, DesignCommand::ShapeChanged { segment, .. } if *segment == id)));

    let overlay = wb.overlay(0.0, UnitSystem::Metric);
    assert_eq!(overlay.edges.len(), 4);
    assert!(overlay.markers.iter().all(|m| m.style == MarkerStyle::Handle));

    assert!(wb.on_command(COMMAND_FINISH_EDITING, &mut ctx).consumed);
    match ctx.drain_commands().as_slice() {
        [DesignCommand::CommitGeometry { segment, ring }] => {
            assert_eq!(*segment, id);
            assert_eq!(ring.vertices()[2], Vec2D::new(14.0, 12.0));
            // (0,0) (10,0) (14,12) (0,10)
            assert!(approx_eq(ring.area(), 130.0, 1e-9));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(wb.editor().phase(), EditorPhase::Idle);
}

#[test]
fn escape_restores_the_ring_being_edited() {
    let mut design = Design::new("roof");
    let segment = FieldSegment::from_ring(design.id(), square(4.0)).unwrap();
    let id = segment.id;
    design.insert(segment).unwrap();
    let view = view();
    let mut ctx = WorkbenchRuntimeContext::new(&design, &view, SNAP_PX);
    ctx.selected_segment = Some(id);
    let mut wb = DrawWorkbench::new();
    let tool = Some(TOOL_EDIT);

    wb.on_input(&press(0.0, 0.0), tool, &mut ctx);
    wb.on_input(&hover(-2.0, -2.0), tool, &mut ctx);
    wb.on_input(&key(KeyCode::Escape), tool, &mut ctx);

    let commands = ctx.drain_commands();
    match commands.last() {
        Some(DesignCommand::ShapeChanged { ring, .. }) => assert_eq!(*ring, square(4.0)),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(wb.editor().phase(), EditorPhase::Idle);
}

#[test]
fn configure_declares_tools_and_commands() {
    let wb = DrawWorkbench::new();
    assert_eq!(wb.descriptor().id.as_str(), WORKBENCH_ID);

    let mut context = WorkbenchContext::default();
    wb.configure(&mut context);
    let tools: Vec<&str> = context.tools().iter().map(|t| t.id.as_str()).collect();
    assert_eq!(tools, vec![TOOL_DRAW, TOOL_EDIT]);
    let commands: Vec<&str> = context.commands().iter().map(|c| c.id.as_str()).collect();
    assert_eq!(commands, vec![COMMAND_FINISH_EDITING, COMMAND_CANCEL]);
}
