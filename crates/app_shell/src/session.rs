//! One open design: canonical segment state, the draw workbench, derived
//! layers and persistence.

use std::{collections::HashSet, time::Instant};

use core_design::{
    pipeline::{InputKey, MemoTable, RefreshStats},
    AutoSave, CommandDescriptor, Design, DesignCommand, DesignError, DesignResult,
    DimensionCache, FieldSegment, FixedView, InputResult, LayoutSummary, Module, ModuleCatalog,
    ModuleId, PersistOutcome, Pipeline, PipelineConfig, SegmentId, SegmentPatch, SegmentStore,
    ToolDescriptor, Workbench, WorkbenchContext, WorkbenchDescriptor, WorkbenchInputEvent,
    WorkbenchRuntimeContext,
};
use kernel_api::{
    units::format_area, LayoutKernel, PlanarPolygon, Ring, SegmentGeometry, UnitSystem,
};
use serde::Serialize;
use settings::DesignerSettings;
use tracing::{debug, error, info};
use wb_draw::{DrawOverlay, DrawWorkbench, SegmentAnnotations};

use crate::activity_log::ActivityLog;

/// Per-segment numbers reported by the headless shell.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentReport {
    pub id: SegmentId,
    pub name: String,
    pub area_m2: f64,
    pub area_text: String,
    pub wall_quads: usize,
    pub shadow_samples: usize,
    pub shadow_area_m2: Option<f64>,
    pub layout: Option<LayoutSummary>,
    pub inset_fallback: bool,
    pub layout_truncated: bool,
}

/// Aggregated shadow of one segment, with the fill the map draws it in.
#[derive(Debug, Clone, Serialize)]
pub struct ShadowLayer<'a> {
    pub segment: SegmentId,
    pub fill_opacity: f32,
    pub polygons: &'a [PlanarPolygon],
}

pub struct DesignSession {
    design: Design,
    store: Box<dyn SegmentStore>,
    catalog: Box<dyn ModuleCatalog>,
    modules: Vec<Module>,
    kernel: Box<dyn LayoutKernel>,
    draw: DrawWorkbench,
    tools: WorkbenchContext,
    active_tool: Option<String>,
    selected: Option<SegmentId>,
    view: FixedView,
    settings: DesignerSettings,
    autosave: AutoSave,
    pipeline: Pipeline,
    dimensions: DimensionCache,
    annotations: MemoTable<SegmentAnnotations>,
    log: ActivityLog,
}

impl DesignSession {
    /// Open `design`, taking its segments from `store` when the store has
    /// any for it.
    pub fn open(
        mut design: Design,
        store: Box<dyn SegmentStore>,
        catalog: Box<dyn ModuleCatalog>,
        kernel: Box<dyn LayoutKernel>,
        settings: DesignerSettings,
    ) -> DesignResult<Self> {
        let stored = store.list_by_design(design.id())?;
        if !stored.is_empty() {
            design.replace_all(stored);
        }
        let modules = catalog.list()?;

        let draw = DrawWorkbench::new();
        let mut tools = WorkbenchContext::default();
        draw.configure(&mut tools);

        let mut session = Self {
            design,
            store,
            catalog,
            modules,
            kernel,
            draw,
            tools,
            active_tool: None,
            selected: None,
            view: FixedView::default(),
            autosave: AutoSave::new(settings.autosave.quiet_period()),
            settings,
            pipeline: Pipeline::new(),
            dimensions: DimensionCache::new(),
            annotations: MemoTable::default(),
            log: ActivityLog::default(),
        };
        session.dispatch(|wb, ctx| {
            wb.on_activate(ctx);
            InputResult::ignored()
        });
        session.log.info(format!(
            "Opened design `{}` with {} segments (kernel: {})",
            session.design.name(),
            session.design.segments().len(),
            session.kernel.name()
        ));
        session.refresh();
        Ok(session)
    }

    pub fn design(&self) -> &Design {
        &self.design
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn activity(&self) -> &ActivityLog {
        &self.log
    }

    pub fn settings(&self) -> &DesignerSettings {
        &self.settings
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    pub fn tools(&self) -> &[ToolDescriptor] {
        self.tools.tools()
    }

    pub fn commands(&self) -> &[CommandDescriptor] {
        self.tools.commands()
    }

    pub fn active_tool(&self) -> Option<&str> {
        self.active_tool.as_deref()
    }

    pub fn selected(&self) -> Option<SegmentId> {
        self.selected
    }

    pub fn workbench(&self) -> WorkbenchDescriptor {
        self.draw.descriptor()
    }

    pub fn draw_workbench(&self) -> &DrawWorkbench {
        &self.draw
    }

    pub fn set_active_tool(&mut self, tool: Option<&str>) -> DesignResult<()> {
        if let Some(id) = tool {
            if !self.tools.tools().iter().any(|t| t.id == id) {
                return Err(DesignError::InvalidAttribute {
                    field: "tool",
                    reason: format!("unknown tool `{}`", id),
                });
            }
        }
        self.active_tool = tool.map(str::to_owned);
        Ok(())
    }

    pub fn select(&mut self, segment: Option<SegmentId>) {
        self.selected = segment.filter(|id| self.design.segment(*id).is_some());
    }

    /// Track the map's zoom and rotation.
    pub fn set_view(&mut self, meters_per_pixel: f64, rotation_deg: f64) {
        self.view = FixedView {
            meters_per_pixel,
            rotation_deg,
        };
        self.refresh_annotations();
    }

    pub fn set_units(&mut self, units: UnitSystem) {
        self.settings.units = units;
        self.refresh_annotations();
    }

    pub fn handle_input(&mut self, event: &WorkbenchInputEvent) -> InputResult {
        let tool = self.active_tool.clone();
        self.dispatch(|wb, ctx| wb.on_input(event, tool.as_deref(), ctx))
    }

    pub fn run_command(&mut self, command: &str) -> InputResult {
        self.dispatch(|wb, ctx| wb.on_command(command, ctx))
    }

    /// Run one workbench hook, then apply whatever it queued.
    fn dispatch(
        &mut self,
        hook: impl FnOnce(&mut DrawWorkbench, &mut WorkbenchRuntimeContext) -> InputResult,
    ) -> InputResult {
        let (result, logs, commands) = {
            let mut ctx = WorkbenchRuntimeContext::new(
                &self.design,
                &self.view,
                self.settings.drawing.snap_px,
            );
            ctx.selected_segment = self.selected;
            ctx.units = self.settings.units;
            let result = hook(&mut self.draw, &mut ctx);
            (result, ctx.drain_logs(), ctx.drain_commands())
        };
        self.log.extend(logs);

        let mutated = !commands.is_empty();
        for command in commands {
            if let Some(outcome) = self.apply(command) {
                self.notify(&outcome);
            }
        }
        if mutated {
            self.refresh();
        }
        result
    }

    /// Report a persistence outcome back to the workbench.
    fn notify(&mut self, outcome: &PersistOutcome) {
        let logs = {
            let mut ctx = WorkbenchRuntimeContext::new(
                &self.design,
                &self.view,
                self.settings.drawing.snap_px,
            );
            ctx.selected_segment = self.selected;
            ctx.units = self.settings.units;
            self.draw.on_persisted(outcome, &mut ctx);
            ctx.drain_logs()
        };
        self.log.extend(logs);
    }

    fn apply(&mut self, command: DesignCommand) -> Option<PersistOutcome> {
        match command {
            DesignCommand::CreateSegment { ring } => Some(self.create_segment(ring)),
            DesignCommand::ShapeChanged { segment, ring } => {
                if let Err(err) = self.design.set_ring(segment, ring) {
                    self.log
                        .warn(format!("Shape change of segment {} ignored: {}", segment, err));
                }
                None
            }
            DesignCommand::CommitGeometry { segment, ring } => {
                let outcome = match self.commit_geometry(segment, ring) {
                    Ok(()) => PersistOutcome::GeometrySaved { segment },
                    Err(err) => {
                        error!("saving geometry of segment {} failed: {}", segment, err);
                        PersistOutcome::GeometryFailed {
                            segment,
                            reason: err.to_string(),
                        }
                    }
                };
                Some(outcome)
            }
        }
    }

    /// Insert optimistically, then persist; a failed create is rolled back.
    fn create_segment(&mut self, ring: Ring) -> PersistOutcome {
        let mut segment = match FieldSegment::from_ring(self.design.id(), ring) {
            Ok(segment) => segment,
            Err(err) => {
                return PersistOutcome::CreateFailed {
                    reason: err.to_string(),
                }
            }
        };
        segment.name = format!("Segment {}", self.design.segments().len() + 1);
        let id = segment.id;
        if let Err(err) = self.design.insert(segment.clone()) {
            return PersistOutcome::CreateFailed {
                reason: err.to_string(),
            };
        }

        match self.store.create(&segment) {
            Ok(_) => {
                self.selected = Some(id);
                PersistOutcome::Created { segment: id }
            }
            Err(err) => {
                error!("creating segment {} failed: {}", id, err);
                if self.design.remove(id).is_ok() {
                    debug!("rolled back segment {}", id);
                }
                PersistOutcome::CreateFailed {
                    reason: err.to_string(),
                }
            }
        }
    }

    fn commit_geometry(&mut self, segment: SegmentId, ring: Ring) -> DesignResult<()> {
        self.design.set_ring(segment, ring.clone())?;
        let patch = SegmentPatch::geometry(SegmentGeometry::Polygon(ring));
        self.store.update_partial(segment, &patch)?;
        Ok(())
    }

    /// Apply an attribute edit now; the store sees it after the quiet period.
    pub fn edit_attributes(
        &mut self,
        segment: SegmentId,
        patch: SegmentPatch,
        now: Instant,
    ) -> DesignResult<()> {
        self.design.apply_patch(segment, &patch)?;
        self.autosave.record(segment, patch, now);
        self.refresh();
        Ok(())
    }

    /// Write every debounced edit that is due. Returns how many were written.
    pub fn tick(&mut self, now: Instant) -> usize {
        let due = self.autosave.due(now);
        self.write_patches(due)
    }

    /// Write every pending edit regardless of timing.
    pub fn flush(&mut self) -> usize {
        let pending = self.autosave.flush_all();
        self.write_patches(pending)
    }

    pub fn has_unsaved_edits(&self) -> bool {
        self.autosave.pending_count() > 0
    }

    fn write_patches(&mut self, patches: Vec<(SegmentId, SegmentPatch)>) -> usize {
        let mut written = 0;
        for (id, patch) in patches {
            match self.store.update_partial(id, &patch) {
                Ok(()) => written += 1,
                Err(err) => self
                    .log
                    .error(format!("Auto-save of segment {} failed: {}", id, err)),
            }
        }
        written
    }

    /// Delete a segment and everything derived from it. A failed store
    /// delete puts the segment back where it was.
    pub fn delete_segment(&mut self, id: SegmentId) -> DesignResult<()> {
        let (index, segment) = self.design.remove(id)?;
        let pending = self.autosave.cancel(id);
        if let Err(err) = self.store.delete(id) {
            self.log
                .error(format!("Deleting segment {} failed: {}", segment.name, err));
            self.design.restore(index, segment);
            if let Some(patch) = pending {
                self.autosave.record(id, patch, Instant::now());
            }
            return Err(err.into());
        }

        let dropped = self.pipeline.remove(id) + usize::from(self.annotations.remove(id).is_some());
        if self.selected == Some(id) {
            self.selected = None;
        }
        info!("deleted segment {} ({} derived layers)", id, dropped);
        Ok(())
    }

    /// Remove a module from the catalog, restoring it locally on failure.
    pub fn delete_module(&mut self, id: ModuleId) -> DesignResult<Module> {
        let index = self
            .modules
            .iter()
            .position(|m| m.id == id)
            .ok_or(core_design::StoreError::ModuleNotFound(id))?;
        let removed = self.modules.remove(index);
        match self.catalog.delete(id) {
            Ok(_) => {
                self.log
                    .info(format!("Deleted module {} {}", removed.manufacturer, removed.model));
                Ok(removed)
            }
            Err(err) => {
                self.log.error(format!(
                    "Deleting module {} failed: {}",
                    removed.model, err
                ));
                self.modules.insert(index, removed);
                Err(err.into())
            }
        }
    }

    /// Bring walls, shadows, layouts and labels in line with the design.
    pub fn refresh(&mut self) -> RefreshStats {
        let config = PipelineConfig {
            site: self.design.site,
            resolution: self.settings.shadows.resolution(),
            shadows: self.settings.shadows.enabled,
        };
        let stats = self.pipeline.refresh(
            &self.design,
            &config,
            self.kernel.as_ref(),
            self.catalog.as_ref(),
            &mut self.dimensions,
        );
        self.refresh_annotations();
        stats
    }

    fn refresh_annotations(&mut self) {
        let rotation = self.view.rotation_deg;
        let units = self.settings.units;
        let mut live = HashSet::new();
        for segment in self.design.segments() {
            let Some(ring) = segment.ring() else {
                continue;
            };
            live.insert(segment.id);
            let key = InputKey::new("labels")
                .ring(ring)
                .f64(rotation)
                .u64(units as u64)
                .finish();
            self.annotations.get_or_compute(segment.id, key, || {
                SegmentAnnotations::for_ring(ring, rotation, units)
            });
        }
        self.annotations.retain(&live);
    }

    pub fn annotations(&self, id: SegmentId) -> Option<&SegmentAnnotations> {
        self.annotations.get(id)
    }

    /// Number of derived layers held for a segment, labels included.
    pub fn artifact_count(&self, id: SegmentId) -> usize {
        self.pipeline.artifact_count(id) + usize::from(self.annotations.contains(id))
    }

    pub fn overlay(&self) -> DrawOverlay {
        self.draw.overlay(self.view.rotation_deg, self.settings.units)
    }

    pub fn shadow_layers(&self) -> Vec<ShadowLayer<'_>> {
        let fill_opacity = self.settings.shadows.fill_opacity.clamp(0.0, 1.0);
        self.design
            .segments()
            .iter()
            .filter_map(|segment| {
                let interval = self.pipeline.shadows(segment.id)?;
                Some(ShadowLayer {
                    segment: segment.id,
                    fill_opacity,
                    polygons: &interval.aggregate,
                })
            })
            .collect()
    }

    pub fn reports(&self) -> Vec<SegmentReport> {
        self.design
            .segments()
            .iter()
            .map(|segment| {
                let shadows = self.pipeline.shadows(segment.id);
                let layout = self.pipeline.layout(segment.id);
                SegmentReport {
                    id: segment.id,
                    name: segment.name.clone(),
                    area_m2: segment.area,
                    area_text: format_area(segment.area, self.settings.units),
                    wall_quads: self.pipeline.walls(segment.id).map_or(0, <[_]>::len),
                    shadow_samples: shadows.map_or(0, |s| s.samples.len()),
                    shadow_area_m2: shadows.map(|s| s.aggregate_area()),
                    layout: layout.map(|l| l.summary),
                    inset_fallback: layout.is_some_and(|l| l.packed.inset_fallback),
                    layout_truncated: layout.is_some_and(|l| l.packed.truncated),
                }
            })
            .collect()
    }
}

impl Drop for DesignSession {
    fn drop(&mut self) {
        if self.has_unsaved_edits() {
            let written = self.flush();
            info!("flushed {} pending edits on close", written);
        }
    }
}
