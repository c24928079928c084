pub mod autosave;
pub mod module;
pub mod pipeline;
pub mod runtime;
pub mod segment;
pub mod store;

use std::io::Read;

use kernel_api::{GeometryError, Ring, SegmentGeometry, SiteLocation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

pub use autosave::AutoSave;
pub use module::{DimensionCache, Module, ModuleCatalog, ModuleId, StaticCatalog};
pub use pipeline::{LayoutSummary, Pipeline, PipelineConfig, SegmentLayout};
pub use runtime::{
    DesignCommand, FixedView, InputResult, KeyCode, LogEntry, LogLevel, MapView, MouseButton,
    PersistOutcome, WorkbenchInputEvent, WorkbenchRuntimeContext,
};
pub use segment::{FieldSegment, SegmentId, SegmentPatch};
pub use store::{JsonFileStore, MemoryStore, SegmentStore, StoreError, StoreResult};

pub type DesignResult<T> = std::result::Result<T, DesignError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DesignId(pub Uuid);

impl DesignId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DesignId {
    fn default() -> Self {
        Self::new()
    }
}

/// A project site and the field segments drawn on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Design {
    metadata: DesignMetadata,
    #[serde(default)]
    pub site: SiteLocation,
    #[serde(default)]
    segments: Vec<FieldSegment>,
}

impl Design {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            metadata: DesignMetadata::new(name),
            site: SiteLocation::default(),
            segments: Vec::new(),
        }
    }

    /// Load a design from JSON. Stored areas are recomputed from geometry.
    pub fn from_reader(reader: impl Read) -> DesignResult<Self> {
        let mut design: Design = serde_json::from_reader(reader)?;
        let segments = std::mem::take(&mut design.segments);
        design.replace_all(segments);
        design.mark_clean();
        Ok(design)
    }

    pub fn to_json_pretty(&self) -> DesignResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn id(&self) -> DesignId {
        self.metadata.id
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn metadata(&self) -> &DesignMetadata {
        &self.metadata
    }

    pub fn mark_dirty(&mut self) {
        self.metadata.dirty = true;
        self.metadata.revision += 1;
    }

    pub fn mark_clean(&mut self) {
        self.metadata.dirty = false;
    }

    pub fn segments(&self) -> &[FieldSegment] {
        &self.segments
    }

    pub fn segment(&self, id: SegmentId) -> Option<&FieldSegment> {
        self.segments.iter().find(|s| s.id == id)
    }

    fn index_of(&self, id: SegmentId) -> DesignResult<usize> {
        self.segments
            .iter()
            .position(|s| s.id == id)
            .ok_or(DesignError::SegmentMissing(id))
    }

    pub fn insert(&mut self, mut segment: FieldSegment) -> DesignResult<()> {
        if self.segment(segment.id).is_some() {
            return Err(DesignError::SegmentExists(segment.id));
        }
        segment.geometry.validate()?;
        segment.recompute_area();
        self.segments.push(segment);
        self.mark_dirty();
        Ok(())
    }

    /// Remove a segment, returning its position so it can be restored.
    pub fn remove(&mut self, id: SegmentId) -> DesignResult<(usize, FieldSegment)> {
        let index = self.index_of(id)?;
        let segment = self.segments.remove(index);
        self.mark_dirty();
        Ok((index, segment))
    }

    /// Put a removed segment back at its old position.
    pub fn restore(&mut self, index: usize, segment: FieldSegment) {
        if self.segment(segment.id).is_some() {
            return;
        }
        let index = index.min(self.segments.len());
        self.segments.insert(index, segment);
        self.mark_dirty();
    }

    /// Replace every segment, e.g. with the contents of a store.
    pub fn replace_all(&mut self, segments: Vec<FieldSegment>) {
        self.segments = segments;
        for segment in &mut self.segments {
            let stored = segment.area;
            segment.recompute_area();
            if (stored - segment.area).abs() > 1e-6 {
                debug!(
                    "segment {} stored area {stored:.3} m² recomputed as {:.3} m²",
                    segment.id, segment.area
                );
            }
        }
        self.mark_dirty();
    }

    pub fn apply_patch(&mut self, id: SegmentId, patch: &SegmentPatch) -> DesignResult<()> {
        let index = self.index_of(id)?;
        patch.apply_to(&mut self.segments[index])?;
        self.mark_dirty();
        Ok(())
    }

    /// Replace the ring of a segment; the area follows.
    pub fn set_ring(&mut self, id: SegmentId, ring: Ring) -> DesignResult<()> {
        let index = self.index_of(id)?;
        self.segments[index].set_geometry(SegmentGeometry::Polygon(ring))?;
        self.mark_dirty();
        Ok(())
    }
}

/// Identity and change counter saved with the design.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesignMetadata {
    id: DesignId,
    name: String,
    #[serde(default)]
    revision: u64,
    #[serde(default)]
    dirty: bool,
}

impl DesignMetadata {
    fn new(name: impl Into<String>) -> Self {
        Self {
            id: DesignId::new(),
            name: name.into(),
            revision: 0,
            dirty: false,
        }
    }

    pub fn dirty(&self) -> bool {
        self.dirty
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkbenchId(String);

impl WorkbenchId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Name and blurb a workbench shows in the tool palette.
#[derive(Debug, Clone)]
pub struct WorkbenchDescriptor {
    pub id: WorkbenchId,
    pub label: String,
    pub description: String,
}

impl WorkbenchDescriptor {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: WorkbenchId::new(id),
            label: label.into(),
            description: description.into(),
        }
    }
}

/// A group of map tools that share interaction state.
///
/// Tools and commands are declared in `configure`; map input, commands and
/// persistence results are delivered through the hooks below.
pub trait Workbench: Send {
    fn descriptor(&self) -> WorkbenchDescriptor;

    /// Declare tools and commands. Runs once, at registration.
    fn configure(&self, context: &mut WorkbenchContext);

    fn on_activate(&mut self, _ctx: &mut WorkbenchRuntimeContext) {}

    fn on_deactivate(&mut self, _ctx: &mut WorkbenchRuntimeContext) {}

    /// Map input while the workbench is active. A consumed result stops the
    /// event from reaching map panning.
    fn on_input(
        &mut self,
        _event: &WorkbenchInputEvent,
        _active_tool: Option<&str>,
        _ctx: &mut WorkbenchRuntimeContext,
    ) -> InputResult {
        InputResult::ignored()
    }

    /// Run one of the commands declared in `configure`.
    fn on_command(&mut self, _command: &str, _ctx: &mut WorkbenchRuntimeContext) -> InputResult {
        InputResult::ignored()
    }

    /// Called once the host has persisted (or failed to persist) a command.
    fn on_persisted(&mut self, _outcome: &PersistOutcome, _ctx: &mut WorkbenchRuntimeContext) {}
}

/// Tools and commands collected from a workbench's `configure`.
#[derive(Debug, Default)]
pub struct WorkbenchContext {
    tools: Vec<ToolDescriptor>,
    commands: Vec<CommandDescriptor>,
}

impl WorkbenchContext {
    pub fn register_tool(&mut self, tool: ToolDescriptor) {
        self.tools.push(tool);
    }

    pub fn register_command(&mut self, command: CommandDescriptor) {
        self.commands.push(command);
    }

    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn commands(&self) -> &[CommandDescriptor] {
        &self.commands
    }
}

/// A map tool such as polygon drawing or vertex editing.
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub id: String,
    pub label: String,
    pub kind: ToolKind,
}

impl ToolDescriptor {
    pub fn new(id: impl Into<String>, label: impl Into<String>, kind: ToolKind) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind,
        }
    }
}

/// Simple metadata for commands that may be bound to shortcuts or buttons.
#[derive(Debug, Clone)]
pub struct CommandDescriptor {
    pub id: String,
    pub label: String,
}

impl CommandDescriptor {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    Draw,
    Edit,
}

/// Errors surfaced when editing or loading a design.
#[derive(Debug, Error)]
pub enum DesignError {
    #[error("segment {0} already exists")]
    SegmentExists(SegmentId),
    #[error("segment {0} is not part of the design")]
    SegmentMissing(SegmentId),
    #[error("invalid geometry: {0}")]
    InvalidGeometry(#[from] GeometryError),
    #[error("invalid value for `{field}`: {reason}")]
    InvalidAttribute { field: &'static str, reason: String },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("design serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
