//! What a workbench sees while it handles map input: the design, the view,
//! and queues for log lines and design commands.
//!
//! Workbenches never mutate the design directly. They read it through the
//! context and queue [`DesignCommand`]s which the host applies, persists and
//! reports back through [`PersistOutcome`].

use kernel_api::{Ring, UnitSystem, Vec2D};

use crate::{segment::SegmentId, Design};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// Message a workbench wants shown in the activity log.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
}

/// The map the user draws on.
pub trait MapView {
    /// Ground meters covered by one screen pixel at the current zoom.
    fn meters_per_pixel(&self) -> f64;

    /// Compass bearing of the screen's up direction, in degrees.
    fn rotation_deg(&self) -> f64;
}

/// A map view frozen at one resolution and rotation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedView {
    pub meters_per_pixel: f64,
    pub rotation_deg: f64,
}

impl FixedView {
    pub fn new(meters_per_pixel: f64) -> Self {
        Self {
            meters_per_pixel,
            rotation_deg: 0.0,
        }
    }
}

impl Default for FixedView {
    fn default() -> Self {
        Self::new(0.1)
    }
}

impl MapView for FixedView {
    fn meters_per_pixel(&self) -> f64 {
        self.meters_per_pixel
    }

    fn rotation_deg(&self) -> f64 {
        self.rotation_deg
    }
}

/// Change requested by a workbench, applied by the host.
#[derive(Debug, Clone, PartialEq)]
pub enum DesignCommand {
    /// A drawn polygon was closed; create and persist a segment for it.
    CreateSegment { ring: Ring },
    /// Live vertex drag: update the in-memory ring only.
    ShapeChanged { segment: SegmentId, ring: Ring },
    /// Vertex editing finished: persist the ring and its area now.
    CommitGeometry { segment: SegmentId, ring: Ring },
}

/// Result of persisting a [`DesignCommand`], handed back to the workbench.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistOutcome {
    Created { segment: SegmentId },
    CreateFailed { reason: String },
    GeometrySaved { segment: SegmentId },
    GeometryFailed { segment: SegmentId, reason: String },
}

/// Borrowed design state plus the queues a hook may push to.
pub struct WorkbenchRuntimeContext<'a> {
    /// The open design, read-only.
    pub design: &'a Design,

    /// Map resolution and rotation.
    pub map_view: &'a dyn MapView,

    /// Segment currently selected in the host, if any.
    pub selected_segment: Option<SegmentId>,

    /// Screen radius, in pixels, of vertex and closing snaps.
    pub snap_px: f64,

    pub units: UnitSystem,

    pending_logs: Vec<LogEntry>,
    pending_commands: Vec<DesignCommand>,
}

impl<'a> WorkbenchRuntimeContext<'a> {
    pub fn new(design: &'a Design, map_view: &'a dyn MapView, snap_px: f64) -> Self {
        Self {
            design,
            map_view,
            selected_segment: None,
            snap_px,
            units: UnitSystem::default(),
            pending_logs: Vec::new(),
            pending_commands: Vec::new(),
        }
    }

    /// Snap radius converted to ground meters at the current zoom.
    pub fn snap_distance_m(&self) -> f64 {
        let mpp = self.map_view.meters_per_pixel();
        if mpp.is_finite() && mpp > 0.0 && self.snap_px.is_finite() {
            self.snap_px.max(0.0) * mpp
        } else {
            0.0
        }
    }

    /// Log an info message to the application log.
    pub fn log_info(&mut self, message: impl Into<String>) {
        self.pending_logs.push(LogEntry {
            level: LogLevel::Info,
            message: message.into(),
        });
    }

    /// Log a warning message to the application log.
    pub fn log_warn(&mut self, message: impl Into<String>) {
        self.pending_logs.push(LogEntry {
            level: LogLevel::Warn,
            message: message.into(),
        });
    }

    /// Log an error message to the application log.
    pub fn log_error(&mut self, message: impl Into<String>) {
        self.pending_logs.push(LogEntry {
            level: LogLevel::Error,
            message: message.into(),
        });
    }

    pub fn submit(&mut self, command: DesignCommand) {
        self.pending_commands.push(command);
    }

    /// Take the queued log lines; the host calls this after every hook.
    pub fn drain_logs(&mut self) -> Vec<LogEntry> {
        std::mem::take(&mut self.pending_logs)
    }

    /// Drain queued design commands (called by host after hook returns).
    pub fn drain_commands(&mut self) -> Vec<DesignCommand> {
        std::mem::take(&mut self.pending_commands)
    }

    /// Vertices of every segment except `exclude`, for magnetic snapping.
    pub fn snap_targets(&self, exclude: Option<SegmentId>) -> Vec<Vec2D> {
        self.design
            .segments()
            .iter()
            .filter(|s| Some(s.id) != exclude)
            .filter_map(|s| s.ring())
            .flat_map(|ring| ring.vertices().iter().copied())
            .filter(|v| v.is_finite())
            .collect()
    }
}

/// Input event passed to workbench on_input hook, in map coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkbenchInputEvent {
    MousePress { button: MouseButton, map_pos: Vec2D },
    MouseRelease { button: MouseButton, map_pos: Vec2D },
    MouseMove { map_pos: Vec2D },
    KeyPress { key: KeyCode },
    KeyRelease { key: KeyCode },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
    Other(u16),
}

/// Keys the designer reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCode {
    Escape,
    Enter,
    Backspace,
    Delete,
    Shift,
    Control,
    Alt,
    Meta,
    Unknown,
}

/// Outcome of a workbench input hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputResult {
    /// Consumed events do not reach map panning.
    pub consumed: bool,
    /// If true, the overlay should be redrawn.
    pub redraw: bool,
}

impl InputResult {
    pub fn consumed() -> Self {
        Self {
            consumed: true,
            redraw: true,
        }
    }

    pub fn ignored() -> Self {
        Self::default()
    }

    pub fn redraw_only() -> Self {
        Self {
            consumed: false,
            redraw: true,
        }
    }
}
