pub mod ring;
pub mod units;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc};
use glam::DVec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use ring::{edge_pairs, GeometryError, Ring, SegmentGeometry, Vec2D};
pub use units::UnitSystem;

/// Convenience alias for kernel fallible operations.
pub type KernelResult<T> = Result<T, KernelError>;

/// Sun position with angles in radians.
///
/// `azimuth` is a compass bearing (clockwise from north) and `altitude` is
/// the elevation above the horizon.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SunPosition {
    pub azimuth: f64,
    pub altitude: f64,
}

impl SunPosition {
    pub fn from_degrees(azimuth_deg: f64, altitude_deg: f64) -> Self {
        Self {
            azimuth: azimuth_deg.to_radians(),
            altitude: altitude_deg.to_radians(),
        }
    }

    /// Convert from the south-based convention (0 = south, positive towards
    /// west) used by several web sun calculators.
    pub fn from_south_based(azimuth: f64, altitude: f64) -> Self {
        Self {
            azimuth: (azimuth + std::f64::consts::PI).rem_euclid(std::f64::consts::TAU),
            altitude,
        }
    }

    pub fn azimuth_deg(&self) -> f64 {
        units::normalize_bearing(self.azimuth.to_degrees())
    }

    pub fn altitude_deg(&self) -> f64 {
        self.altitude.to_degrees()
    }

    pub fn is_above_horizon(&self) -> bool {
        self.altitude > 0.0
    }
}

/// Source of solar azimuth/altitude for a UTC instant and a location.
pub trait SunPositionProvider: Send + Sync {
    fn position(&self, at: DateTime<Utc>, latitude: f64, longitude: f64)
        -> KernelResult<SunPosition>;
}

/// Geographic site of a design, used to place shadow analysis in time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SiteLocation {
    pub latitude: f64,
    pub longitude: f64,
    /// Local clock offset from UTC. When unset, it is approximated from the
    /// longitude at 15° per hour.
    #[serde(default)]
    pub utc_offset_minutes: Option<i32>,
}

impl SiteLocation {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            utc_offset_minutes: None,
        }
    }

    pub fn utc_offset(&self) -> FixedOffset {
        let minutes = self.utc_offset_minutes.unwrap_or_else(|| {
            if self.longitude.is_finite() {
                ((self.longitude / 15.0).round() * 60.0) as i32
            } else {
                0
            }
        });
        FixedOffset::east_opt(minutes.clamp(-1439, 1439) * 60).unwrap_or_else(|| Utc.fix())
    }

    /// The UTC instant of a local wall-clock time on `date` at this site.
    pub fn to_utc(&self, date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
        let local = date.and_time(time);
        let offset = self.utc_offset();
        match offset.from_local_datetime(&local).single() {
            Some(dt) => dt.with_timezone(&Utc),
            None => Utc.from_utc_datetime(&local),
        }
    }
}

impl Default for SiteLocation {
    fn default() -> Self {
        Self::new(39.7392, -104.9903)
    }
}

/// Part of the vertical envelope a quad belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WallKind {
    Wall,
    Parapet,
}

/// A vertical quad standing on one ring edge.
///
/// Corners are ordered `(a, top), (b, top), (b, bottom), (a, bottom)`; `z`
/// is meters above ground.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WallQuad {
    pub edge: usize,
    pub kind: WallKind,
    pub corners: [DVec3; 4],
}

impl WallQuad {
    pub fn bottom(&self) -> f64 {
        self.corners[2].z
    }

    pub fn top(&self) -> f64 {
        self.corners[0].z
    }
}

/// Time step between shadow samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SamplingResolution {
    minutes: u32,
}

impl SamplingResolution {
    pub fn minutes(minutes: u32) -> Self {
        Self {
            minutes: minutes.max(1),
        }
    }

    pub fn step_minutes(&self) -> u32 {
        self.minutes
    }
}

impl Default for SamplingResolution {
    fn default() -> Self {
        Self::minutes(1)
    }
}

/// Which part of an instantaneous shadow a polygon is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShadowPart {
    Base,
    Roof,
    Wall { edge: usize },
}

/// One closed shadow polygon at ground level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShadowPolygon {
    pub part: ShadowPart,
    pub ring: Vec<Vec2D>,
}

/// Shadow cast by a segment for one sun position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstantShadow {
    pub sun: SunPosition,
    pub length_m: f64,
    pub bearing_deg: f64,
    pub polygons: Vec<ShadowPolygon>,
}

/// A polygon with holes, as produced by boolean operations.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlanarPolygon {
    pub exterior: Vec<Vec2D>,
    pub interiors: Vec<Vec<Vec2D>>,
}

impl PlanarPolygon {
    pub fn from_ring(ring: &Ring) -> Self {
        Self {
            exterior: ring.points().to_vec(),
            interiors: Vec::new(),
        }
    }

    pub fn area(&self) -> f64 {
        let holes: f64 = self
            .interiors
            .iter()
            .map(|hole| ring::shoelace_area(open(hole)))
            .sum();
        (ring::shoelace_area(open(&self.exterior)) - holes).max(0.0)
    }
}

fn open(points: &[Vec2D]) -> &[Vec2D] {
    match points.split_last() {
        Some((last, rest)) if !rest.is_empty() && last.approx_eq(rest[0]) => rest,
        _ => points,
    }
}

/// Inputs of an interval shadow analysis for one segment.
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowRequest {
    pub ring: Ring,
    /// Combined surface, racking and parapet height in meters.
    pub obstruction_height_m: f64,
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub site: SiteLocation,
    pub resolution: SamplingResolution,
}

/// An instantaneous shadow tagged with its local clock time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShadowSample {
    pub time: NaiveTime,
    pub shadow: InstantShadow,
}

/// Result of an interval shadow analysis.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ShadowInterval {
    pub samples: Vec<ShadowSample>,
    /// Union of every sampled shadow polygon.
    pub aggregate: Vec<PlanarPolygon>,
    /// Samples whose union step failed and were left out of the aggregate.
    pub failed_unions: usize,
}

impl ShadowInterval {
    pub fn aggregate_area(&self) -> f64 {
        self.aggregate.iter().map(PlanarPolygon::area).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    Landscape,
    Portrait,
}

/// Distribution of leftover space along the packing X axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Alignment {
    Left,
    #[default]
    Center,
    Right,
    Justify,
}

/// Physical module size in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModuleDimensions {
    pub width: f64,
    pub height: f64,
}

impl ModuleDimensions {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Width/height as laid out for `orientation`; portrait swaps them.
    pub fn oriented(self, orientation: Orientation) -> Self {
        match orientation {
            Orientation::Landscape => self,
            Orientation::Portrait => Self::new(self.height, self.width),
        }
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

/// Inputs of a module layout for one segment.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutRequest {
    pub ring: Ring,
    pub setback_m: f64,
    pub module: ModuleDimensions,
    pub orientation: Orientation,
    pub frame_size_up: u32,
    pub frame_size_wide: u32,
    pub module_spacing_m: f64,
    pub frame_spacing_m: f64,
    pub row_spacing_m: f64,
    pub azimuth_deg: f64,
    pub alignment: Alignment,
}

/// One placed module, in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModuleRect {
    /// Index of the frame within the packing grid.
    pub frame: usize,
    /// Module position inside its frame.
    pub row: u32,
    pub column: u32,
    /// Counter-clockwise corners in world coordinates, starting at the
    /// frame-local minimum corner.
    pub corners: [Vec2D; 4],
}

/// Result of packing modules into a segment.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PackedLayout {
    /// Setback-inset buildable boundary.
    pub buildable: PlanarPolygon,
    pub modules: Vec<ModuleRect>,
    /// Frames with at least one placed module.
    pub frame_count: usize,
    /// True when the inset failed and the original ring was used instead.
    pub inset_fallback: bool,
    /// True when the grid was too large and only its first frames were tested.
    #[serde(default)]
    pub truncated: bool,
}

/// Trait implemented by any geometry kernel that can serve the design engine.
pub trait LayoutKernel: Send {
    /// Human-friendly identifier for logging purposes.
    fn name(&self) -> &str;

    /// Walls and parapets standing on every ring edge.
    fn extrude(&self, ring: &Ring, surface_height_m: f64, parapet_height_m: f64) -> Vec<WallQuad>;

    /// Shadow for a single sun position, `None` when the sun is down.
    fn instant_shadow(&self, ring: &Ring, height_m: f64, sun: SunPosition) -> Option<InstantShadow>;

    /// Sampled shadows over a time window and their union.
    fn shadow_interval(&self, request: &ShadowRequest) -> KernelResult<ShadowInterval>;

    /// Oriented module grid inside the setback-inset segment.
    fn pack_modules(&self, request: &LayoutRequest) -> KernelResult<PackedLayout>;
}

/// Standardized error type for kernel interactions.
#[derive(Debug, Error)]
pub enum KernelError {
    #[error("invalid kernel input: {0}")]
    InvalidInput(String),
    #[error("sun position unavailable: {0}")]
    SunPosition(String),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
