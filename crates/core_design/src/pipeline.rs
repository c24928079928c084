//! Reactive derivation of every visual layer from the canonical segments.
//!
//! Each layer (walls, interval shadows, module layout) is a pure function of
//! a handful of segment attributes. Results are cached per segment under a
//! hash of exactly those inputs, so a refresh after an unrelated edit is a
//! series of hash comparisons.

use std::{
    collections::{
        hash_map::{DefaultHasher, Entry},
        HashMap, HashSet,
    },
    hash::{Hash, Hasher},
};

use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use kernel_api::{
    LayoutKernel, LayoutRequest, ModuleDimensions, PackedLayout, Ring, SamplingResolution,
    ShadowInterval, ShadowRequest, SiteLocation, WallQuad,
};
use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    module::{DimensionCache, ModuleCatalog},
    segment::{FieldSegment, SegmentId},
    Design,
};

/// Hash builder over the exact inputs of one derivation.
#[derive(Default)]
pub struct InputKey(DefaultHasher);

impl InputKey {
    pub fn new(tag: &str) -> Self {
        let mut key = Self::default();
        tag.hash(&mut key.0);
        key
    }

    pub fn f64(mut self, value: f64) -> Self {
        // Fold -0.0 into 0.0 so equal numbers hash equally.
        let value = if value == 0.0 { 0.0 } else { value };
        value.to_bits().hash(&mut self.0);
        self
    }

    pub fn u64(mut self, value: u64) -> Self {
        value.hash(&mut self.0);
        self
    }

    pub fn ring(mut self, ring: &Ring) -> Self {
        ring.points().len().hash(&mut self.0);
        for p in ring.points() {
            self = self.f64(p.x).f64(p.y);
        }
        self
    }

    pub fn date(self, date: NaiveDate) -> Self {
        self.u64(date.num_days_from_ce() as u64)
    }

    pub fn time(self, time: NaiveTime) -> Self {
        self.u64(time.num_seconds_from_midnight() as u64)
    }

    pub fn site(self, site: &SiteLocation) -> Self {
        let offset = site.utc_offset().local_minus_utc();
        self.f64(site.latitude)
            .f64(site.longitude)
            .u64(offset as i64 as u64)
    }

    pub fn finish(&self) -> u64 {
        self.0.finish()
    }
}

/// A cached value and the input hash it was computed from.
#[derive(Debug, Clone)]
pub struct Memo<T> {
    key: u64,
    value: T,
}

impl<T> Memo<T> {
    pub fn key(&self) -> u64 {
        self.key
    }

    pub fn value(&self) -> &T {
        &self.value
    }
}

/// Per-segment memo table.
#[derive(Debug, Clone)]
pub struct MemoTable<T> {
    entries: HashMap<SegmentId, Memo<T>>,
}

impl<T> Default for MemoTable<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<T> MemoTable<T> {
    /// Return the cached value for `id` when its key matches, recomputing it
    /// otherwise. The flag is true when `compute` ran.
    pub fn get_or_compute(
        &mut self,
        id: SegmentId,
        key: u64,
        compute: impl FnOnce() -> T,
    ) -> (&T, bool) {
        match self.entries.entry(id) {
            Entry::Occupied(mut entry) => {
                let fresh = entry.get().key != key;
                if fresh {
                    entry.insert(Memo {
                        key,
                        value: compute(),
                    });
                }
                (&entry.into_mut().value, fresh)
            }
            Entry::Vacant(entry) => {
                let memo = entry.insert(Memo {
                    key,
                    value: compute(),
                });
                (&memo.value, true)
            }
        }
    }

    pub fn get(&self, id: SegmentId) -> Option<&T> {
        self.entries.get(&id).map(|memo| &memo.value)
    }

    pub fn contains(&self, id: SegmentId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn remove(&mut self, id: SegmentId) -> Option<T> {
        self.entries.remove(&id).map(|memo| memo.value)
    }

    pub fn retain(&mut self, keep: &HashSet<SegmentId>) {
        self.entries.retain(|id, _| keep.contains(id));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Packing totals shown next to a segment.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct LayoutSummary {
    pub module_count: usize,
    pub frame_count: usize,
    pub module_area_m2: f64,
    /// Module area over segment area.
    pub coverage_ratio: f64,
    /// DC nameplate in kW, when the module power rating is known.
    pub dc_kw: Option<f64>,
}

impl LayoutSummary {
    pub fn new(
        layout: &PackedLayout,
        module: ModuleDimensions,
        segment_area_m2: f64,
        power_w: Option<f64>,
    ) -> Self {
        let module_count = layout.modules.len();
        let module_area_m2 = module_count as f64 * module.area();
        let coverage_ratio = if segment_area_m2 > 0.0 {
            module_area_m2 / segment_area_m2
        } else {
            0.0
        };
        Self {
            module_count,
            frame_count: layout.frame_count,
            module_area_m2,
            coverage_ratio,
            dc_kw: power_w
                .filter(|w| w.is_finite() && *w > 0.0)
                .map(|w| w * module_count as f64 / 1000.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentLayout {
    pub packed: PackedLayout,
    pub summary: LayoutSummary,
}

/// Inputs shared by every segment of a refresh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
    pub site: SiteLocation,
    pub resolution: SamplingResolution,
    pub shadows: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            site: SiteLocation::default(),
            resolution: SamplingResolution::default(),
            shadows: true,
        }
    }
}

/// What a refresh did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RefreshStats {
    pub recomputed: usize,
    pub reused: usize,
    pub removed: usize,
}

/// Walls, shadows and layouts for every segment of a design.
#[derive(Debug, Default)]
pub struct Pipeline {
    walls: MemoTable<Vec<WallQuad>>,
    shadows: MemoTable<Option<ShadowInterval>>,
    layouts: MemoTable<Option<SegmentLayout>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bring every derived layer in line with `design`.
    ///
    /// Segments without a usable ring have no derived layers; layers of
    /// segments no longer in the design are dropped.
    pub fn refresh(
        &mut self,
        design: &Design,
        config: &PipelineConfig,
        kernel: &dyn LayoutKernel,
        catalog: &dyn ModuleCatalog,
        dimensions: &mut DimensionCache,
    ) -> RefreshStats {
        let mut stats = RefreshStats::default();
        let mut live = HashSet::new();

        for segment in design.segments() {
            let Some(ring) = segment.ring().filter(|r| r.validate().is_ok()) else {
                stats.removed += self.remove(segment.id);
                continue;
            };
            live.insert(segment.id);

            let counted = |stats: &mut RefreshStats, fresh: bool| {
                if fresh {
                    stats.recomputed += 1;
                } else {
                    stats.reused += 1;
                }
            };

            let (_, fresh) = self.walls.get_or_compute(segment.id, walls_key(segment, ring), || {
                kernel.extrude(ring, segment.surface_height_m(), segment.parapet_height_m())
            });
            counted(&mut stats, fresh);

            if config.shadows {
                let request = shadow_request(segment, ring, config);
                let key = shadow_key(&request);
                let (_, fresh) = self.shadows.get_or_compute(segment.id, key, || {
                    match kernel.shadow_interval(&request) {
                        Ok(interval) => Some(interval),
                        Err(err) => {
                            warn!("shadow analysis failed for segment {}: {err}", segment.id);
                            None
                        }
                    }
                });
                counted(&mut stats, fresh);
            } else if self.shadows.remove(segment.id).is_some() {
                stats.removed += 1;
            }

            match segment.module {
                Some(module_id) => {
                    let dims = dimensions.dimensions(catalog, module_id);
                    let power_w = catalog.get(module_id).ok().and_then(|m| m.power_w);
                    let request = layout_request(segment, ring, dims);
                    let key = layout_key(&request, segment.area, power_w);
                    let (_, fresh) = self.layouts.get_or_compute(segment.id, key, || {
                        match kernel.pack_modules(&request) {
                            Ok(packed) => {
                                let summary =
                                    LayoutSummary::new(&packed, dims, segment.area, power_w);
                                Some(SegmentLayout { packed, summary })
                            }
                            Err(err) => {
                                warn!("module layout failed for segment {}: {err}", segment.id);
                                None
                            }
                        }
                    });
                    counted(&mut stats, fresh);
                }
                None => {
                    if self.layouts.remove(segment.id).is_some() {
                        stats.removed += 1;
                    }
                }
            }
        }

        let before = self.walls.len() + self.shadows.len() + self.layouts.len();
        self.walls.retain(&live);
        self.shadows.retain(&live);
        self.layouts.retain(&live);
        stats.removed += before - (self.walls.len() + self.shadows.len() + self.layouts.len());

        debug!(
            recomputed = stats.recomputed,
            reused = stats.reused,
            removed = stats.removed,
            "pipeline refreshed"
        );
        stats
    }

    pub fn walls(&self, id: SegmentId) -> Option<&[WallQuad]> {
        self.walls.get(id).map(Vec::as_slice)
    }

    pub fn shadows(&self, id: SegmentId) -> Option<&ShadowInterval> {
        self.shadows.get(id).and_then(Option::as_ref)
    }

    pub fn layout(&self, id: SegmentId) -> Option<&SegmentLayout> {
        self.layouts.get(id).and_then(Option::as_ref)
    }

    /// Drop every layer of a segment; returns how many were held.
    pub fn remove(&mut self, id: SegmentId) -> usize {
        [
            self.walls.remove(id).is_some(),
            self.shadows.remove(id).is_some(),
            self.layouts.remove(id).is_some(),
        ]
        .into_iter()
        .filter(|held| *held)
        .count()
    }

    /// Number of layers currently held for a segment.
    pub fn artifact_count(&self, id: SegmentId) -> usize {
        [
            self.walls.contains(id),
            self.shadows.contains(id),
            self.layouts.contains(id),
        ]
        .into_iter()
        .filter(|held| *held)
        .count()
    }
}

fn walls_key(segment: &FieldSegment, ring: &Ring) -> u64 {
    InputKey::new("walls")
        .ring(ring)
        .f64(segment.surface_height_m())
        .f64(segment.parapet_height_m())
        .finish()
}

pub fn shadow_request(segment: &FieldSegment, ring: &Ring, config: &PipelineConfig) -> ShadowRequest {
    ShadowRequest {
        ring: ring.clone(),
        obstruction_height_m: segment.obstruction_height_m(),
        date: segment.analysis_date,
        start: segment.start_time,
        end: segment.end_time,
        site: config.site,
        resolution: config.resolution,
    }
}

fn shadow_key(request: &ShadowRequest) -> u64 {
    InputKey::new("shadows")
        .ring(&request.ring)
        .f64(request.obstruction_height_m)
        .date(request.date)
        .time(request.start)
        .time(request.end)
        .site(&request.site)
        .u64(request.resolution.step_minutes() as u64)
        .finish()
}

pub fn layout_request(segment: &FieldSegment, ring: &Ring, module: ModuleDimensions) -> LayoutRequest {
    LayoutRequest {
        ring: ring.clone(),
        setback_m: segment.setback,
        module,
        orientation: segment.default_orientation,
        frame_size_up: segment.frame_size_up,
        frame_size_wide: segment.frame_size_wide,
        module_spacing_m: segment.module_spacing,
        frame_spacing_m: segment.frame_spacing,
        row_spacing_m: segment.row_spacing,
        azimuth_deg: segment.module_azimuth,
        alignment: segment.alignment,
    }
}

fn layout_key(request: &LayoutRequest, area: f64, power_w: Option<f64>) -> u64 {
    InputKey::new("layout")
        .ring(&request.ring)
        .f64(request.setback_m)
        .f64(request.module.width)
        .f64(request.module.height)
        .u64(request.orientation as u64)
        .u64(request.frame_size_up as u64)
        .u64(request.frame_size_wide as u64)
        .f64(request.module_spacing_m)
        .f64(request.frame_spacing_m)
        .f64(request.row_spacing_m)
        .f64(request.azimuth_deg)
        .u64(request.alignment as u64)
        .f64(area)
        .f64(power_w.unwrap_or(f64::NAN))
        .finish()
}
