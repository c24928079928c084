//! Fixtures for the session tests.

#![allow(dead_code)]

use std::path::PathBuf;

use core_design::{
    DesignId, FieldSegment, MemoryStore, Module, ModuleCatalog, ModuleId, SegmentId,
    SegmentPatch, SegmentStore, StaticCatalog, StoreError, StoreResult,
};
use kernel_api::{Ring, Vec2D};
use settings::DesignerSettings;
use uuid::Uuid;

pub fn approx_eq(a: f64, b: f64, eps: f64) -> bool {
    (a - b).abs() <= eps
}

pub fn rectangle(w: f64, h: f64) -> Ring {
    Ring::new(vec![
        Vec2D::new(0.0, 0.0),
        Vec2D::new(w, 0.0),
        Vec2D::new(w, h),
        Vec2D::new(0.0, h),
    ])
    .expect("valid rectangle")
}

/// Defaults with hourly shadow sampling.
pub fn settings() -> DesignerSettings {
    let mut settings = DesignerSettings::default();
    settings.shadows.sampling_minutes = 60;
    settings
}

pub fn scratch_dir() -> PathBuf {
    std::env::temp_dir().join(format!("solarlayout-session-{}", Uuid::new_v4()))
}

/// A memory store whose writes can be made to fail.
#[derive(Debug, Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub fail_create: bool,
    pub fail_delete: bool,
}

impl FlakyStore {
    pub fn with(segments: &[FieldSegment]) -> Self {
        let mut store = Self::default();
        for segment in segments {
            store.inner.create(segment).expect("seed segment");
        }
        store
    }
}

impl SegmentStore for FlakyStore {
    fn list_by_design(&self, design: DesignId) -> StoreResult<Vec<FieldSegment>> {
        self.inner.list_by_design(design)
    }

    fn create(&mut self, segment: &FieldSegment) -> StoreResult<FieldSegment> {
        if self.fail_create {
            return Err(StoreError::Rejected("create refused".into()));
        }
        self.inner.create(segment)
    }

    fn update_partial(&mut self, id: SegmentId, patch: &SegmentPatch) -> StoreResult<()> {
        self.inner.update_partial(id, patch)
    }

    fn delete(&mut self, id: SegmentId) -> StoreResult<()> {
        if self.fail_delete {
            return Err(StoreError::Rejected("delete refused".into()));
        }
        self.inner.delete(id)
    }
}

/// A catalog that refuses deletions.
#[derive(Debug, Default)]
pub struct LockedCatalog {
    pub inner: StaticCatalog,
}

impl ModuleCatalog for LockedCatalog {
    fn list(&self) -> StoreResult<Vec<Module>> {
        self.inner.list()
    }

    fn get(&self, id: ModuleId) -> StoreResult<Module> {
        self.inner.get(id)
    }

    fn insert(&mut self, module: Module) -> StoreResult<()> {
        self.inner.insert(module)
    }

    fn delete(&mut self, _id: ModuleId) -> StoreResult<Module> {
        Err(StoreError::Rejected("catalog is read-only".into()))
    }
}
