//! Persistence collaborators for field segments.

use std::{
    fs::{self, File},
    io::BufReader,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::debug;

use crate::{
    module::ModuleId,
    segment::{FieldSegment, SegmentId, SegmentPatch},
    DesignId,
};

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("segment {0} not found")]
    NotFound(SegmentId),
    #[error("segment {0} already exists")]
    Duplicate(SegmentId),
    #[error("module {0} not found")]
    ModuleNotFound(ModuleId),
    #[error("store rejected the request: {0}")]
    Rejected(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid store file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Backend holding the segments of every design.
pub trait SegmentStore: Send {
    fn list_by_design(&self, design: DesignId) -> StoreResult<Vec<FieldSegment>>;

    /// Persist a new segment and return the stored copy.
    fn create(&mut self, segment: &FieldSegment) -> StoreResult<FieldSegment>;

    fn update_partial(&mut self, id: SegmentId, patch: &SegmentPatch) -> StoreResult<()>;

    fn delete(&mut self, id: SegmentId) -> StoreResult<()>;
}

fn apply(segment: &mut FieldSegment, patch: &SegmentPatch) -> StoreResult<()> {
    patch
        .apply_to(segment)
        .map_err(|err| StoreError::Rejected(err.to_string()))
}

/// Keeps segments in memory, in creation order.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    segments: Vec<FieldSegment>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn get(&self, id: SegmentId) -> Option<&FieldSegment> {
        self.segments.iter().find(|s| s.id == id)
    }
}

impl SegmentStore for MemoryStore {
    fn list_by_design(&self, design: DesignId) -> StoreResult<Vec<FieldSegment>> {
        Ok(self
            .segments
            .iter()
            .filter(|s| s.design_id == design)
            .cloned()
            .collect())
    }

    fn create(&mut self, segment: &FieldSegment) -> StoreResult<FieldSegment> {
        if self.get(segment.id).is_some() {
            return Err(StoreError::Duplicate(segment.id));
        }
        self.segments.push(segment.clone());
        Ok(segment.clone())
    }

    fn update_partial(&mut self, id: SegmentId, patch: &SegmentPatch) -> StoreResult<()> {
        let segment = self
            .segments
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(StoreError::NotFound(id))?;
        apply(segment, patch)
    }

    fn delete(&mut self, id: SegmentId) -> StoreResult<()> {
        let before = self.segments.len();
        self.segments.retain(|s| s.id != id);
        if self.segments.len() == before {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }
}

/// One pretty-printed JSON file per design (`<design id>.json`) in a directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn design_path(&self, design: DesignId) -> PathBuf {
        self.root.join(format!("{}.json", design.0))
    }

    fn read(&self, path: &Path) -> StoreResult<Vec<FieldSegment>> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }

    fn write(&self, path: &Path, segments: &[FieldSegment]) -> StoreResult<()> {
        let staging = path.with_extension("json.tmp");
        let file = File::create(&staging)?;
        serde_json::to_writer_pretty(file, segments)?;
        fs::rename(&staging, path)?;
        Ok(())
    }

    /// The design file holding `id`, with its current contents.
    fn locate(&self, id: SegmentId) -> StoreResult<(PathBuf, Vec<FieldSegment>)> {
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let segments = self.read(&path)?;
            if segments.iter().any(|s| s.id == id) {
                return Ok((path, segments));
            }
        }
        Err(StoreError::NotFound(id))
    }
}

impl SegmentStore for JsonFileStore {
    fn list_by_design(&self, design: DesignId) -> StoreResult<Vec<FieldSegment>> {
        self.read(&self.design_path(design))
    }

    fn create(&mut self, segment: &FieldSegment) -> StoreResult<FieldSegment> {
        let path = self.design_path(segment.design_id);
        let mut segments = self.read(&path)?;
        if segments.iter().any(|s| s.id == segment.id) {
            return Err(StoreError::Duplicate(segment.id));
        }
        segments.push(segment.clone());
        self.write(&path, &segments)?;
        debug!("stored segment {} in {}", segment.id, path.display());
        Ok(segment.clone())
    }

    fn update_partial(&mut self, id: SegmentId, patch: &SegmentPatch) -> StoreResult<()> {
        let (path, mut segments) = self.locate(id)?;
        if let Some(segment) = segments.iter_mut().find(|s| s.id == id) {
            apply(segment, patch)?;
        }
        self.write(&path, &segments)
    }

    fn delete(&mut self, id: SegmentId) -> StoreResult<()> {
        let (path, mut segments) = self.locate(id)?;
        segments.retain(|s| s.id != id);
        self.write(&path, &segments)
    }
}
