//! Debounced persistence of attribute edits.
//!
//! Edits are applied to the in-memory design immediately; the store only sees
//! one merged patch per segment once that segment has been quiet for the
//! configured period. Time is passed in by the caller.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use crate::segment::{SegmentId, SegmentPatch};

pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone)]
struct PendingSave {
    patch: SegmentPatch,
    last_edit: Instant,
}

#[derive(Debug)]
pub struct AutoSave {
    quiet: Duration,
    pending: HashMap<SegmentId, PendingSave>,
}

impl Default for AutoSave {
    fn default() -> Self {
        Self::new(DEFAULT_QUIET_PERIOD)
    }
}

impl AutoSave {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            pending: HashMap::new(),
        }
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet
    }

    /// Queue `patch` for `segment`, merging with anything already pending and
    /// restarting that segment's quiet period.
    pub fn record(&mut self, segment: SegmentId, patch: SegmentPatch, now: Instant) {
        if patch.is_empty() {
            return;
        }
        self.pending
            .entry(segment)
            .and_modify(|pending| {
                pending.patch.merge(patch.clone());
                pending.last_edit = now;
            })
            .or_insert(PendingSave {
                patch,
                last_edit: now,
            });
    }

    /// Remove and return every patch whose segment has been quiet long enough.
    pub fn due(&mut self, now: Instant) -> Vec<(SegmentId, SegmentPatch)> {
        let mut ready: Vec<SegmentId> = self
            .pending
            .iter()
            .filter(|(_, p)| now.saturating_duration_since(p.last_edit) >= self.quiet)
            .map(|(id, _)| *id)
            .collect();
        ready.sort();
        ready
            .into_iter()
            .filter_map(|id| self.pending.remove(&id).map(|p| (id, p.patch)))
            .collect()
    }

    /// Remove and return everything pending, regardless of timing.
    pub fn flush_all(&mut self) -> Vec<(SegmentId, SegmentPatch)> {
        let mut all: Vec<_> = self.pending.drain().map(|(id, p)| (id, p.patch)).collect();
        all.sort_by_key(|(id, _)| *id);
        all
    }

    /// Drop the pending patch of a segment, e.g. when it is deleted.
    pub fn cancel(&mut self, segment: SegmentId) -> Option<SegmentPatch> {
        self.pending.remove(&segment).map(|p| p.patch)
    }

    pub fn is_pending(&self, segment: SegmentId) -> bool {
        self.pending.contains_key(&segment)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Earliest instant at which [`AutoSave::due`] will return something.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|p| p.last_edit + self.quiet).min()
    }
}
