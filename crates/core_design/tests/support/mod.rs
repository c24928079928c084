//! Shared fixtures for the design integration tests.

#![allow(dead_code)]

use std::path::PathBuf;

use core_design::{DesignId, FieldSegment};
use kernel_api::{Ring, Vec2D};
use uuid::Uuid;

pub fn approx_eq(a: f64, b: f64, eps: f64) -> bool {
    (a - b).abs() <= eps
}

pub fn rectangle(x: f64, y: f64, w: f64, h: f64) -> Ring {
    Ring::new(vec![
        Vec2D::new(x, y),
        Vec2D::new(x + w, y),
        Vec2D::new(x + w, y + h),
        Vec2D::new(x, y + h),
    ])
    .expect("valid rectangle")
}

pub fn segment(design: DesignId, ring: Ring) -> FieldSegment {
    FieldSegment::from_ring(design, ring).expect("valid segment")
}

/// Fresh directory under the system temp dir.
pub fn scratch_dir() -> PathBuf {
    std::env::temp_dir().join(format!("solarlayout-test-{}", Uuid::new_v4()))
}
