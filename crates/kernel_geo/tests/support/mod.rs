//! Shared fixtures for the kernel integration tests.

#![allow(dead_code)]

use kernel_api::{Ring, Vec2D};

pub fn approx_eq(a: f64, b: f64, eps: f64) -> bool {
    (a - b).abs() <= eps
}

/// Axis-aligned `w` x `h` rectangle with its lower-left corner at the origin.
pub fn rectangle(w: f64, h: f64) -> Ring {
    Ring::new(vec![
        Vec2D::new(0.0, 0.0),
        Vec2D::new(w, 0.0),
        Vec2D::new(w, h),
        Vec2D::new(0.0, h),
    ])
    .expect("valid rectangle")
}

/// L-shaped ring made of a 20 x 10 bar and a 10 x 10 leg.
pub fn l_shape() -> Ring {
    Ring::new(vec![
        Vec2D::new(0.0, 0.0),
        Vec2D::new(20.0, 0.0),
        Vec2D::new(20.0, 10.0),
        Vec2D::new(10.0, 10.0),
        Vec2D::new(10.0, 20.0),
        Vec2D::new(0.0, 20.0),
    ])
    .expect("valid L shape")
}

/// Point-in-polygon by ray casting; boundary points may land either side.
pub fn point_in_ring(p: Vec2D, ring: &Ring) -> bool {
    let vertices = ring.vertices();
    let mut inside = false;
    let mut j = vertices.len() - 1;
    for i in 0..vertices.len() {
        let (a, b) = (vertices[i], vertices[j]);
        if (a.y > p.y) != (b.y > p.y) && p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x {
            inside = !inside;
        }
        j = i;
    }
    inside
}
