//! Input helpers for the draw workbench tests.

#![allow(dead_code)]

use core_design::{KeyCode, MouseButton, WorkbenchInputEvent};
use kernel_api::{Ring, Vec2D};

pub fn approx_eq(a: f64, b: f64, eps: f64) -> bool {
    (a - b).abs() <= eps
}

pub fn press(x: f64, y: f64) -> WorkbenchInputEvent {
    WorkbenchInputEvent::MousePress {
        button: MouseButton::Left,
        map_pos: Vec2D::new(x, y),
    }
}

pub fn release(x: f64, y: f64) -> WorkbenchInputEvent {
    WorkbenchInputEvent::MouseRelease {
        button: MouseButton::Left,
        map_pos: Vec2D::new(x, y),
    }
}

pub fn hover(x: f64, y: f64) -> WorkbenchInputEvent {
    WorkbenchInputEvent::MouseMove {
        map_pos: Vec2D::new(x, y),
    }
}

pub fn key(key: KeyCode) -> WorkbenchInputEvent {
    WorkbenchInputEvent::KeyPress { key }
}

pub fn key_up(key: KeyCode) -> WorkbenchInputEvent {
    WorkbenchInputEvent::KeyRelease { key }
}

pub fn square(size: f64) -> Ring {
    Ring::new(vec![
        Vec2D::new(0.0, 0.0),
        Vec2D::new(size, 0.0),
        Vec2D::new(size, size),
        Vec2D::new(0.0, size),
    ])
    .expect("valid square")
}
