//! Unit conversion and human-readable formatting of distances, areas and angles.

use serde::{Deserialize, Serialize};

pub const METERS_PER_FOOT: f64 = 0.3048;
pub const SQUARE_FEET_PER_SQUARE_METER: f64 = 1.0 / (METERS_PER_FOOT * METERS_PER_FOOT);

pub fn feet_to_meters(feet: f64) -> f64 {
    feet * METERS_PER_FOOT
}

pub fn meters_to_feet(meters: f64) -> f64 {
    meters / METERS_PER_FOOT
}

/// Wrap any angle in degrees into `[0, 360)`.
pub fn normalize_bearing(deg: f64) -> f64 {
    let wrapped = deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Display unit system for labels and summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UnitSystem {
    #[default]
    Imperial,
    Metric,
}

/// Format a length given in meters, e.g. `"32.8 ft"` or `"10.00 m"`.
pub fn format_distance(meters: f64, units: UnitSystem) -> String {
    if !meters.is_finite() {
        return "–".to_string();
    }
    match units {
        UnitSystem::Imperial => format!("{:.1} ft", meters_to_feet(meters)),
        UnitSystem::Metric => format!("{:.2} m", meters),
    }
}

/// Format an area given in square meters, rounded to whole units with
/// thousands separators, e.g. `"1,076 ft²"`.
pub fn format_area(square_meters: f64, units: UnitSystem) -> String {
    if !square_meters.is_finite() {
        return "–".to_string();
    }
    let (value, suffix) = match units {
        UnitSystem::Imperial => (square_meters * SQUARE_FEET_PER_SQUARE_METER, "ft²"),
        UnitSystem::Metric => (square_meters, "m²"),
    };
    format!("{} {}", group_thousands(value.round() as i64), suffix)
}

/// Format a bearing as whole degrees, e.g. `"45°"`.
pub fn format_angle(deg: f64) -> String {
    format!("{:.0}°", normalize_bearing(deg))
}

fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
