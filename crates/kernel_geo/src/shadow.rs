//! Sun-driven shadow projection and time-interval aggregation.
//!
//! An instantaneous shadow is the footprint itself, the footprint translated
//! away from the sun (the roof line), and one quad per edge joining the two.
//! Interval aggregation samples the window and unions every polygon into a
//! single ground coverage shape.

use chrono::{NaiveTime, Timelike};
use geo::{Area, BooleanOps, MultiPolygon, Polygon};
use kernel_api::{
    units::normalize_bearing, InstantShadow, Ring, ShadowInterval, ShadowPart, ShadowPolygon,
    ShadowRequest, ShadowSample, SunPosition, SunPositionProvider, Vec2D,
};
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, warn};

use crate::convert::{from_multi_polygon, points_to_polygon};

/// Longest shadow ever cast, in meters. Caps the blow-up near the horizon.
pub const MAX_SHADOW_LENGTH_M: f64 = 500.0;

/// Ground length of the shadow of an obstruction `height_m` tall.
pub fn shadow_length(height_m: f64, altitude: f64) -> f64 {
    if altitude <= 0.0 || !altitude.is_finite() || !height_m.is_finite() {
        return 0.0;
    }
    let length = height_m / altitude.tan();
    if length.is_nan() {
        return 0.0;
    }
    length.clamp(0.0, MAX_SHADOW_LENGTH_M)
}

/// Compass bearing the shadow falls along: directly away from the sun.
pub fn shadow_bearing(sun: SunPosition) -> f64 {
    normalize_bearing(sun.azimuth_deg() + 180.0)
}

/// Project the shadow of `ring` raised `height_m` meters for one sun position.
///
/// Returns `None` when the sun is at or below the horizon or when fewer than
/// three finite vertices remain.
pub fn project_instant(ring: &Ring, height_m: f64, sun: SunPosition) -> Option<InstantShadow> {
    if !sun.is_above_horizon() {
        return None;
    }
    let vertices: Vec<Vec2D> = ring
        .vertices()
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .collect();
    if vertices.len() < 3 {
        return None;
    }

    let length_m = shadow_length(height_m, sun.altitude);
    let bearing_deg = shadow_bearing(sun);
    let shift = |p: Vec2D| p.destination(bearing_deg, length_m);

    let mut polygons = Vec::with_capacity(vertices.len() + 2);
    polygons.push(ShadowPolygon {
        part: ShadowPart::Base,
        ring: closed(vertices.clone()),
    });
    polygons.push(ShadowPolygon {
        part: ShadowPart::Roof,
        ring: closed(vertices.iter().copied().map(shift).collect()),
    });
    for (edge, a, b) in ring.edges() {
        polygons.push(ShadowPolygon {
            part: ShadowPart::Wall { edge },
            ring: vec![a, b, shift(b), shift(a), a],
        });
    }

    Some(InstantShadow {
        sun,
        length_m,
        bearing_deg,
        polygons,
    })
}

fn closed(mut points: Vec<Vec2D>) -> Vec<Vec2D> {
    if let Some(&first) = points.first() {
        points.push(first);
    }
    points
}

/// Union `polygon` into `acc`. A panicking or empty union leaves `acc`
/// untouched and reports failure.
fn union_into(acc: &mut MultiPolygon<f64>, polygon: Polygon<f64>) -> bool {
    let candidate = MultiPolygon::new(vec![polygon]);
    let current = &*acc;
    let result = panic::catch_unwind(AssertUnwindSafe(|| current.union(&candidate)));
    match result {
        Ok(merged) if !merged.0.is_empty() || current.0.is_empty() => {
            *acc = merged;
            true
        }
        Ok(_) => false,
        Err(_) => false,
    }
}

/// Union of every polygon of one instantaneous shadow.
pub fn instant_footprint(shadow: &InstantShadow) -> MultiPolygon<f64> {
    let mut acc = MultiPolygon::new(Vec::new());
    for polygon in &shadow.polygons {
        union_into(&mut acc, points_to_polygon(&polygon.ring));
    }
    acc
}

/// Ground area covered by one instantaneous shadow.
pub fn instant_area(shadow: &InstantShadow) -> f64 {
    instant_footprint(shadow).unsigned_area()
}

/// Sample `[start, end]` (swapped when inverted) at the request resolution
/// and union every shadow polygon into one aggregate.
pub fn aggregate_interval(request: &ShadowRequest, sun: &dyn SunPositionProvider) -> ShadowInterval {
    let (start, end) = if request.start <= request.end {
        (request.start, request.end)
    } else {
        (request.end, request.start)
    };
    let step = request.resolution.step_minutes();
    let first_minute = start.num_seconds_from_midnight() / 60;
    let last_minute = end.num_seconds_from_midnight() / 60;
    let site = request.site;

    let mut samples = Vec::new();
    let mut aggregate = MultiPolygon::new(Vec::new());
    let mut failed_unions = 0;

    let mut minute = first_minute;
    while minute <= last_minute {
        let Some(time) = NaiveTime::from_num_seconds_from_midnight_opt(minute * 60, 0) else {
            break;
        };
        minute += step;

        let at = site.to_utc(request.date, time);
        let position = sun
            .position(at, site.latitude, site.longitude)
            .unwrap_or_else(|err| {
                warn!("sun position lookup failed at {at}: {err}");
                SunPosition::default()
            });

        let Some(shadow) = project_instant(&request.ring, request.obstruction_height_m, position)
        else {
            continue;
        };

        let mut sample_failed = false;
        for polygon in &shadow.polygons {
            if !union_into(&mut aggregate, points_to_polygon(&polygon.ring)) {
                sample_failed = true;
            }
        }
        if sample_failed {
            failed_unions += 1;
        }
        samples.push(ShadowSample { time, shadow });
    }

    debug!(
        samples = samples.len(),
        failed_unions,
        area = aggregate.unsigned_area(),
        "aggregated interval shadow"
    );

    ShadowInterval {
        samples,
        aggregate: from_multi_polygon(&aggregate),
        failed_unions,
    }
}
