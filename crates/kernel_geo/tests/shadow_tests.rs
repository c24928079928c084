use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use kernel_api::{
    KernelError, KernelResult, LayoutKernel, Ring, SamplingResolution, ShadowRequest,
    SiteLocation, SunPosition, SunPositionProvider, Vec2D,
};
use kernel_geo::{shadow, GeoKernel};

mod support;

use crate::support::{approx_eq, rectangle};

struct FixedSun(SunPosition);

impl SunPositionProvider for FixedSun {
    fn position(&self, _at: DateTime<Utc>, _lat: f64, _lng: f64) -> KernelResult<SunPosition> {
        Ok(self.0)
    }
}

struct BrokenSun;

impl SunPositionProvider for BrokenSun {
    fn position(&self, _at: DateTime<Utc>, _lat: f64, _lng: f64) -> KernelResult<SunPosition> {
        Err(KernelError::SunPosition("offline".into()))
    }
}

fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn winter_request(ring: Ring, start: NaiveTime, end: NaiveTime) -> ShadowRequest {
    ShadowRequest {
        ring,
        obstruction_height_m: 3.0,
        date: NaiveDate::from_ymd_opt(2024, 12, 22).unwrap(),
        start,
        end,
        site: SiteLocation::default(),
        resolution: SamplingResolution::minutes(30),
    }
}

#[test]
fn aggregate_covers_every_sample() {
    let kernel = GeoKernel::new();
    let ring = rectangle(10.0, 10.0);
    let interval = kernel
        .shadow_interval(&winter_request(ring.clone(), time(10, 0), time(16, 0)))
        .unwrap();
    assert_eq!(interval.samples.len(), 13);
    assert_eq!(interval.failed_unions, 0);

    let aggregate = interval.aggregate_area();
    assert!(aggregate > ring.area());
    for sample in &interval.samples {
        assert!(shadow::instant_area(&sample.shadow) <= aggregate + 1e-3);
    }
}

#[test]
fn widening_the_window_never_shrinks_the_aggregate() {
    let kernel = GeoKernel::new();
    let ring = rectangle(8.0, 12.0);
    let narrow = kernel
        .shadow_interval(&winter_request(ring.clone(), time(11, 0), time(13, 0)))
        .unwrap();
    let wide = kernel
        .shadow_interval(&winter_request(ring, time(9, 0), time(15, 0)))
        .unwrap();
    assert!(narrow.aggregate_area() <= wide.aggregate_area() + 1e-3);
}

#[test]
fn inverted_window_is_swapped() {
    let kernel = GeoKernel::new();
    let ring = rectangle(10.0, 10.0);
    let forward = kernel
        .shadow_interval(&winter_request(ring.clone(), time(10, 0), time(12, 0)))
        .unwrap();
    let backward = kernel
        .shadow_interval(&winter_request(ring, time(12, 0), time(10, 0)))
        .unwrap();
    assert_eq!(forward.samples.len(), backward.samples.len());
    assert!(approx_eq(forward.aggregate_area(), backward.aggregate_area(), 1e-3));
}

#[test]
fn constant_sun_aggregates_to_one_instant() {
    let sun = SunPosition::from_degrees(180.0, 45.0);
    let kernel = GeoKernel::with_sun_provider(Box::new(FixedSun(sun)));
    let ring = rectangle(10.0, 10.0);
    let mut request = winter_request(ring, time(10, 0), time(11, 0));
    request.obstruction_height_m = 5.0;
    let interval = kernel.shadow_interval(&request).unwrap();
    assert_eq!(interval.samples.len(), 3);
    assert!(approx_eq(interval.aggregate_area(), 150.0, 1e-3));
}

#[test]
fn night_window_produces_no_shadow() {
    let kernel = GeoKernel::new();
    let interval = kernel
        .shadow_interval(&winter_request(rectangle(10.0, 10.0), time(0, 0), time(4, 0)))
        .unwrap();
    assert!(interval.samples.is_empty());
    assert!(interval.aggregate.is_empty());
}

#[test]
fn failing_sun_provider_is_treated_as_no_sun() {
    let kernel = GeoKernel::with_sun_provider(Box::new(BrokenSun));
    let interval = kernel
        .shadow_interval(&winter_request(rectangle(10.0, 10.0), time(10, 0), time(12, 0)))
        .unwrap();
    assert!(interval.samples.is_empty());
    assert_eq!(interval.aggregate_area(), 0.0);
}

#[test]
fn invalid_ring_is_an_error() {
    let kernel = GeoKernel::new();
    let ring = Ring::from_raw(vec![Vec2D::new(0.0, 0.0), Vec2D::new(1.0, 1.0)]);
    assert!(kernel
        .shadow_interval(&winter_request(ring, time(10, 0), time(12, 0)))
        .is_err());
}

#[test]
fn winter_shadow_points_away_from_a_southern_sun() {
    let kernel = GeoKernel::new();
    let interval = kernel
        .shadow_interval(&winter_request(rectangle(10.0, 10.0), time(12, 0), time(12, 0)))
        .unwrap();
    let sample = &interval.samples[0];
    // Around solar noon in Denver the sun sits south, so the shadow heads north.
    let bearing = sample.shadow.bearing_deg;
    assert!(bearing < 30.0 || bearing > 330.0, "bearing was {bearing}");
}
