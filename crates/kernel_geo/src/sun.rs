//! Solar position from the NOAA general solar position equations.
//!
//! Accuracy is within a fraction of a degree between roughly ±70° latitude,
//! which is more than enough for shadow footprints.

use chrono::{DateTime, Datelike, Timelike, Utc};
use kernel_api::{KernelError, KernelResult, SunPosition, SunPositionProvider};
use std::f64::consts::PI;

/// Stateless [`SunPositionProvider`] using the NOAA fractional-year series.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoaaSunProvider;

impl SunPositionProvider for NoaaSunProvider {
    fn position(
        &self,
        at: DateTime<Utc>,
        latitude: f64,
        longitude: f64,
    ) -> KernelResult<SunPosition> {
        if !latitude.is_finite() || latitude.abs() > 90.0 {
            return Err(KernelError::SunPosition(format!("latitude {latitude} out of range")));
        }
        if !longitude.is_finite() || longitude.abs() > 180.0 {
            return Err(KernelError::SunPosition(format!("longitude {longitude} out of range")));
        }

        let year = at.year();
        let leap = (year % 4 == 0 && year % 100 != 0) || year % 400 == 0;
        let days_in_year = if leap { 366.0 } else { 365.0 };
        let hour = at.hour() as f64 + at.minute() as f64 / 60.0 + at.second() as f64 / 3600.0;

        // Fractional year (radians)
        let gamma = 2.0 * PI / days_in_year * (at.ordinal() as f64 - 1.0 + (hour - 12.0) / 24.0);

        // Equation of time (minutes)
        let eqtime = 229.18
            * (0.000075 + 0.001868 * gamma.cos()
                - 0.032077 * gamma.sin()
                - 0.014615 * (2.0 * gamma).cos()
                - 0.040849 * (2.0 * gamma).sin());

        // Declination (radians)
        let decl = 0.006918 - 0.399912 * gamma.cos() + 0.070257 * gamma.sin()
            - 0.006758 * (2.0 * gamma).cos()
            + 0.000907 * (2.0 * gamma).sin()
            - 0.002697 * (3.0 * gamma).cos()
            + 0.00148 * (3.0 * gamma).sin();

        let true_solar_minutes = hour * 60.0 + eqtime + 4.0 * longitude;
        let hour_angle = (true_solar_minutes / 4.0 - 180.0).to_radians();

        let lat = latitude.to_radians();
        let cos_zenith = (lat.sin() * decl.sin() + lat.cos() * decl.cos() * hour_angle.cos())
            .clamp(-1.0, 1.0);
        let altitude = PI / 2.0 - cos_zenith.acos();

        // Azimuth measured from south, positive towards west
        let south_based = hour_angle
            .sin()
            .atan2(hour_angle.cos() * lat.sin() - decl.tan() * lat.cos());

        Ok(SunPosition::from_south_based(south_based, altitude))
    }
}
