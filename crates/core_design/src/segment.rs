//! Field segments: the drawn polygons and every attribute the layout engine
//! derives visuals from.

use chrono::{Datelike, NaiveDate, NaiveTime, Utc};
use kernel_api::{
    units::feet_to_meters, Alignment, GeometryError, Orientation, Ring, SegmentGeometry,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{module::ModuleId, DesignError, DesignId, DesignResult};

/// Unique identifier for a field segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SegmentId(pub Uuid);

impl SegmentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SegmentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SegmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Wall-clock times are stored as `"HH:MM"`.
mod clock {
    use chrono::NaiveTime;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let text = String::deserialize(deserializer)?;
        super::parse_clock(&text).ok_or_else(|| D::Error::custom(format!("invalid clock time `{text}`")))
    }

    pub mod option {
        use chrono::NaiveTime;
        use serde::{de::Error, Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            time: &Option<NaiveTime>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match time {
                Some(time) => super::serialize(time, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<NaiveTime>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(text) => super::super::parse_clock(&text)
                    .map(Some)
                    .ok_or_else(|| D::Error::custom(format!("invalid clock time `{text}`"))),
                None => Ok(None),
            }
        }
    }
}

/// Parse `"HH:MM"` or `"HH:MM:SS"`.
pub fn parse_clock(text: &str) -> Option<NaiveTime> {
    let text = text.trim();
    NaiveTime::parse_from_str(text, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M:%S"))
        .ok()
}

/// December 22 of the year of `today`: the worst-case low-sun day.
pub fn default_analysis_date(today: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(today.year(), 12, 22).unwrap_or(today)
}

fn default_start_time() -> NaiveTime {
    NaiveTime::from_hms_opt(10, 0, 0).unwrap_or_default()
}

fn default_end_time() -> NaiveTime {
    NaiveTime::from_hms_opt(16, 0, 0).unwrap_or_default()
}

/// A drawn rooftop or ground field and its layout parameters.
///
/// Heights are feet; spacings and setback are meters; angles are degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSegment {
    pub id: SegmentId,
    pub design_id: DesignId,
    #[serde(default)]
    pub name: String,
    pub geometry: SegmentGeometry,
    /// Square meters, derived from `geometry`.
    #[serde(default)]
    pub area: f64,

    pub surface_height: f64,
    pub racking_height: f64,
    pub parapet_height: f64,
    pub module_azimuth: f64,
    pub module_tilt: f64,

    pub analysis_date: NaiveDate,
    #[serde(with = "clock")]
    pub start_time: NaiveTime,
    #[serde(with = "clock")]
    pub end_time: NaiveTime,
    #[serde(default)]
    pub span_rise: f64,
    #[serde(default)]
    pub gcr: f64,

    pub frame_size_up: u32,
    pub frame_size_wide: u32,
    #[serde(default)]
    pub default_orientation: Orientation,
    pub row_spacing: f64,
    pub module_spacing: f64,
    pub frame_spacing: f64,
    pub setback: f64,
    #[serde(default)]
    pub alignment: Alignment,

    #[serde(default)]
    pub module: Option<ModuleId>,
}

impl FieldSegment {
    /// A new segment with default attributes for a validated geometry.
    pub fn new(design_id: DesignId, geometry: SegmentGeometry) -> DesignResult<Self> {
        geometry.validate()?;
        let today = Utc::now().date_naive();
        let mut segment = Self {
            id: SegmentId::new(),
            design_id,
            name: String::new(),
            area: 0.0,
            geometry,
            surface_height: 10.0,
            racking_height: 0.0,
            parapet_height: 0.0,
            module_azimuth: 180.0,
            module_tilt: 10.0,
            analysis_date: default_analysis_date(today),
            start_time: default_start_time(),
            end_time: default_end_time(),
            span_rise: 0.0,
            gcr: 0.0,
            frame_size_up: 1,
            frame_size_wide: 1,
            default_orientation: Orientation::Landscape,
            row_spacing: 0.5,
            module_spacing: 0.0,
            frame_spacing: 0.0,
            setback: 1.0,
            alignment: Alignment::Center,
            module: None,
        };
        segment.recompute_area();
        Ok(segment)
    }

    pub fn from_ring(design_id: DesignId, ring: Ring) -> DesignResult<Self> {
        Self::new(design_id, SegmentGeometry::Polygon(ring))
    }

    pub fn ring(&self) -> Option<&Ring> {
        self.geometry.ring()
    }

    /// Replace the geometry after validating it; the area follows.
    pub fn set_geometry(&mut self, geometry: SegmentGeometry) -> Result<(), GeometryError> {
        geometry.validate()?;
        self.geometry = geometry;
        self.recompute_area();
        Ok(())
    }

    pub fn recompute_area(&mut self) {
        self.area = self.geometry.area();
    }

    pub fn surface_height_m(&self) -> f64 {
        feet_to_meters(self.surface_height)
    }

    pub fn racking_height_m(&self) -> f64 {
        feet_to_meters(self.racking_height)
    }

    pub fn parapet_height_m(&self) -> f64 {
        feet_to_meters(self.parapet_height)
    }

    /// Surface, racking and parapet stacked, in meters.
    pub fn obstruction_height_m(&self) -> f64 {
        self.surface_height_m() + self.racking_height_m() + self.parapet_height_m()
    }
}

/// Patch fields whose value may itself be absent: a JSON `null` clears the
/// attribute, a missing key leaves it alone.
mod nullable {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

macro_rules! segment_patch {
    ($( $(#[$attr:meta])* $field:ident : $ty:ty ),* $(,)?) => {
        /// Partial update of a segment's attributes; `None` leaves a field untouched.
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        pub struct SegmentPatch {
            $(
                $(#[$attr])*
                #[serde(default, skip_serializing_if = "Option::is_none")]
                pub $field: Option<$ty>,
            )*
        }

        impl SegmentPatch {
            pub fn is_empty(&self) -> bool {
                true $(&& self.$field.is_none())*
            }

            /// Fold a later patch into this one; fields set in `later` win.
            pub fn merge(&mut self, later: SegmentPatch) {
                $(
                    if later.$field.is_some() {
                        self.$field = later.$field;
                    }
                )*
            }

            fn assign(&self, segment: &mut FieldSegment) {
                $(
                    if let Some(value) = &self.$field {
                        segment.$field = value.clone();
                    }
                )*
            }
        }
    };
}

segment_patch! {
    name: String,
    geometry: SegmentGeometry,
    surface_height: f64,
    racking_height: f64,
    parapet_height: f64,
    module_azimuth: f64,
    module_tilt: f64,
    analysis_date: NaiveDate,
    #[serde(with = "clock::option")]
    start_time: NaiveTime,
    #[serde(with = "clock::option")]
    end_time: NaiveTime,
    span_rise: f64,
    gcr: f64,
    frame_size_up: u32,
    frame_size_wide: u32,
    default_orientation: Orientation,
    row_spacing: f64,
    module_spacing: f64,
    frame_spacing: f64,
    setback: f64,
    alignment: Alignment,
    #[serde(deserialize_with = "nullable::deserialize")]
    module: Option<ModuleId>,
}

impl SegmentPatch {
    pub fn geometry(geometry: SegmentGeometry) -> Self {
        Self {
            geometry: Some(geometry),
            ..Self::default()
        }
    }

    /// Validate and apply to `segment`. On error `segment` is left unchanged.
    pub fn apply_to(&self, segment: &mut FieldSegment) -> DesignResult<()> {
        if let Some(geometry) = &self.geometry {
            geometry.validate()?;
        }
        for (field, value) in [
            ("frame_size_up", self.frame_size_up),
            ("frame_size_wide", self.frame_size_wide),
        ] {
            if value == Some(0) {
                return Err(DesignError::InvalidAttribute {
                    field,
                    reason: "must be at least 1".into(),
                });
            }
        }
        for (field, value) in [
            ("surface_height", self.surface_height),
            ("racking_height", self.racking_height),
            ("parapet_height", self.parapet_height),
            ("module_azimuth", self.module_azimuth),
            ("module_tilt", self.module_tilt),
            ("row_spacing", self.row_spacing),
            ("module_spacing", self.module_spacing),
            ("frame_spacing", self.frame_spacing),
            ("setback", self.setback),
        ] {
            if value.is_some_and(|v| !v.is_finite()) {
                return Err(DesignError::InvalidAttribute {
                    field,
                    reason: "must be a finite number".into(),
                });
            }
        }

        self.assign(segment);
        if self.geometry.is_some() {
            segment.recompute_area();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_api::Vec2D;

    fn square() -> Ring {
        Ring::new(vec![
            Vec2D::new(0.0, 0.0),
            Vec2D::new(6.0, 0.0),
            Vec2D::new(6.0, 6.0),
            Vec2D::new(0.0, 6.0),
        ])
        .unwrap()
    }

    #[test]
    fn new_segment_has_defaults_and_area() {
        let segment = FieldSegment::from_ring(DesignId::new(), square()).unwrap();
        assert_eq!(segment.area, 36.0);
        assert_eq!(segment.analysis_date.month(), 12);
        assert_eq!(segment.analysis_date.day(), 22);
        assert_eq!(segment.start_time, NaiveTime::from_hms_opt(10, 0, 0).unwrap());
        assert_eq!(segment.end_time, NaiveTime::from_hms_opt(16, 0, 0).unwrap());
        assert!(segment.module.is_none());
    }

    #[test]
    fn heights_convert_to_meters() {
        let mut segment = FieldSegment::from_ring(DesignId::new(), square()).unwrap();
        segment.surface_height = 10.0;
        segment.racking_height = 2.0;
        segment.parapet_height = 3.0;
        assert!((segment.obstruction_height_m() - 4.572).abs() < 1e-9);
    }

    #[test]
    fn clock_times_serialize_as_hours_and_minutes() {
        let segment = FieldSegment::from_ring(DesignId::new(), square()).unwrap();
        let json = serde_json::to_value(&segment).unwrap();
        assert_eq!(json["start_time"], "10:00");
        assert_eq!(json["end_time"], "16:00");
        assert_eq!(parse_clock("09:30:15"), NaiveTime::from_hms_opt(9, 30, 15));
        assert_eq!(parse_clock("noon"), None);
    }

    #[test]
    fn patch_updates_geometry_and_area() {
        let mut segment = FieldSegment::from_ring(DesignId::new(), square()).unwrap();
        let bigger = Ring::new(vec![
            Vec2D::new(0.0, 0.0),
            Vec2D::new(10.0, 0.0),
            Vec2D::new(10.0, 10.0),
        ])
        .unwrap();
        SegmentPatch::geometry(SegmentGeometry::Polygon(bigger))
            .apply_to(&mut segment)
            .unwrap();
        assert_eq!(segment.area, 50.0);
    }

    #[test]
    fn invalid_patch_leaves_segment_untouched() {
        let mut segment = FieldSegment::from_ring(DesignId::new(), square()).unwrap();
        let before = segment.clone();
        let patch = SegmentPatch {
            setback: Some(2.0),
            frame_size_up: Some(0),
            ..SegmentPatch::default()
        };
        assert!(matches!(
            patch.apply_to(&mut segment),
            Err(DesignError::InvalidAttribute { field: "frame_size_up", .. })
        ));
        assert_eq!(segment, before);
    }

    #[test]
    fn null_module_in_json_clears_it() {
        let mut segment = FieldSegment::from_ring(DesignId::new(), square()).unwrap();
        segment.module = Some(ModuleId::new());

        let untouched: SegmentPatch = serde_json::from_str(r#"{ "setback": 2.0 }"#).unwrap();
        assert_eq!(untouched.module, None);
        untouched.apply_to(&mut segment).unwrap();
        assert!(segment.module.is_some());

        let cleared: SegmentPatch = serde_json::from_str(r#"{ "module": null }"#).unwrap();
        assert_eq!(cleared.module, Some(None));
        let json = serde_json::to_value(&cleared).unwrap();
        assert!(json.as_object().unwrap().contains_key("module"));
        assert!(json["module"].is_null());
        assert_eq!(serde_json::from_value::<SegmentPatch>(json).unwrap(), cleared);

        cleared.apply_to(&mut segment).unwrap();
        assert!(segment.module.is_none());
    }

    #[test]
    fn later_patches_win_when_merged() {
        let mut first = SegmentPatch {
            setback: Some(1.0),
            module_tilt: Some(5.0),
            ..SegmentPatch::default()
        };
        first.merge(SegmentPatch {
            setback: Some(2.5),
            ..SegmentPatch::default()
        });
        assert_eq!(first.setback, Some(2.5));
        assert_eq!(first.module_tilt, Some(5.0));
        assert!(!first.is_empty());
        assert!(SegmentPatch::default().is_empty());
    }
}
