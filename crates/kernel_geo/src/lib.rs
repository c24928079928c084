pub mod convert;
pub mod extrude;
pub mod packer;
pub mod shadow;
pub mod sun;

use kernel_api::{
    InstantShadow, KernelError, KernelResult, LayoutKernel, LayoutRequest, PackedLayout, Ring,
    ShadowInterval, ShadowRequest, SunPosition, SunPositionProvider, WallQuad,
};
use tracing::info;

pub use sun::NoaaSunProvider;

/// Planar geometry kernel backed by the `geo` boolean and buffer operations.
pub struct GeoKernel {
    sun: Box<dyn SunPositionProvider>,
}

impl Default for GeoKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl GeoKernel {
    pub fn new() -> Self {
        Self::with_sun_provider(Box::new(NoaaSunProvider))
    }

    pub fn with_sun_provider(sun: Box<dyn SunPositionProvider>) -> Self {
        info!("Initializing geo layout kernel");
        Self { sun }
    }

    pub fn sun_provider(&self) -> &dyn SunPositionProvider {
        self.sun.as_ref()
    }
}

impl LayoutKernel for GeoKernel {
    fn name(&self) -> &str {
        "geo"
    }

    fn extrude(&self, ring: &Ring, surface_height_m: f64, parapet_height_m: f64) -> Vec<WallQuad> {
        extrude::build_walls(ring, surface_height_m, parapet_height_m)
    }

    fn instant_shadow(&self, ring: &Ring, height_m: f64, sun: SunPosition) -> Option<InstantShadow> {
        shadow::project_instant(ring, height_m, sun)
    }

    fn shadow_interval(&self, request: &ShadowRequest) -> KernelResult<ShadowInterval> {
        request.ring.validate()?;
        if !request.obstruction_height_m.is_finite() {
            return Err(KernelError::InvalidInput(format!(
                "obstruction height {} is not finite",
                request.obstruction_height_m
            )));
        }
        Ok(shadow::aggregate_interval(request, self.sun.as_ref()))
    }

    fn pack_modules(&self, request: &LayoutRequest) -> KernelResult<PackedLayout> {
        packer::pack(request)
    }
}
