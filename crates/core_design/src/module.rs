//! Solar module catalog and the physical-size resolver used by the packer.

use kernel_api::ModuleDimensions;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

use crate::store::{StoreError, StoreResult};

/// Used when nothing else is known about a module.
pub const FALLBACK_DIMENSIONS: ModuleDimensions = ModuleDimensions::new(1.1, 1.7);

/// Height over width assumed when only the area is known.
pub const ASSUMED_ASPECT_RATIO: f64 = 1.66;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleId(pub Uuid);

impl ModuleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ModuleId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ModuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A module as parsed from its datasheet. Any physical field may be missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub id: ModuleId,
    pub manufacturer: String,
    pub model: String,
    #[serde(default)]
    pub width_m: Option<f64>,
    #[serde(default)]
    pub height_m: Option<f64>,
    #[serde(default)]
    pub area_m2: Option<f64>,
    /// Nameplate power in watts.
    #[serde(default)]
    pub power_w: Option<f64>,
}

impl Module {
    pub fn new(manufacturer: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: ModuleId::new(),
            manufacturer: manufacturer.into(),
            model: model.into(),
            width_m: None,
            height_m: None,
            area_m2: None,
            power_w: None,
        }
    }

    pub fn with_dimensions(mut self, width_m: f64, height_m: f64) -> Self {
        self.width_m = Some(width_m);
        self.height_m = Some(height_m);
        self
    }

    pub fn with_area(mut self, area_m2: f64) -> Self {
        self.area_m2 = Some(area_m2);
        self
    }

    pub fn with_power(mut self, power_w: f64) -> Self {
        self.power_w = Some(power_w);
        self
    }
}

/// Read access to the module catalog plus deletion.
pub trait ModuleCatalog: Send {
    fn list(&self) -> StoreResult<Vec<Module>>;
    fn get(&self, id: ModuleId) -> StoreResult<Module>;
    fn insert(&mut self, module: Module) -> StoreResult<()>;
    fn delete(&mut self, id: ModuleId) -> StoreResult<Module>;
}

/// In-memory catalog.
#[derive(Debug, Default, Clone)]
pub struct StaticCatalog {
    modules: Vec<Module>,
}

impl StaticCatalog {
    pub fn new(modules: Vec<Module>) -> Self {
        Self { modules }
    }
}

impl ModuleCatalog for StaticCatalog {
    fn list(&self) -> StoreResult<Vec<Module>> {
        Ok(self.modules.clone())
    }

    fn get(&self, id: ModuleId) -> StoreResult<Module> {
        self.modules
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or(StoreError::ModuleNotFound(id))
    }

    fn insert(&mut self, module: Module) -> StoreResult<()> {
        self.modules.retain(|m| m.id != module.id);
        self.modules.push(module);
        Ok(())
    }

    fn delete(&mut self, id: ModuleId) -> StoreResult<Module> {
        let index = self
            .modules
            .iter()
            .position(|m| m.id == id)
            .ok_or(StoreError::ModuleNotFound(id))?;
        Ok(self.modules.remove(index))
    }
}

/// Common module formats keyed by a model-name fragment.
static KNOWN_MODELS: Lazy<Vec<(&'static str, ModuleDimensions)>> = Lazy::new(|| {
    vec![
        ("144", ModuleDimensions::new(1.134, 2.278)),
        ("108", ModuleDimensions::new(1.134, 1.722)),
        ("72", ModuleDimensions::new(0.992, 1.960)),
        ("60", ModuleDimensions::new(0.992, 1.650)),
    ]
});

fn usable(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > 0.0)
}

/// Resolve the physical size of `module`. Never fails.
///
/// Explicit dimensions win, then a known model in the name, then the area
/// with an assumed aspect ratio, then [`FALLBACK_DIMENSIONS`].
pub fn resolve_dimensions(module: &Module) -> ModuleDimensions {
    if let (Some(width), Some(height)) = (usable(module.width_m), usable(module.height_m)) {
        return ModuleDimensions::new(width, height);
    }
    let model = module.model.to_ascii_lowercase();
    if let Some((_, dims)) = KNOWN_MODELS.iter().find(|(key, _)| model.contains(key)) {
        return *dims;
    }
    if let Some(area) = usable(module.area_m2) {
        let width = (area / ASSUMED_ASPECT_RATIO).sqrt();
        return ModuleDimensions::new(width, width * ASSUMED_ASPECT_RATIO);
    }
    FALLBACK_DIMENSIONS
}

/// Lazily filled per-module dimension cache. Entries live for the session.
#[derive(Debug, Default)]
pub struct DimensionCache {
    entries: HashMap<ModuleId, ModuleDimensions>,
}

impl DimensionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dimensions(&mut self, catalog: &dyn ModuleCatalog, id: ModuleId) -> ModuleDimensions {
        if let Some(dims) = self.entries.get(&id) {
            return *dims;
        }
        let dims = match catalog.get(id) {
            Ok(module) => resolve_dimensions(&module),
            Err(err) => {
                debug!("module {id} unavailable ({err}), using fallback size");
                FALLBACK_DIMENSIONS
            }
        };
        self.entries.insert(id, dims);
        dims
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_dimensions_win() {
        let module = Module::new("Acme", "AC-72-400").with_dimensions(1.0, 2.0);
        assert_eq!(resolve_dimensions(&module), ModuleDimensions::new(1.0, 2.0));
    }

    #[test]
    fn known_models_are_recognized() {
        let module = Module::new("Acme", "AC-72-400");
        assert_eq!(resolve_dimensions(&module), ModuleDimensions::new(0.992, 1.960));
        let half_cut = Module::new("Acme", "HC108M");
        assert_eq!(resolve_dimensions(&half_cut), ModuleDimensions::new(1.134, 1.722));
    }

    #[test]
    fn area_is_split_with_the_assumed_aspect() {
        let module = Module::new("Acme", "Custom").with_area(1.66);
        let dims = resolve_dimensions(&module);
        assert!((dims.width - 1.0).abs() < 1e-12);
        assert!((dims.height - 1.66).abs() < 1e-12);
    }

    #[test]
    fn garbage_falls_back_to_the_default_size() {
        let mut module = Module::new("Acme", "Custom").with_area(f64::NAN);
        module.width_m = Some(-1.0);
        assert_eq!(resolve_dimensions(&module), FALLBACK_DIMENSIONS);
    }

    #[test]
    fn cache_is_filled_once_and_kept() {
        let module = Module::new("Acme", "Custom").with_dimensions(1.0, 1.5);
        let id = module.id;
        let mut catalog = StaticCatalog::new(vec![module]);
        let mut cache = DimensionCache::new();
        assert_eq!(cache.dimensions(&catalog, id), ModuleDimensions::new(1.0, 1.5));
        catalog.delete(id).unwrap();
        assert_eq!(cache.dimensions(&catalog, id), ModuleDimensions::new(1.0, 1.5));
        assert_eq!(cache.dimensions(&catalog, ModuleId::new()), FALLBACK_DIMENSIONS);
        assert_eq!(cache.len(), 2);
    }
}
