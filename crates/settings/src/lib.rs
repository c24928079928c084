use directories::ProjectDirs;
use kernel_api::{SamplingResolution, SiteLocation, UnitSystem};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    io::BufReader,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;
use tracing::warn;

const QUALIFIER: &str = "com";
const ORGANIZATION: &str = "solarlayout";
const APPLICATION: &str = "solarlayout";
const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("unable to resolve platform config directory")]
    MissingProjectDirs,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid settings file: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesignerSettings {
    pub drawing: DrawingSettings,
    pub shadows: ShadowSettings,
    pub autosave: AutoSaveSettings,
    pub units: UnitSystem,
    /// Site used for designs that carry no location of their own.
    pub site: SiteLocation,
}

/// Pointer behaviour of the draw and edit tools
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawingSettings {
    /// Screen radius in pixels for closing and vertex snaps
    pub snap_px: f64,
}

impl Default for DrawingSettings {
    fn default() -> Self {
        Self { snap_px: 10.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowSettings {
    pub enabled: bool,
    /// Minutes between sampled sun positions (1 = every minute)
    pub sampling_minutes: u32,
    /// Fill opacity of the aggregated shadow layer (0.0 - 1.0)
    pub fill_opacity: f32,
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            sampling_minutes: 1,
            fill_opacity: 0.35,
        }
    }
}

impl ShadowSettings {
    pub fn resolution(&self) -> SamplingResolution {
        SamplingResolution::minutes(self.sampling_minutes)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoSaveSettings {
    /// Quiet period after the last attribute edit before it is written
    pub debounce_ms: u64,
}

impl Default for AutoSaveSettings {
    fn default() -> Self {
        Self { debounce_ms: 1500 }
    }
}

impl AutoSaveSettings {
    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new() -> Result<Self, SettingsError> {
        let dirs = ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION)
            .ok_or(SettingsError::MissingProjectDirs)?;
        let config_dir = dirs.config_dir();
        fs::create_dir_all(config_dir)?;
        let path = config_dir.join(SETTINGS_FILE);
        Ok(Self { path })
    }

    /// Store backed by an explicit file instead of the platform config dir.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self) -> Result<DesignerSettings, SettingsError> {
        if !self.path.exists() {
            return Ok(DesignerSettings::default());
        }
        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let settings = serde_json::from_reader(reader)?;
        Ok(settings)
    }

    /// Like [`SettingsStore::load`], but a broken file yields the defaults.
    pub fn load_or_default(&self) -> DesignerSettings {
        self.load().unwrap_or_else(|err| {
            warn!(
                "Failed to load settings from {}: {}; using defaults",
                self.path.display(),
                err
            );
            DesignerSettings::default()
        })
    }

    pub fn save(&self, settings: &DesignerSettings) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(&self.path)?;
        serde_json::to_writer_pretty(file, settings)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_file() -> PathBuf {
        std::env::temp_dir()
            .join(format!("solarlayout-settings-{}", uuid::Uuid::new_v4()))
            .join(SETTINGS_FILE)
    }

    #[test]
    fn missing_file_gives_defaults() {
        let store = SettingsStore::at(scratch_file());
        let settings = store.load().unwrap();
        assert_eq!(settings, DesignerSettings::default());
        assert_eq!(settings.drawing.snap_px, 10.0);
        assert_eq!(settings.autosave.quiet_period(), Duration::from_millis(1500));
        assert_eq!(settings.shadows.resolution().step_minutes(), 1);
    }

    #[test]
    fn save_then_load() {
        let store = SettingsStore::at(scratch_file());
        let mut settings = DesignerSettings::default();
        settings.units = UnitSystem::Metric;
        settings.shadows.sampling_minutes = 15;
        settings.site.utc_offset_minutes = Some(-420);
        store.save(&settings).unwrap();
        assert_eq!(store.load().unwrap(), settings);
    }

    #[test]
    fn partial_files_fill_in_defaults() {
        let path = scratch_file();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, r#"{ "drawing": { "snap_px": 14.0 } }"#).unwrap();
        let settings = SettingsStore::at(&path).load().unwrap();
        assert_eq!(settings.drawing.snap_px, 14.0);
        assert_eq!(settings.autosave.debounce_ms, 1500);
    }

    #[test]
    fn broken_files_fall_back() {
        let path = scratch_file();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{ not json").unwrap();
        let store = SettingsStore::at(&path);
        assert!(matches!(store.load(), Err(SettingsError::Json(_))));
        assert_eq!(store.load_or_default(), DesignerSettings::default());
    }
}
