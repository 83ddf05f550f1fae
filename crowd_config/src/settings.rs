//! Compiler behaviour switches.
//!
//! Loaded from `compiler_settings.json` with support for environment variable overrides.

use std::{
    env, fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::Deserialize;
use thiserror::Error;

pub const BUILTIN_COMPILER_SETTINGS: &str = include_str!("data/compiler_settings.json");
pub const SETTINGS_PATH_ENV: &str = "CROWD_COMPILER_SETTINGS_PATH";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CompilerSettings {
    pub references: ReferenceSettings,
    pub scene: SceneSettings,
}

impl CompilerSettings {
    pub fn builtin() -> Arc<Self> {
        Arc::new(
            serde_json::from_str(BUILTIN_COMPILER_SETTINGS)
                .expect("builtin compiler settings should parse"),
        )
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = CompilerSettings::from_json_str(&contents)?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReferenceSettings {
    /// Author `ref:` values that resolve to nothing abort compilation.
    pub strict: bool,
}

impl Default for ReferenceSettings {
    fn default() -> Self {
        Self { strict: true }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SceneSettings {
    /// Relative scene paths are looked up next to the description file.
    pub resolve_relative_to_document: bool,
    /// Out-of-range geometry is clamped into its wire width instead of failing.
    pub clamp_coordinates: bool,
}

impl Default for SceneSettings {
    fn default() -> Self {
        Self {
            resolve_relative_to_document: true,
            clamp_coordinates: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to parse compiler settings: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read compiler settings from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Metadata about the settings source.
#[derive(Debug, Clone)]
pub struct SettingsMetadata {
    path: Option<PathBuf>,
}

impl SettingsMetadata {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }
}

/// Load settings from `CROWD_COMPILER_SETTINGS_PATH`, falling back to the builtin copy.
pub fn load_settings_from_env() -> (Arc<CompilerSettings>, SettingsMetadata) {
    let override_path = env::var(SETTINGS_PATH_ENV).ok().map(PathBuf::from);
    load_settings(override_path.as_deref())
}

/// Load settings from `path` when given, falling back to the builtin copy.
pub fn load_settings(path: Option<&Path>) -> (Arc<CompilerSettings>, SettingsMetadata) {
    if let Some(path) = path {
        match CompilerSettings::from_file(path) {
            Ok(settings) => {
                tracing::info!(
                    target: "crowd_sim::config",
                    path = %path.display(),
                    "settings.loaded=file"
                );
                return (
                    Arc::new(settings),
                    SettingsMetadata::new(Some(path.to_path_buf())),
                );
            }
            Err(err) => {
                tracing::warn!(
                    target: "crowd_sim::config",
                    path = %path.display(),
                    error = %err,
                    "settings.load_failed"
                );
            }
        }
    }

    let settings = CompilerSettings::builtin();
    tracing::info!(target: "crowd_sim::config", "settings.loaded=builtin");
    (settings, SettingsMetadata::new(None))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_matches_defaults() {
        assert_eq!(*CompilerSettings::builtin(), CompilerSettings::default());
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let settings =
            CompilerSettings::from_json_str(r#"{"scene":{"clamp_coordinates":true}}"#).unwrap();
        assert!(settings.scene.clamp_coordinates);
        assert!(settings.scene.resolve_relative_to_document);
        assert!(settings.references.strict);
    }

    #[test]
    fn missing_file_falls_back_to_builtin() {
        let (settings, metadata) = load_settings(Some(Path::new("/no/such/settings.json")));
        assert_eq!(*settings, CompilerSettings::default());
        assert!(metadata.path().is_none());
    }

    #[test]
    fn read_error_names_the_path() {
        let err = CompilerSettings::from_file(Path::new("/no/such/settings.json")).unwrap_err();
        assert!(err.to_string().contains("/no/such/settings.json"));
    }
}
