//! Engine configuration, loaded from and saved to a TOML file.

use crate::audio::{DistanceModel, GraphSettings, LimiterSettings};
use crate::engine::EngineOptions;
use crate::error::Error;
use crate::scene::{EmitterPositions, ListenerPose, DEFAULT_AMBIENT_FILE};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory or URL holding one sub-directory per scene
    pub asset_root: String,

    /// Ambient filename used when a scene does not name one
    pub ambient_file: String,

    /// Render rate until the output device reports its own
    pub sample_rate: u32,

    pub master_level: f32,
    pub ambient_level: f32,
    pub dialog_level: f32,

    /// Segments fetched ahead when a scene loads
    pub preload_count: usize,

    /// Progress event period in milliseconds, 0 disables
    pub progress_interval_ms: u64,

    /// Where the listener starts when a scene has no start pose of its own
    pub listener_start: ListenerPose,

    /// Ear height above the floor, in scene units
    pub listener_height: f32,

    /// Emitter positions for scenes that don't place their speakers
    pub emitters: EmitterPositions,

    /// Preferred audio output device (empty string means system default)
    pub output_device: String,

    pub distance: DistanceModel,
    pub limiter: LimiterSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            asset_root: "assets/interviews".to_string(),
            ambient_file: DEFAULT_AMBIENT_FILE.to_string(),
            sample_rate: 48000,
            master_level: 0.8,
            ambient_level: 0.25,
            dialog_level: 0.7,
            preload_count: 3,
            progress_interval_ms: 250,
            listener_start: ListenerPose::new(0.0, 4.0, 0.0),
            listener_height: 1.7,
            emitters: EmitterPositions::default(),
            output_device: "".to_string(),
            distance: DistanceModel::default(),
            limiter: LimiterSettings::default(),
        }
    }
}

impl EngineConfig {
    /// Base path of a scene's assets, always ending in `/`.
    pub fn scene_base_path(&self, scene_id: &str) -> String {
        let root = self.asset_root.trim_end_matches('/');
        if root.is_empty() {
            format!("{}/", scene_id)
        } else {
            format!("{}/{}/", root, scene_id)
        }
    }

    pub fn output_device(&self) -> Option<&str> {
        Some(self.output_device.as_str()).filter(|name| !name.is_empty())
    }

    pub fn graph_settings(&self) -> GraphSettings {
        GraphSettings {
            sample_rate: self.sample_rate,
            master_gain: self.master_level,
            ambient_gain: self.ambient_level,
            dialog_gain: self.dialog_level,
            listener_height: self.listener_height,
            emitters: self.emitters,
            limiter: self.limiter,
        }
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            preload_count: self.preload_count,
            progress_interval: (self.progress_interval_ms > 0)
                .then(|| Duration::from_millis(self.progress_interval_ms)),
        }
    }
}

/// Configuration manager
pub struct ConfigManager {
    config: EngineConfig,
    config_file: PathBuf,
}

impl ConfigManager {
    /// Load from the user's config directory, falling back to defaults
    pub fn new() -> Result<Self, Error> {
        let mut config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Failed to determine config directory".to_string()))?;
        config_dir.push("reportage");

        Self::with_file(config_dir.join("config.toml"))
    }

    /// Create a ConfigManager backed by a specific file
    pub fn with_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let config_file = path.as_ref().to_path_buf();
        let config = if config_file.exists() {
            Self::load_from_file(&config_file)?
        } else {
            debug!("Config file {:?} not found, using defaults", config_file);
            EngineConfig::default()
        };

        Ok(Self {
            config,
            config_file,
        })
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<EngineConfig, Error> {
        let contents = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))
    }

    /// Save the configuration, creating the directory if needed
    pub fn save(&self) -> Result<(), Error> {
        let toml = toml::to_string_pretty(&self.config)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = self.config_file.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    Error::Config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        fs::write(&self.config_file, toml)
            .map_err(|e| Error::Config(format!("Failed to write config file: {}", e)))?;

        debug!("Saved config to {:?}", self.config_file);
        Ok(())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut EngineConfig {
        &mut self.config
    }

    pub fn path(&self) -> &Path {
        &self.config_file
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.sample_rate, 48000);
        assert_eq!(config.preload_count, 3);
        assert_eq!(config.listener_start, ListenerPose::new(0.0, 4.0, 0.0));
        assert_eq!(config.output_device(), None);
        assert_eq!(config.distance.rolloff, 1.5);
        assert_eq!(config.limiter.threshold_db, -6.0);
    }

    #[test]
    fn base_paths_end_with_a_slash() {
        let mut config = EngineConfig::default();
        assert_eq!(
            config.scene_base_path("interview_1"),
            "assets/interviews/interview_1/"
        );

        config.asset_root = "https://cdn.example.org/interviews/".to_string();
        assert_eq!(
            config.scene_base_path("interview_2"),
            "https://cdn.example.org/interviews/interview_2/"
        );
    }

    #[test]
    fn zero_interval_disables_progress() {
        let mut config = EngineConfig::default();
        assert_eq!(
            config.engine_options().progress_interval,
            Some(Duration::from_millis(250))
        );
        config.progress_interval_ms = 0;
        assert_eq!(config.engine_options().progress_interval, None);
    }

    #[test]
    fn save_and_load() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let mut manager = ConfigManager::with_file(&config_path).unwrap();
        manager.config_mut().asset_root = "/srv/audio".to_string();
        manager.config_mut().output_device = "Headphones".to_string();
        manager.config_mut().emitters.a.x = -5.0;
        manager.save().unwrap();
        assert!(config_path.exists());

        let loaded = ConfigManager::with_file(&config_path).unwrap();
        assert_eq!(loaded.config().asset_root, "/srv/audio");
        assert_eq!(loaded.config().output_device(), Some("Headphones"));
        assert_eq!(loaded.config().emitters.a.x, -5.0);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, "dialog_level = 0.9\n[distance]\nrolloff = 2.0\n").unwrap();

        let config = ConfigManager::with_file(&config_path).unwrap();
        assert_eq!(config.config().dialog_level, 0.9);
        assert_eq!(config.config().distance.rolloff, 2.0);
        assert_eq!(config.config().distance.max_distance, 50.0);
        assert_eq!(config.config().ambient_level, 0.25);
    }

    #[test]
    fn file_not_found_uses_defaults() {
        let temp_dir = tempdir().unwrap();
        let config = ConfigManager::with_file(temp_dir.path().join("nonexistent.toml")).unwrap();
        assert_eq!(config.config(), &EngineConfig::default());
    }

    #[test]
    fn broken_file_is_a_config_error() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, "sample_rate = \"fast\"").unwrap();

        assert!(matches!(
            ConfigManager::with_file(&config_path),
            Err(Error::Config(_))
        ));
    }
}
