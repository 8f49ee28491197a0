// src/config.rs - Application configuration, persisted as JSON
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, TryOnError};
use crate::mediapipe_bridge::{Delegate, LandmarkerOptions};
use crate::tracking::TrackingConfig;
use crate::video::FacingMode;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub landmarker: LandmarkerSettings,
    pub camera: CameraSettings,
    pub tracking: TrackingConfig,
    /// JSON product list supplied by the storefront export.
    pub catalog_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LandmarkerSettings {
    pub python: PathBuf,
    pub script: PathBuf,
    pub model_asset_path: PathBuf,
    pub delegate: Delegate,
    pub min_confidence: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub front_index: u32,
    pub rear_index: u32,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub initial_facing: FacingMode,
    pub mirror_front: bool,
}

impl Default for LandmarkerSettings {
    fn default() -> Self {
        Self {
            python: PathBuf::from(".venv/bin/python"),
            script: PathBuf::from("scripts/hand_landmarker.py"),
            model_asset_path: PathBuf::from("models/hand_landmarker.task"),
            delegate: Delegate::Gpu,
            min_confidence: 0.5,
        }
    }
}

impl LandmarkerSettings {
    pub fn options(&self) -> LandmarkerOptions {
        LandmarkerOptions {
            python: self.python.clone(),
            script: self.script.clone(),
            model_asset_path: self.model_asset_path.clone(),
            delegate: self.delegate,
            min_confidence: self.min_confidence,
        }
    }
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            front_index: 0,
            rear_index: 1,
            width: 640,
            height: 480,
            fps: 30,
            initial_facing: FacingMode::User,
            mirror_front: true,
        }
    }
}

impl CameraSettings {
    pub fn device_index(&self, facing: FacingMode) -> u32 {
        match facing {
            FacingMode::User => self.front_index,
            FacingMode::Environment => self.rear_index,
        }
    }
}

impl AppConfig {
    const FILE_NAME: &'static str = "config.json";

    /// Platform config location, e.g. `~/.config/ringtryon/config.json`.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "ringtryon", "RingTryOn")
            .map(|dirs| dirs.config_dir().join(Self::FILE_NAME))
            .unwrap_or_else(|| PathBuf::from(Self::FILE_NAME))
    }

    /// Loads the config, falling back to defaults if the file is missing or
    /// unreadable, and writes the result back so new fields show up.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let content = fs::read_to_string(path)?;
            match serde_json::from_str::<AppConfig>(&content) {
                Ok(config) => {
                    info!("Loaded configuration from {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("Error parsing config {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            }
        } else {
            info!("Configuration file not found. Creating default at {}", path.display());
            Self::default()
        };

        config.validate()?;
        if let Err(e) = config.save(path) {
            warn!("Could not write configuration to {}: {}", path.display(), e);
        }
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(TryOnError::Config("camera resolution must be non-zero".into()));
        }
        let width_scale = self.tracking.geometry.width_scale;
        if !width_scale.is_finite() || width_scale <= 0.0 {
            return Err(TryOnError::Config("tracking.geometry.width_scale must be positive".into()));
        }
        if !(0.0..1.0).contains(&self.tracking.smoothing) {
            return Err(TryOnError::Config("tracking.smoothing must be in [0, 1)".into()));
        }
        if !self.tracking.jitter.is_valid() {
            return Err(TryOnError::Config("tracking.jitter bounds must be non-negative".into()));
        }
        if !(0.0..=1.0).contains(&self.landmarker.min_confidence) {
            return Err(TryOnError::Config("landmarker.min_confidence must be in [0, 1]".into()));
        }
        Ok(())
    }
}
