// src/config.rs
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Which physical camera feeds the detector. Front cameras are mirrored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraFacing {
    #[default]
    Front,
    Rear,
}

impl CameraFacing {
    pub fn is_mirrored(self) -> bool {
        matches!(self, CameraFacing::Front)
    }
}

/// Virtual camera the overlay is rendered through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    #[serde(default)]
    pub facing: CameraFacing,
    /// Distance of the camera from the world origin
    #[serde(default = "default_distance")]
    pub distance: f64,
    /// Vertical field of view in degrees
    #[serde(default = "default_fov_deg")]
    pub fov_deg: f64,
    /// Viewport width / height
    #[serde(default = "default_aspect")]
    pub aspect: f64,
    /// World Z the object is placed at
    #[serde(default)]
    pub placement_depth: f64,
}

fn default_distance() -> f64 {
    5.0
}

fn default_fov_deg() -> f64 {
    50.0
}

fn default_aspect() -> f64 {
    16.0 / 9.0
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            facing: CameraFacing::default(),
            distance: default_distance(),
            fov_deg: default_fov_deg(),
            aspect: default_aspect(),
            placement_depth: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// 0 = anchor on the wrist, 1 = anchor on the middle knuckle
    #[serde(default)]
    pub anchor_blend: f64,
    #[serde(default = "default_scale_multiplier")]
    pub scale_multiplier: f64,
    #[serde(default = "default_hysteresis_ms")]
    pub hysteresis_ms: f64,
    #[serde(default = "default_position_blend")]
    pub position_blend: f64,
    #[serde(default = "default_scale_blend")]
    pub scale_blend: f64,
    #[serde(default = "default_orientation_blend")]
    pub orientation_blend: f64,
    /// Squared horizontal length below which the hand counts as vertical
    #[serde(default = "default_vertical_threshold")]
    pub vertical_threshold: f64,
    #[serde(default)]
    pub camera: CameraConfig,
}

fn default_scale_multiplier() -> f64 {
    12.0
}

fn default_hysteresis_ms() -> f64 {
    50.0
}

fn default_position_blend() -> f64 {
    0.2
}

fn default_scale_blend() -> f64 {
    0.1
}

fn default_orientation_blend() -> f64 {
    0.15
}

fn default_vertical_threshold() -> f64 {
    0.01
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            anchor_blend: 0.0,
            scale_multiplier: default_scale_multiplier(),
            hysteresis_ms: default_hysteresis_ms(),
            position_blend: default_position_blend(),
            scale_blend: default_scale_blend(),
            orientation_blend: default_orientation_blend(),
            vertical_threshold: default_vertical_threshold(),
            camera: CameraConfig::default(),
        }
    }
}

impl TrackerConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: TrackerConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Falls back to defaults when the file is missing or unreadable.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => {
                info!("Loaded tracker config from {}", path.display());
                config
            }
            Err(e) => {
                warn!("Using default tracker config ({}): {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check("anchor_blend", self.anchor_blend, |v| (0.0..=1.0).contains(&v))?;
        check("scale_multiplier", self.scale_multiplier, |v| v >= 0.0)?;
        check("hysteresis_ms", self.hysteresis_ms, |v| v >= 0.0)?;
        check("position_blend", self.position_blend, unit_interval)?;
        check("scale_blend", self.scale_blend, unit_interval)?;
        check("orientation_blend", self.orientation_blend, unit_interval)?;
        check("vertical_threshold", self.vertical_threshold, |v| v >= 0.0)?;
        check("camera.distance", self.camera.distance, |v| v > 0.0)?;
        check("camera.fov_deg", self.camera.fov_deg, |v| v > 0.0 && v < 180.0)?;
        check("camera.aspect", self.camera.aspect, |v| v > 0.0)?;
        check("camera.placement_depth", self.camera.placement_depth, |_| true)?;
        Ok(())
    }
}

fn unit_interval(v: f64) -> bool {
    v > 0.0 && v <= 1.0
}

fn check(field: &'static str, value: f64, ok: impl Fn(f64) -> bool) -> Result<(), ConfigError> {
    if value.is_finite() && ok(value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange { field, value })
    }
}
