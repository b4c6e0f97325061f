//! JSON configuration for the targeting pipeline.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use hub_targets_classify::{ClassifierParams, LockPolicy};
use hub_targets_core::{DistanceParams, MIN_POLYGON_POINTS};
use serde::{Deserialize, Serialize};

use crate::PipelineError;

#[derive(thiserror::Error, Debug)]
pub enum ConfigIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Hue/saturation/luminance ranges handed to the contour extractor as-is.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HslThresholds {
    pub hue: [f64; 2],
    pub saturation: [f64; 2],
    pub luminance: [f64; 2],
}

impl Default for HslThresholds {
    fn default() -> Self {
        Self {
            hue: [44.0, 91.0],
            saturation: [204.0, 255.0],
            luminance: [28.0, 193.0],
        }
    }
}

/// Capture resolution and rate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for ImageSize {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            fps: 30,
        }
    }
}

/// Driver-specific camera settings. Passed through to the camera untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CameraSettings(BTreeMap<String, serde_json::Value>);

impl CameraSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.0.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Which camera feeds the pipeline and how it is exposed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub name: String,
    /// Manual exposure; a negative value selects auto exposure.
    pub exposure: i32,
    pub settings: CameraSettings,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            name: "Shooter".to_string(),
            exposure: 100,
            settings: CameraSettings::default(),
        }
    }
}

fn default_viewing_angle() -> f64 {
    -15.0
}

fn default_poll_interval_ms() -> u64 {
    300
}

fn default_source_retry_ms() -> u64 {
    100
}

fn default_telemetry_queue() -> usize {
    64
}

fn default_min_contour_points() -> usize {
    MIN_POLYGON_POINTS
}

/// Complete pipeline configuration. Every section is optional in JSON.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub image: ImageSize,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub thresholds: HslThresholds,
    #[serde(default)]
    pub distance: DistanceParams,
    #[serde(default)]
    pub classifier: ClassifierParams,
    #[serde(default)]
    pub lock: LockPolicy,
    /// Viewing angle used when the extractor reports none, degrees.
    #[serde(default = "default_viewing_angle")]
    pub viewing_angle_deg: f64,
    #[serde(default = "default_min_contour_points")]
    pub min_contour_points: usize,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_source_retry_ms")]
    pub source_retry_ms: u64,
    #[serde(default = "default_telemetry_queue")]
    pub telemetry_queue: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            image: ImageSize::default(),
            camera: CameraConfig::default(),
            thresholds: HslThresholds::default(),
            distance: DistanceParams::default(),
            classifier: ClassifierParams::default(),
            lock: LockPolicy::default(),
            viewing_angle_deg: default_viewing_angle(),
            min_contour_points: default_min_contour_points(),
            poll_interval_ms: default_poll_interval_ms(),
            source_retry_ms: default_source_retry_ms(),
            telemetry_queue: default_telemetry_queue(),
        }
    }
}

impl PipelineConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Check every calibration constant; called before any frame is processed.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.image.width == 0 || self.image.height == 0 {
            return Err(PipelineError::InvalidImageSize {
                width: self.image.width,
                height: self.image.height,
            });
        }
        if self.poll_interval_ms == 0 {
            return Err(PipelineError::InvalidPollInterval);
        }
        if !self.viewing_angle_deg.is_finite() {
            return Err(PipelineError::InvalidViewingAngle(self.viewing_angle_deg));
        }
        self.distance.validate()?;
        self.classifier.validate()?;
        self.lock.validate()?;
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn source_retry(&self) -> Duration {
        Duration::from_millis(self.source_retry_ms)
    }
}
