use serde::{Deserialize, Serialize};

use crate::ProfileError;

/// Physical size of one reflective strip. Units only need to agree.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TargetDimensions {
    pub height: f64,
    pub width: f64,
}

impl Default for TargetDimensions {
    fn default() -> Self {
        Self {
            height: 5.5,
            width: 2.0,
        }
    }
}

/// Classifier calibration, as measured on the field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierParams {
    pub dimensions: TargetDimensions,
    /// Fractional aspect-ratio tolerance, e.g. `0.2` for +/-20 %.
    pub aspect_tolerance: f64,
    /// Nominal tilt of the low-angle strip, degrees.
    pub low_angle_deg: f64,
    /// Nominal tilt of the high-angle strip, degrees.
    pub high_angle_deg: f64,
    /// Half-width of each angle window, degrees.
    pub angle_tolerance_deg: f64,
}

impl Default for ClassifierParams {
    fn default() -> Self {
        Self {
            dimensions: TargetDimensions::default(),
            aspect_tolerance: 0.20,
            low_angle_deg: -15.0,
            high_angle_deg: -75.0,
            angle_tolerance_deg: 10.0,
        }
    }
}

impl ClassifierParams {
    pub fn validate(&self) -> Result<(), ProfileError> {
        let TargetDimensions { height, width } = self.dimensions;
        if !(height.is_finite() && width.is_finite() && height > 0.0 && width > 0.0) {
            return Err(ProfileError::InvalidDimensions { height, width });
        }
        if !(self.aspect_tolerance > 0.0 && self.aspect_tolerance < 1.0) {
            return Err(ProfileError::InvalidAspectTolerance(self.aspect_tolerance));
        }
        if !(self.angle_tolerance_deg.is_finite() && self.angle_tolerance_deg > 0.0) {
            return Err(ProfileError::InvalidAngleTolerance(
                self.angle_tolerance_deg,
            ));
        }
        for angle in [self.low_angle_deg, self.high_angle_deg] {
            if !angle.is_finite() {
                return Err(ProfileError::InvalidAngle(angle));
            }
        }
        Ok(())
    }
}

/// How many consecutive matching frames promote `Acquiring` to `Locked`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockPolicy {
    pub frames_to_lock: u32,
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self { frames_to_lock: 3 }
    }
}

impl LockPolicy {
    pub fn validate(&self) -> Result<(), ProfileError> {
        // One success always lands in Acquiring, so locking needs a second.
        if self.frames_to_lock < 2 {
            return Err(ProfileError::InvalidLockThreshold(self.frames_to_lock));
        }
        Ok(())
    }
}
