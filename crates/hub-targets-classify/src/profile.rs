use serde::{Deserialize, Serialize};

use crate::{ClassifierParams, ProfileError};

/// The two strip orientations seen by the camera.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileKind {
    LowAngle,
    HighAngle,
}

impl ProfileKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProfileKind::LowAngle => "low_angle",
            ProfileKind::HighAngle => "high_angle",
        }
    }
}

/// Expected apparent geometry of one strip at one viewing angle.
///
/// Aspect ratios are box height over box width in image space. The
/// high-angle strip lies almost flat in the image, so its expected ratio is
/// the physical width over height.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TargetProfile {
    pub kind: ProfileKind,
    pub expected_ratio: f64,
    pub ratio_tolerance: f64,
    pub angle_deg: f64,
    pub angle_tolerance_deg: f64,
}

impl TargetProfile {
    /// Build both profiles from validated calibration.
    pub fn pair_from_params(params: &ClassifierParams) -> Result<[TargetProfile; 2], ProfileError> {
        params.validate()?;
        let dims = params.dimensions;
        let low = TargetProfile {
            kind: ProfileKind::LowAngle,
            expected_ratio: dims.height / dims.width,
            ratio_tolerance: params.aspect_tolerance,
            angle_deg: params.low_angle_deg,
            angle_tolerance_deg: params.angle_tolerance_deg,
        };
        let high = TargetProfile {
            kind: ProfileKind::HighAngle,
            expected_ratio: dims.width / dims.height,
            ratio_tolerance: params.aspect_tolerance,
            angle_deg: params.high_angle_deg,
            angle_tolerance_deg: params.angle_tolerance_deg,
        };
        Ok([low, high])
    }

    #[inline]
    pub fn min_ratio(&self) -> f64 {
        self.expected_ratio - self.expected_ratio * self.ratio_tolerance
    }

    #[inline]
    pub fn max_ratio(&self) -> f64 {
        self.expected_ratio + self.expected_ratio * self.ratio_tolerance
    }

    pub fn accepts_angle(&self, angle_deg: f64) -> bool {
        angle_deg >= self.angle_deg - self.angle_tolerance_deg
            && angle_deg <= self.angle_deg + self.angle_tolerance_deg
    }

    pub fn accepts_ratio(&self, ratio: f64) -> bool {
        ratio >= self.min_ratio() && ratio <= self.max_ratio()
    }
}
