use hub_targets_core::ShapeGeometry;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{ClassifierParams, ProfileError, ProfileKind, TargetProfile};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Outcome of classifying one shape.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Observed box height over width, `None` for a zero-width box.
    pub aspect_ratio: Option<f64>,
    pub angle_deg: f64,
    /// First profile whose angle and ratio windows both matched.
    pub matched: Option<ProfileKind>,
}

impl Classification {
    pub fn succeeded(&self) -> bool {
        self.matched.is_some()
    }
}

/// Matches shapes against the low-angle and high-angle strip profiles.
#[derive(Clone, Debug)]
pub struct TargetClassifier {
    profiles: [TargetProfile; 2],
}

impl TargetClassifier {
    pub fn new(params: &ClassifierParams) -> Result<Self, ProfileError> {
        Ok(Self {
            profiles: TargetProfile::pair_from_params(params)?,
        })
    }

    pub fn profiles(&self) -> &[TargetProfile] {
        &self.profiles
    }

    pub fn profile(&self, kind: ProfileKind) -> &TargetProfile {
        match kind {
            ProfileKind::LowAngle => &self.profiles[0],
            ProfileKind::HighAngle => &self.profiles[1],
        }
    }

    /// Classify a shape seen at `angle_deg`.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self, shape)))]
    pub fn classify(&self, shape: &ShapeGeometry, angle_deg: f64) -> Classification {
        let aspect_ratio = shape.aspect_ratio();
        let matched = aspect_ratio.and_then(|ratio| self.match_ratio(ratio, angle_deg));
        debug!(
            "classify: ratio={:?} angle={angle_deg:.1} -> {:?}",
            aspect_ratio, matched
        );
        Classification {
            aspect_ratio,
            angle_deg,
            matched,
        }
    }

    /// Profile accepting this aspect ratio at this angle, if any.
    pub fn match_ratio(&self, ratio: f64, angle_deg: f64) -> Option<ProfileKind> {
        self.profiles
            .iter()
            .filter(|p| p.accepts_angle(angle_deg))
            .find(|p| p.accepts_ratio(ratio))
            .map(|p| p.kind)
    }
}
