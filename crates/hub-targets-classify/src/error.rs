/// Calibration errors caught when the classifier is built.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ProfileError {
    #[error("target dimensions must be positive and finite (height={height}, width={width})")]
    InvalidDimensions { height: f64, width: f64 },
    #[error("aspect ratio tolerance must be in (0, 1), got {0}")]
    InvalidAspectTolerance(f64),
    #[error("angle tolerance must be positive and finite, got {0} degrees")]
    InvalidAngleTolerance(f64),
    #[error("nominal angle must be finite, got {0} degrees")]
    InvalidAngle(f64),
    #[error("lock policy needs at least 2 consecutive frames, got {0}")]
    InvalidLockThreshold(u32),
}
