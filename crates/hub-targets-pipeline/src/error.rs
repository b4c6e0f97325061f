use hub_targets_classify::ProfileError;
use hub_targets_core::DistanceParamsError;

/// Errors raised while building or running the pipeline.
///
/// Everything here happens at startup or task boundaries; per-frame edge
/// cases never surface as errors.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Distance(#[from] DistanceParamsError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error("invalid image size {width}x{height}")]
    InvalidImageSize { width: u32, height: u32 },
    #[error("poll interval must be at least 1 ms")]
    InvalidPollInterval,
    #[error("viewing angle must be finite, got {0} degrees")]
    InvalidViewingAngle(f64),
    #[error("failed to spawn frame task: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("frame task '{0}' panicked")]
    TaskPanicked(String),
    /// A previous task start failed or panicked and took the context with it.
    #[error("pipeline context is no longer available")]
    ContextUnavailable,
}

/// Camera-side failures.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    /// Camera disconnected or a frame grab failed; worth retrying.
    #[error("camera '{camera}' unavailable: {reason}")]
    Unavailable { camera: String, reason: String },
    /// Finite sources (replays, tests) have nothing left to deliver.
    #[error("end of stream")]
    EndOfStream,
}
