//! Frame-level targeting pipeline.
//!
//! This crate wires the geometric core into a running system:
//! - `PipelineContext` owns all per-process state (distance history, lock
//!   state) and turns one frame's contours into a [`TargetReport`],
//! - boundary traits stand in for the camera, contour extractor, video stream
//!   and telemetry store,
//! - [`FrameTask`] runs the pipeline on a dedicated thread and
//!   [`ControlLoop`] restarts it when the selected vision mode changes.

mod boundary;
mod config;
mod context;
mod error;
mod overlay;
mod runner;
mod telemetry;

pub use boundary::{ContourExtractor, Frame, FrameSink, FrameSource, NullSink};
pub use config::{
    CameraConfig, CameraSettings, ConfigIoError, HslThresholds, ImageSize, PipelineConfig,
};
pub use context::{PipelineContext, ShapeReport, TargetReport};
pub use error::{PipelineError, SourceError};
pub use overlay::{annotate, OverlayStyle};
pub use runner::{
    ControlLoop, FixedMode, FramePipeline, FrameTask, ModeSelector, StoreModeSelector,
    TaskSettings,
};
pub use telemetry::{
    keys, pull_settings, report_entries, MemoryStore, TelemetryHandle, TelemetryPublisher,
    TelemetryStore, TelemetryValue,
};
