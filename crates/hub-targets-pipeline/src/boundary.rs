//! Traits for the collaborators outside the pipeline: camera, contour
//! extractor and video stream.

use hub_targets_core::Contour;
use image::RgbImage;

use crate::{HslThresholds, SourceError, TargetReport};

/// One captured frame.
#[derive(Clone, Debug)]
pub struct Frame {
    pub number: u64,
    pub image: RgbImage,
    /// Viewing angle inferred upstream, if the source knows it.
    pub angle_deg: Option<f64>,
}

/// Camera delivering frames. `next_frame` may block; it is the frame task's
/// only suspension point.
pub trait FrameSource: Send {
    fn name(&self) -> &str;

    /// Apply an exposure value; negative selects auto exposure.
    fn set_exposure(&mut self, exposure: i32) -> Result<(), SourceError>;

    fn next_frame(&mut self) -> Result<Frame, SourceError>;
}

/// Threshold-and-trace step turning a frame into contours.
pub trait ContourExtractor: Send {
    fn extract(&mut self, frame: &Frame, thresholds: &HslThresholds) -> Vec<Contour>;
}

/// Destination for annotated frames (usually an MJPEG stream).
pub trait FrameSink: Send {
    fn publish(&mut self, annotated: &RgbImage, report: &TargetReport);
}

/// Sink that discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl FrameSink for NullSink {
    fn publish(&mut self, _annotated: &RgbImage, _report: &TargetReport) {}
}
