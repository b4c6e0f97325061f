//! Offline replay of recorded contours.
//!
//! A replay file is a JSON array of frames. Each frame is either a bare list
//! of contours or an object with `contours` and an optional `angle_deg`;
//! a contour is a list of `[x, y]` points:
//!
//! ```json
//! [
//!   [[[310, 72.5], [330, 72.5], [330, 127.5], [310, 127.5]]],
//!   { "contours": [], "angle_deg": -15.0 }
//! ]
//! ```
//!
//! [`ReplaySource`] and [`ReplayExtractor`] share the frames so the regular
//! frame task can run without a camera.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use hub_targets_core::Contour;
use hub_targets_pipeline::{
    ConfigIoError, ContourExtractor, Frame, FramePipeline, FrameSink, FrameSource, FrameTask,
    HslThresholds, ImageSize, MemoryStore, PipelineConfig, PipelineContext, PipelineError,
    SourceError, TargetReport, TaskSettings, TelemetryPublisher, TelemetryValue,
};
use image::RgbImage;
use log::{debug, info, warn};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum ReplayError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid replay frames: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Config(#[from] ConfigIoError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("failed to create overlay directory {path}: {source}")]
    OverlayDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawFrame {
    Bare(Vec<Vec<[f64; 2]>>),
    Full {
        contours: Vec<Vec<[f64; 2]>>,
        #[serde(default)]
        angle_deg: Option<f64>,
    },
}

/// One recorded frame.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawFrame")]
pub struct ReplayFrame {
    pub contours: Vec<Vec<[f64; 2]>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub angle_deg: Option<f64>,
}

impl From<RawFrame> for ReplayFrame {
    fn from(raw: RawFrame) -> Self {
        match raw {
            RawFrame::Bare(contours) => Self {
                contours,
                angle_deg: None,
            },
            RawFrame::Full {
                contours,
                angle_deg,
            } => Self {
                contours,
                angle_deg,
            },
        }
    }
}

impl ReplayFrame {
    pub fn to_contours(&self) -> Vec<Contour> {
        self.contours
            .iter()
            .map(|c| c.iter().map(|&[x, y]| Point2::new(x, y)).collect())
            .collect()
    }
}

/// An ordered list of recorded frames.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReplayFrames(pub Vec<ReplayFrame>);

impl ReplayFrames {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ReplayError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ReplayError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ReplayError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ReplayFrame> {
        self.0.get(index)
    }
}

/// Frame source that walks a replay once, producing blank frames of the
/// configured size.
pub struct ReplaySource {
    frames: Arc<ReplayFrames>,
    camera: String,
    size: ImageSize,
    next: usize,
    exposure: Option<i32>,
}

impl ReplaySource {
    pub fn new(frames: Arc<ReplayFrames>, camera: impl Into<String>, size: ImageSize) -> Self {
        Self {
            frames,
            camera: camera.into(),
            size,
            next: 0,
            exposure: None,
        }
    }

    pub fn exposure(&self) -> Option<i32> {
        self.exposure
    }
}

impl FrameSource for ReplaySource {
    fn name(&self) -> &str {
        &self.camera
    }

    fn set_exposure(&mut self, exposure: i32) -> Result<(), SourceError> {
        debug!("replay '{}' exposure set to {exposure}", self.camera);
        self.exposure = Some(exposure);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame, SourceError> {
        let frame = self.frames.get(self.next).ok_or(SourceError::EndOfStream)?;
        let number = self.next as u64;
        self.next += 1;
        Ok(Frame {
            number,
            image: RgbImage::new(self.size.width, self.size.height),
            angle_deg: frame.angle_deg,
        })
    }
}

/// Extractor returning the recorded contours for a frame number; thresholds
/// are ignored.
pub struct ReplayExtractor {
    frames: Arc<ReplayFrames>,
}

impl ReplayExtractor {
    pub fn new(frames: Arc<ReplayFrames>) -> Self {
        Self { frames }
    }
}

impl ContourExtractor for ReplayExtractor {
    fn extract(&mut self, frame: &Frame, _thresholds: &HslThresholds) -> Vec<Contour> {
        usize::try_from(frame.number)
            .ok()
            .and_then(|i| self.frames.get(i))
            .map(ReplayFrame::to_contours)
            .unwrap_or_default()
    }
}

/// Sink that keeps every report and optionally writes overlays as PNGs.
#[derive(Clone, Default)]
pub struct RecordingSink {
    reports: Arc<Mutex<Vec<TargetReport>>>,
    overlay_dir: Option<PathBuf>,
}

impl RecordingSink {
    pub fn new(overlay_dir: Option<PathBuf>) -> Self {
        Self {
            reports: Arc::default(),
            overlay_dir,
        }
    }

    pub fn reports(&self) -> Vec<TargetReport> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl FrameSink for RecordingSink {
    fn publish(&mut self, annotated: &RgbImage, report: &TargetReport) {
        if let Some(dir) = &self.overlay_dir {
            let path = dir.join(format!("frame_{:05}.png", report.frame));
            if let Err(err) = annotated.save(&path) {
                warn!("failed to write overlay {}: {err}", path.display());
            }
        }
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(report.clone());
    }
}

/// Per-frame reports plus the final state of the telemetry store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReplayOutcome {
    pub reports: Vec<TargetReport>,
    pub telemetry: BTreeMap<String, TelemetryValue>,
}

/// Run the full frame task over `frames` and collect what it published.
pub fn run_replay(
    config: PipelineConfig,
    frames: ReplayFrames,
    overlay_dir: Option<&Path>,
) -> Result<ReplayOutcome, ReplayError> {
    if let Some(dir) = overlay_dir {
        fs::create_dir_all(dir).map_err(|source| ReplayError::OverlayDir {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let context = PipelineContext::new(config.clone())?;
    let frames = Arc::new(frames);
    info!(
        "replaying {} frame(s) as camera '{}'",
        frames.len(),
        config.camera.name
    );

    let store = Arc::new(MemoryStore::new());
    let publisher = TelemetryPublisher::spawn(store.clone(), config.telemetry_queue)?;
    let sink = RecordingSink::new(overlay_dir.map(Path::to_path_buf));
    let pipeline = FramePipeline::new(
        context,
        Box::new(ReplaySource::new(
            frames.clone(),
            config.camera.name.clone(),
            config.image,
        )),
        Box::new(ReplayExtractor::new(frames)),
        Box::new(sink.clone()),
    );
    let settings =
        TaskSettings::from_store(store.as_ref(), &config).with_telemetry(publisher.handle());

    let task = FrameTask::spawn(config.camera.name.clone(), pipeline, settings)?;
    let pipeline = task.join()?;
    publisher.shutdown();
    info!(
        "replay finished: {} frame(s), final state {}",
        pipeline.context().frames_processed(),
        pipeline.context().state().as_str()
    );

    Ok(ReplayOutcome {
        reports: sink.reports(),
        telemetry: store.snapshot(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use hub_targets_classify::TargetingState;
    use hub_targets_pipeline::keys;

    const FRAMES: &str = r#"[
        [[[310, 72.5], [330, 72.5], [330, 127.5], [310, 127.5]]],
        { "contours": [[[310, 72.5], [330, 72.5], [330, 127.5], [310, 127.5]]] },
        { "contours": [[[310, 72.5], [330, 72.5], [330, 127.5], [310, 127.5]]], "angle_deg": -20.0 },
        { "contours": [[[310, 72.5], [330, 72.5], [330, 127.5], [310, 127.5]]], "angle_deg": -75.0 }
    ]"#;

    #[test]
    fn parses_bare_and_full_frames() {
        let frames = ReplayFrames::from_json(FRAMES).unwrap();
        assert_eq!(frames.len(), 4);
        assert_eq!(frames.get(0).unwrap().angle_deg, None);
        assert_eq!(frames.get(2).unwrap().angle_deg, Some(-20.0));
        let contours = frames.get(1).unwrap().to_contours();
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0][2], Point2::new(330.0, 127.5));
    }

    #[test]
    fn malformed_frames_are_rejected() {
        assert!(matches!(
            ReplayFrames::from_json(r#"[[[[1, 2, 3]]]]"#),
            Err(ReplayError::Json(_))
        ));
        assert!(matches!(
            ReplayFrames::load_json("/no/such/frames.json"),
            Err(ReplayError::Read { .. })
        ));
    }

    #[test]
    fn source_ends_after_last_frame() {
        let frames = Arc::new(ReplayFrames::from_json(FRAMES).unwrap());
        let mut source = ReplaySource::new(frames.clone(), "Shooter", ImageSize::default());
        let mut extractor = ReplayExtractor::new(frames);
        for expected in 0..4u64 {
            let frame = source.next_frame().unwrap();
            assert_eq!(frame.number, expected);
            assert_eq!(frame.image.dimensions(), (640, 480));
            assert_eq!(
                extractor.extract(&frame, &HslThresholds::default()).len(),
                1
            );
        }
        assert_eq!(source.next_frame().unwrap_err(), SourceError::EndOfStream);
    }

    #[test]
    fn replay_runs_the_whole_pipeline() {
        let frames = ReplayFrames::from_json(FRAMES).unwrap();
        let outcome = run_replay(PipelineConfig::default(), frames, None).unwrap();

        let states: Vec<_> = outcome.reports.iter().map(|r| r.state).collect();
        assert_eq!(
            states,
            vec![
                TargetingState::Acquiring,
                TargetingState::Acquiring,
                TargetingState::Locked,
                // Portrait strip seen from the high angle fails.
                TargetingState::Searching,
            ]
        );
        let last = outcome.reports.last().unwrap();
        assert_relative_eq!(
            last.distance.unwrap(),
            -1.2033 * 100.0 + 23.176,
            epsilon = 1e-9
        );
        assert_eq!(
            outcome.telemetry.get(keys::DEVIATION_FROM_CENTER),
            Some(&TelemetryValue::Double(0.0))
        );
        assert_eq!(
            outcome.telemetry.get(keys::HAS_TARGET),
            Some(&TelemetryValue::Bool(true))
        );
    }

    #[test]
    fn overlays_are_written_per_frame() {
        let dir = tempfile::tempdir().unwrap();
        let overlays = dir.path().join("overlays");
        let frames = ReplayFrames::from_json(FRAMES).unwrap();
        run_replay(PipelineConfig::default(), frames, Some(&overlays)).unwrap();
        let written = fs::read_dir(&overlays).unwrap().count();
        assert_eq!(written, 4);
        assert!(overlays.join("frame_00000.png").exists());
    }
}
