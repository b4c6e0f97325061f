use hub_targets_classify::{
    Classification, ProfileKind, TargetClassifier, TargetLock, TargetingState,
};
use hub_targets_core::{aggregate_contours, BoundingBox, DistanceEstimator, SceneGeometry};
use log::debug;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::{PipelineConfig, PipelineError};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Box and area of one shape, as published to telemetry.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShapeReport {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
    pub area: f64,
}

/// Everything the pipeline decided about one frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TargetReport {
    pub frame: u64,
    pub bounds: Option<BoundingBox>,
    /// Per-shape boxes and areas, in contour order.
    pub shapes: Vec<ShapeReport>,
    pub average_centroid: Option<Point2<f64>>,
    /// Smoothed distance. Frames without a target repeat the last value.
    pub distance: Option<f64>,
    pub deviation_from_center: Option<f64>,
    pub classification: Option<Classification>,
    pub state: TargetingState,
}

impl TargetReport {
    pub fn has_target(&self) -> bool {
        !self.shapes.is_empty()
    }

    pub fn matched_profile(&self) -> Option<ProfileKind> {
        self.classification.and_then(|c| c.matched)
    }
}

/// Per-process pipeline state, threaded through every frame.
///
/// Exactly one frame task owns a context at a time, so nothing inside needs
/// locking.
#[derive(Debug)]
pub struct PipelineContext {
    config: PipelineConfig,
    estimator: DistanceEstimator,
    classifier: TargetClassifier,
    lock: TargetLock,
    frames_processed: u64,
}

impl PipelineContext {
    /// Validate the configuration and build fresh state.
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let estimator = DistanceEstimator::new(config.distance)?;
        let classifier = TargetClassifier::new(&config.classifier)?;
        let lock = TargetLock::new(config.lock)?;
        Ok(Self {
            config,
            estimator,
            classifier,
            lock,
            frames_processed: 0,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn estimator(&self) -> &DistanceEstimator {
        &self.estimator
    }

    pub fn classifier(&self) -> &TargetClassifier {
        &self.classifier
    }

    pub fn state(&self) -> TargetingState {
        self.lock.state()
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    /// Run aggregation, distance smoothing and classification for one frame.
    ///
    /// `angle_deg` overrides the configured viewing angle when the extractor
    /// inferred one.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, contours), fields(contours = contours.len()))
    )]
    pub fn process_frame<C>(&mut self, contours: &[C], angle_deg: Option<f64>) -> TargetReport
    where
        C: AsRef<[Point2<f64>]>,
    {
        let frame = self.frames_processed;
        self.frames_processed += 1;

        let scene = aggregate_contours(contours, self.config.min_contour_points);
        self.report_scene(frame, &scene, angle_deg)
    }

    fn report_scene(
        &mut self,
        frame: u64,
        scene: &SceneGeometry,
        angle_deg: Option<f64>,
    ) -> TargetReport {
        let distance = match scene.average_centroid {
            Some(avg) => Some(self.estimator.estimate(avg.y)),
            None => self.estimator.smoothed(),
        };

        let angle = angle_deg.unwrap_or(self.config.viewing_angle_deg);
        let classification = scene
            .dominant_shape()
            .map(|shape| self.classifier.classify(shape, angle));
        let succeeded = classification.is_some_and(|c| c.succeeded());
        let state = self.lock.update(succeeded);

        let report = TargetReport {
            frame,
            bounds: scene.bounds,
            shapes: scene
                .shapes
                .iter()
                .map(|s| ShapeReport {
                    min_x: s.bbox.min.x,
                    min_y: s.bbox.min.y,
                    max_x: s.bbox.max.x,
                    max_y: s.bbox.max.y,
                    area: s.area,
                })
                .collect(),
            average_centroid: scene.average_centroid,
            distance,
            deviation_from_center: scene.deviation_from_center(self.config.image.width as f64),
            classification,
            state,
        };
        debug!(
            "frame {frame}: {} shape(s), distance={:?}, deviation={:?}, state={}",
            report.shapes.len(),
            report.distance,
            report.deviation_from_center,
            state.as_str()
        );
        report
    }
}
