//! High-level facade crate for the `hub-targets-*` workspace.
//!
//! This crate provides:
//! - stable, convenient re-exports of the geometry, classification and
//!   pipeline crates
//! - a contour replay source so the full frame task runs without a camera
//! - the `hub-targets` CLI (feature `cli`)
//!
//! ## Quickstart
//!
//! ```no_run
//! use hub_targets::replay::{run_replay, ReplayFrames};
//! use hub_targets::PipelineConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PipelineConfig::load_json("pipeline.json")?;
//! let frames = ReplayFrames::load_json("frames.json")?;
//! let outcome = run_replay(config, frames, None)?;
//! for report in &outcome.reports {
//!     println!("frame {}: {:?} {:?}", report.frame, report.state, report.distance);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `hub_targets::core`: bounding boxes, scene aggregation, distance smoothing.
//! - `hub_targets::classify`: target profiles, classifier, lock state machine.
//! - `hub_targets::pipeline`: per-frame context, overlay, telemetry, frame task
//!   and control loop.
//! - `hub_targets::replay`: JSON contour replay.

pub use hub_targets_classify as classify;
pub use hub_targets_core as core;
pub use hub_targets_pipeline as pipeline;

pub use hub_targets_classify::{ClassifierParams, LockPolicy, ProfileKind, TargetingState};
pub use hub_targets_core::{BoundingBox, Contour, DistanceParams, SceneGeometry};
pub use hub_targets_pipeline::{PipelineConfig, PipelineContext, TargetReport};

pub mod replay;
