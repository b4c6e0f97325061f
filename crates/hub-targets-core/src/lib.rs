//! Core types and utilities for hub target tracking.
//!
//! This crate is intentionally small and purely geometric. It does *not*
//! depend on any camera, contour extractor or image type: contours come in as
//! plain point slices and everything downstream is derived from them.

mod distance;
mod geometry;
mod logger;
mod scene;

pub use distance::{DistanceEstimator, DistanceParams, DistanceParamsError};
pub use geometry::{polygon_area, BoundingBox, Contour, ShapeGeometry};
pub use scene::{aggregate_contours, SceneGeometry, MIN_POLYGON_POINTS};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
