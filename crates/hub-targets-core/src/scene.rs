use log::{debug, warn};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::geometry::{BoundingBox, ShapeGeometry};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Fewest contour points that still outline a polygon.
pub const MIN_POLYGON_POINTS: usize = 3;

/// Frame-level aggregate of every shape detected in one frame.
///
/// A frame with no shapes is a regular outcome: `bounds` and
/// `average_centroid` are `None` rather than the 0/0 mean.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneGeometry {
    /// Union of all shape boxes.
    pub bounds: Option<BoundingBox>,
    /// Per-shape geometry in input order.
    pub shapes: Vec<ShapeGeometry>,
    /// Mean of the per-shape centroids, x and y averaged independently.
    pub average_centroid: Option<Point2<f64>>,
}

impl SceneGeometry {
    /// Scene with no detections.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Fold shapes into a scene. Shape order is preserved.
    pub fn aggregate(shapes: Vec<ShapeGeometry>) -> Self {
        let Some((first, rest)) = shapes.split_first() else {
            return Self::empty();
        };

        let mut bounds = first.bbox;
        let mut sum_x = first.centroid.x;
        let mut sum_y = first.centroid.y;
        for shape in rest {
            bounds = bounds.union(&shape.bbox);
            sum_x += shape.centroid.x;
            sum_y += shape.centroid.y;
        }
        let n = shapes.len() as f64;
        let average_centroid = Point2::new(sum_x / n, sum_y / n);

        Self {
            bounds: Some(bounds),
            average_centroid: Some(average_centroid),
            shapes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    /// Shape with the largest polygon area; ties keep the earliest shape.
    pub fn dominant_shape(&self) -> Option<&ShapeGeometry> {
        self.shapes
            .iter()
            .reduce(|best, s| if s.area > best.area { s } else { best })
    }

    /// Signed horizontal offset of the average centroid from the image centre.
    pub fn deviation_from_center(&self, image_width: f64) -> Option<f64> {
        self.average_centroid.map(|c| c.x - image_width / 2.0)
    }

    pub fn areas(&self) -> Vec<f64> {
        self.shapes.iter().map(|s| s.area).collect()
    }
}

/// Reduce a frame's contours to a scene.
///
/// Contours with fewer than `min_points` points cannot form a polygon; they
/// are skipped with a warning and the rest of the frame is still aggregated.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(contours), fields(contours = contours.len()))
)]
pub fn aggregate_contours<C>(contours: &[C], min_points: usize) -> SceneGeometry
where
    C: AsRef<[Point2<f64>]>,
{
    let min_points = min_points.max(1);
    let mut shapes = Vec::with_capacity(contours.len());
    for (idx, contour) in contours.iter().enumerate() {
        let points = contour.as_ref();
        if points.len() < min_points {
            warn!(
                "skipping degenerate contour #{idx}: {} point(s), need at least {min_points}",
                points.len()
            );
            continue;
        }
        if let Some(shape) = ShapeGeometry::from_contour(points) {
            shapes.push(shape);
        }
    }
    debug!(
        "aggregated {} of {} contour(s) into scene",
        shapes.len(),
        contours.len()
    );
    SceneGeometry::aggregate(shapes)
}
