use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Ordered outline of one detected shape, in image pixels (y grows downward).
pub type Contour = Vec<Point2<f64>>;

/// Axis-aligned rectangle enclosing a point set.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Point2<f64>,
    pub max: Point2<f64>,
}

impl BoundingBox {
    /// Degenerate box covering a single point.
    pub fn from_point(p: Point2<f64>) -> Self {
        Self { min: p, max: p }
    }

    /// Tightest box around `points`, or `None` for an empty slice.
    pub fn from_points(points: &[Point2<f64>]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let mut bbox = Self::from_point(*first);
        for p in rest {
            bbox.include(*p);
        }
        Some(bbox)
    }

    #[inline]
    pub fn include(&mut self, p: Point2<f64>) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
    }

    /// Smallest box containing both `self` and `other`.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        let mut out = *self;
        out.include(other.min);
        out.include(other.max);
        out
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    /// Midpoint of the box.
    #[inline]
    pub fn center(&self) -> Point2<f64> {
        Point2::new(
            (self.min.x + self.max.x) / 2.0,
            (self.min.y + self.max.y) / 2.0,
        )
    }

    pub fn contains(&self, p: Point2<f64>) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }
}

/// Per-contour geometry: bounding box, polygon area and box-midpoint centroid.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShapeGeometry {
    pub bbox: BoundingBox,
    /// Unsigned area of the closed polygon traced by the contour.
    pub area: f64,
    /// Midpoint of `bbox`. This is *not* the centre of mass; the distance
    /// regression was calibrated against the box midpoint.
    pub centroid: Point2<f64>,
}

impl ShapeGeometry {
    /// Reduce one contour to its geometry. Returns `None` for an empty contour.
    pub fn from_contour(points: &[Point2<f64>]) -> Option<Self> {
        let bbox = BoundingBox::from_points(points)?;
        Some(Self {
            bbox,
            area: polygon_area(points),
            centroid: bbox.center(),
        })
    }

    /// Bounding-box height over width. `None` when the box has no width.
    pub fn aspect_ratio(&self) -> Option<f64> {
        let w = self.bbox.width();
        if w > 0.0 {
            Some(self.bbox.height() / w)
        } else {
            None
        }
    }
}

/// Shoelace area of the polygon closed from the last point back to the first.
///
/// The sign of the orientation is dropped, so clockwise and counter-clockwise
/// outlines give the same area. Fewer than three points enclose nothing.
pub fn polygon_area(points: &[Point2<f64>]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut twice_area = 0.0;
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        twice_area += a.x * b.y - b.x * a.y;
    }
    (twice_area * 0.5).abs()
}
