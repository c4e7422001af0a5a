//! Axis-aligned bounding rectangles.
//!
//! Used as the broadphase proxy for segments: only segments whose
//! rectangles overlap a query rectangle are candidates for endpoint matching.

use lamina_math::Vector2;
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in 2D.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb2 {
    /// Minimum corner (x, y).
    pub min: [f64; 2],
    /// Maximum corner (x, y).
    pub max: [f64; 2],
}

impl Aabb2 {
    /// Create an AABB from min and max corners.
    pub fn new(min: [f64; 2], max: [f64; 2]) -> Self {
        Self { min, max }
    }

    /// Create an empty (inverted) AABB suitable for expansion.
    pub fn empty() -> Self {
        Self {
            min: [f64::INFINITY, f64::INFINITY],
            max: [f64::NEG_INFINITY, f64::NEG_INFINITY],
        }
    }

    /// The square of half-width `radius` centred on `p`.
    pub fn around(p: &Vector2, radius: f64) -> Self {
        Self {
            min: [p.x() - radius, p.y() - radius],
            max: [p.x() + radius, p.y() + radius],
        }
    }

    /// Tight box around two points.
    pub fn from_points(a: &Vector2, b: &Vector2) -> Self {
        let mut aabb = Self::empty();
        aabb.include_point(a);
        aabb.include_point(b);
        aabb
    }

    /// True if no point has been included yet.
    pub fn is_empty(&self) -> bool {
        self.min[0] > self.max[0] || self.min[1] > self.max[1]
    }

    /// Expand this AABB to include a point.
    pub fn include_point(&mut self, p: &Vector2) {
        self.min[0] = self.min[0].min(p.x());
        self.min[1] = self.min[1].min(p.y());
        self.max[0] = self.max[0].max(p.x());
        self.max[1] = self.max[1].max(p.y());
    }

    /// Smallest AABB containing both boxes.
    pub fn union(&self, other: &Aabb2) -> Aabb2 {
        Aabb2 {
            min: [self.min[0].min(other.min[0]), self.min[1].min(other.min[1])],
            max: [self.max[0].max(other.max[0]), self.max[1].max(other.max[1])],
        }
    }

    /// Test if two AABBs overlap (touching counts as overlap).
    pub fn overlaps(&self, other: &Aabb2) -> bool {
        self.min[0] <= other.max[0]
            && self.max[0] >= other.min[0]
            && self.min[1] <= other.max[1]
            && self.max[1] >= other.min[1]
    }

    /// True if `other` lies entirely inside this box.
    pub fn contains(&self, other: &Aabb2) -> bool {
        self.min[0] <= other.min[0]
            && self.min[1] <= other.min[1]
            && self.max[0] >= other.max[0]
            && self.max[1] >= other.max[1]
    }

    /// Expand the AABB by a margin in all directions.
    pub fn expand(&mut self, margin: f64) {
        self.min[0] -= margin;
        self.min[1] -= margin;
        self.max[0] += margin;
        self.max[1] += margin;
    }

    /// Width along X.
    pub fn width(&self) -> f64 {
        (self.max[0] - self.min[0]).max(0.0)
    }

    /// Height along Y.
    pub fn height(&self) -> f64 {
        (self.max[1] - self.min[1]).max(0.0)
    }

    /// Area of the rectangle.
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Half-perimeter, the insertion cost metric of the spatial index.
    pub fn half_perimeter(&self) -> f64 {
        self.width() + self.height()
    }
}

impl Default for Aabb2 {
    fn default() -> Self {
        Self::empty()
    }
}
