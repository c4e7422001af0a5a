//! Closed polygons made of linked segments.

use lamina_math::Vector2;
use serde::Serialize;

use crate::aabb::Aabb2;
use crate::segment::Segment2D;
use crate::spatial::Bounded;

/// A closed cyclic chain of segments.
///
/// Segments are stored in walk order: segment `i` is followed by segment
/// `(i + 1) % len` and its `next`/`prev` links are local indices into
/// [`Polygon::segments`]. `segment[i].end == segment[i + 1].start` holds
/// cyclically.
#[derive(Debug, Clone, Serialize)]
pub struct Polygon {
    segments: Vec<Segment2D>,
    bounds: Aabb2,
    perimeter: f64,
}

impl Polygon {
    /// Build a polygon from segments already in cyclic walk order.
    ///
    /// Link fields are rewritten to local indices. Returns `None` for an
    /// empty chain.
    pub fn from_cycle(mut segments: Vec<Segment2D>) -> Option<Self> {
        if segments.is_empty() {
            return None;
        }
        let n = segments.len() as u32;
        let mut bounds = Aabb2::empty();
        let mut perimeter = 0.0;
        for (i, s) in segments.iter_mut().enumerate() {
            let i = i as u32;
            s.clear_links();
            s.set_links((i + 1) % n, (i + n - 1) % n);
            bounds = bounds.union(&s.bounds());
            perimeter += s.length();
        }
        Some(Self {
            segments,
            bounds,
            perimeter,
        })
    }

    /// Segments in walk order.
    pub fn segments(&self) -> &[Segment2D] {
        &self.segments
    }

    /// Number of segments (equals the number of vertices).
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Always false for a constructed polygon.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Union of the segments' padded AABBs.
    pub fn bounds(&self) -> Aabb2 {
        self.bounds
    }

    /// Sum of segment lengths.
    pub fn perimeter(&self) -> f64 {
        self.perimeter
    }

    /// Index of the segment after `i`, following the stored link.
    pub fn next_of(&self, i: usize) -> Option<usize> {
        self.segments.get(i)?.next().map(|n| n as usize)
    }

    /// Index of the segment before `i`, following the stored link.
    pub fn prev_of(&self, i: usize) -> Option<usize> {
        self.segments.get(i)?.prev().map(|p| p as usize)
    }

    /// Vertices (segment start points) in walk order.
    pub fn points(&self) -> Vec<Vector2> {
        self.segments.iter().map(Segment2D::start).collect()
    }

    /// Signed area. Positive for counter-clockwise.
    pub fn signed_area(&self) -> f64 {
        self.segments
            .iter()
            .map(|s| s.start().cross(&s.end()))
            .sum::<f64>()
            / 2.0
    }

    /// Absolute area.
    pub fn area(&self) -> f64 {
        self.signed_area().abs()
    }

    /// Is the polygon counter-clockwise?
    pub fn is_ccw(&self) -> bool {
        self.signed_area() > 0.0
    }

    /// Area centroid. Falls back to the vertex average for zero area.
    pub fn centroid(&self) -> Vector2 {
        let a = self.signed_area();
        if a.abs() < f64::EPSILON {
            let sum = self
                .segments
                .iter()
                .fold(Vector2::ZERO, |acc, s| acc + s.start());
            return sum * (1.0 / self.segments.len().max(1) as f64);
        }
        let mut cx = 0.0;
        let mut cy = 0.0;
        for s in &self.segments {
            let (p, q) = (s.start(), s.end());
            let w = p.cross(&q);
            cx += (p.x() + q.x()) * w;
            cy += (p.y() + q.y()) * w;
        }
        let k = 1.0 / (6.0 * a);
        Vector2::new(cx * k, cy * k).unwrap_or(Vector2::ZERO)
    }

    /// Even-odd point containment.
    pub fn contains_point(&self, pt: &Vector2) -> bool {
        let mut inside = false;
        for s in &self.segments {
            let (a, b) = (s.start(), s.end());
            if (a.y() > pt.y()) != (b.y() > pt.y()) {
                let x = a.x() + (pt.y() - a.y()) / (b.y() - a.y()) * (b.x() - a.x());
                if pt.x() < x {
                    inside = !inside;
                }
            }
        }
        inside
    }

    /// Check that every segment ends where its successor starts and that
    /// links form one cycle in both directions.
    pub fn is_closed(&self, epsilon: f64) -> bool {
        let n = self.segments.len();
        for i in 0..n {
            let (Some(next), Some(prev)) = (self.next_of(i), self.prev_of(i)) else {
                return false;
            };
            if self.prev_of(next) != Some(i) || self.next_of(prev) != Some(i) {
                return false;
            }
            if !self.segments[i]
                .end()
                .almost_equal(&self.segments[next].start(), epsilon)
            {
                return false;
            }
        }
        true
    }
}

impl Bounded for Polygon {
    fn aabb(&self) -> Aabb2 {
        self.bounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square(size: f64) -> Polygon {
        let pts = [(0.0, 0.0), (size, 0.0), (size, size), (0.0, size)];
        let segs = (0..4)
            .map(|i| {
                let a = pts[i];
                let b = pts[(i + 1) % 4];
                Segment2D::new(
                    Vector2::new(a.0, a.1).unwrap(),
                    Vector2::new(b.0, b.1).unwrap(),
                    0.0,
                )
                .unwrap()
            })
            .collect();
        Polygon::from_cycle(segs).unwrap()
    }

    #[test]
    fn test_square_measures() {
        let sq = square(2.0);
        assert_eq!(sq.len(), 4);
        assert_relative_eq!(sq.signed_area(), 4.0);
        assert!(sq.is_ccw());
        assert_relative_eq!(sq.perimeter(), 8.0);
        assert_relative_eq!(sq.bounds().area(), 4.0);
        let c = sq.centroid();
        assert_relative_eq!(c.x(), 1.0);
        assert_relative_eq!(c.y(), 1.0);
    }

    #[test]
    fn test_walk_cycles_both_ways() {
        let sq = square(1.0);
        assert!(sq.is_closed(1e-9));
        let mut i = 0;
        for _ in 0..sq.len() {
            i = sq.next_of(i).unwrap();
        }
        assert_eq!(i, 0);
        for _ in 0..sq.len() {
            i = sq.prev_of(i).unwrap();
        }
        assert_eq!(i, 0);
    }

    #[test]
    fn test_contains_point() {
        let sq = square(1.0);
        assert!(sq.contains_point(&Vector2::new(0.5, 0.5).unwrap()));
        assert!(!sq.contains_point(&Vector2::new(1.5, 0.5).unwrap()));
    }

    #[test]
    fn test_empty_cycle() {
        assert!(Polygon::from_cycle(Vec::new()).is_none());
    }
}
