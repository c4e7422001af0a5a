//! Directed 2D segments and the arena that links them into chains.

use lamina_math::Vector2;
use serde::Serialize;

use crate::aabb::Aabb2;
use crate::error::{Result, SlicerError};
use crate::spatial::Bounded;

/// A directed line segment on a cutting plane.
///
/// Material lies to the left of `start -> end`; the cached normal points to
/// the right (away from material). The cached AABB is padded by a margin so
/// that small endpoint snaps keep it conservative.
#[derive(Debug, Clone, Serialize)]
pub struct Segment2D {
    start: Vector2,
    end: Vector2,
    normal: Vector2,
    aabb: Aabb2,
    #[serde(skip)]
    margin: f64,
    next: Option<u32>,
    prev: Option<u32>,
}

impl Segment2D {
    /// Create an unlinked segment. Returns `None` for a zero-length segment.
    pub fn new(start: Vector2, end: Vector2, margin: f64) -> Option<Self> {
        let normal = (end - start).normalize()?.perp_right();
        let mut aabb = Aabb2::from_points(&start, &end);
        aabb.expand(margin);
        Some(Self {
            start,
            end,
            normal,
            aabb,
            margin,
            next: None,
            prev: None,
        })
    }

    /// Start point.
    pub fn start(&self) -> Vector2 {
        self.start
    }

    /// End point.
    pub fn end(&self) -> Vector2 {
        self.end
    }

    /// Unit normal, pointing to the right of the direction of travel.
    pub fn normal(&self) -> Vector2 {
        self.normal
    }

    /// Padded bounding rectangle.
    pub fn bounds(&self) -> Aabb2 {
        self.aabb
    }

    /// `end - start`.
    pub fn direction(&self) -> Vector2 {
        self.end - self.start
    }

    /// Euclidean length.
    pub fn length(&self) -> f64 {
        self.start.distance(&self.end)
    }

    /// Arena index of the following segment, once linked.
    pub fn next(&self) -> Option<u32> {
        self.next
    }

    /// Arena index of the preceding segment, once linked.
    pub fn prev(&self) -> Option<u32> {
        self.prev
    }

    /// True if both links are set.
    pub fn is_linked(&self) -> bool {
        self.next.is_some() && self.prev.is_some()
    }

    /// Move the start point, refreshing the cached normal and AABB.
    pub(crate) fn set_start(&mut self, start: Vector2) {
        self.start = start;
        self.refresh();
    }

    /// Move the end point, refreshing the cached normal and AABB.
    pub(crate) fn set_end(&mut self, end: Vector2) {
        self.end = end;
        self.refresh();
    }

    fn refresh(&mut self) {
        // A snap can shrink a segment to nothing; keep the last good normal
        if let Some(dir) = self.direction().normalize() {
            self.normal = dir.perp_right();
        }
        self.aabb = Aabb2::from_points(&self.start, &self.end);
        self.aabb.expand(self.margin);
    }

    pub(crate) fn clear_links(&mut self) {
        self.next = None;
        self.prev = None;
    }

    pub(crate) fn set_links(&mut self, next: u32, prev: u32) {
        self.next = Some(next);
        self.prev = Some(prev);
    }
}

impl Bounded for Segment2D {
    fn aabb(&self) -> Aabb2 {
        self.aabb
    }
}

/// Contiguous storage for the segments of one shape.
///
/// Links are `u32` indices into the arena. [`SegmentArena::link`] always
/// updates both sides so that `next`/`prev` stay mirror images.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct SegmentArena {
    segments: Vec<Segment2D>,
}

impl SegmentArena {
    /// Empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a segment and return its index.
    pub fn push(&mut self, segment: Segment2D) -> u32 {
        let idx = self.segments.len() as u32;
        self.segments.push(segment);
        idx
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// True if empty.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Segment at `index`.
    pub fn get(&self, index: u32) -> Option<&Segment2D> {
        self.segments.get(index as usize)
    }

    pub(crate) fn get_mut(&mut self, index: u32) -> &mut Segment2D {
        &mut self.segments[index as usize]
    }

    /// All segments in insertion order.
    pub fn as_slice(&self) -> &[Segment2D] {
        &self.segments
    }

    /// Iterate `(index, segment)`.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &Segment2D)> {
        self.segments.iter().enumerate().map(|(i, s)| (i as u32, s))
    }

    /// Set `from.next = to` and `to.prev = from`, detaching any previous
    /// partners so the links stay symmetric.
    pub(crate) fn link(&mut self, from: u32, to: u32) {
        if let Some(old) = self.segments[from as usize].next {
            self.segments[old as usize].prev = None;
        }
        if let Some(old) = self.segments[to as usize].prev {
            self.segments[old as usize].next = None;
        }
        self.segments[from as usize].next = Some(to);
        self.segments[to as usize].prev = Some(from);
    }

    /// Reset all links.
    pub(crate) fn clear_links(&mut self) {
        for s in &mut self.segments {
            s.clear_links();
        }
    }

    /// Verify `s.next.prev == s` and `s.prev.next == s` for every linked
    /// segment.
    pub fn check_links(&self) -> Result<()> {
        for (i, s) in self.iter() {
            if let Some(n) = s.next {
                let back = self.get(n).and_then(Segment2D::prev);
                if back != Some(i) {
                    return Err(self.invariant(i, format!("next {n} points back to {back:?}")));
                }
            }
            if let Some(p) = s.prev {
                let fwd = self.get(p).and_then(Segment2D::next);
                if fwd != Some(i) {
                    return Err(self.invariant(i, format!("prev {p} points forward to {fwd:?}")));
                }
            }
        }
        Ok(())
    }

    pub(crate) fn invariant(&self, index: u32, detail: String) -> SlicerError {
        let (start, end) = self
            .get(index)
            .map_or((Vector2::ZERO, Vector2::ZERO), |s| (s.start, s.end));
        SlicerError::LinkInvariant {
            index,
            start,
            end,
            detail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn p(x: f64, y: f64) -> Vector2 {
        Vector2::new(x, y).unwrap()
    }

    fn seg(a: (f64, f64), b: (f64, f64)) -> Segment2D {
        Segment2D::new(p(a.0, a.1), p(b.0, b.1), 1e-3).unwrap()
    }

    #[test]
    fn test_normal_points_right() {
        let s = seg((0.0, 0.0), (2.0, 0.0));
        assert_relative_eq!(s.normal().x(), 0.0);
        assert_relative_eq!(s.normal().y(), -1.0);
        assert_relative_eq!(s.length(), 2.0);
    }

    #[test]
    fn test_zero_length_rejected() {
        assert!(Segment2D::new(p(1.0, 1.0), p(1.0, 1.0), 0.0).is_none());
    }

    #[test]
    fn test_aabb_is_padded_and_refreshed() {
        let mut s = seg((0.0, 0.0), (1.0, 1.0));
        assert_relative_eq!(s.bounds().min[0], -1e-3);
        s.set_end(p(3.0, 1.0));
        assert_relative_eq!(s.bounds().max[0], 3.0 + 1e-3);
        assert_relative_eq!(s.normal().y(), -3.0 / 10f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_link_keeps_both_sides() {
        let mut arena = SegmentArena::new();
        let a = arena.push(seg((0.0, 0.0), (1.0, 0.0)));
        let b = arena.push(seg((1.0, 0.0), (1.0, 1.0)));
        let c = arena.push(seg((1.0, 0.0), (2.0, 0.0)));
        arena.link(a, b);
        assert_eq!(arena.get(a).unwrap().next(), Some(b));
        assert_eq!(arena.get(b).unwrap().prev(), Some(a));

        // Relinking a to c must detach b
        arena.link(a, c);
        assert_eq!(arena.get(b).unwrap().prev(), None);
        assert_eq!(arena.get(c).unwrap().prev(), Some(a));
        assert!(arena.check_links().is_ok());
    }

    #[test]
    fn test_check_links_reports_asymmetry() {
        let mut arena = SegmentArena::new();
        let a = arena.push(seg((0.0, 0.0), (1.0, 0.0)));
        let b = arena.push(seg((1.0, 0.0), (1.0, 1.0)));
        arena.get_mut(a).next = Some(b);
        let err = arena.check_links().unwrap_err();
        assert!(matches!(err, SlicerError::LinkInvariant { index: 0, .. }));
    }
}
