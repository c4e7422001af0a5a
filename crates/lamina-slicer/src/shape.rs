//! The outline of one slice: raw segments in, polygons out.

use lamina_math::Vector2;
use serde::Serialize;

use crate::aabb::Aabb2;
use crate::error::Result;
use crate::polygon::Polygon;
use crate::reconstruct::{reconstruct, ReconstructionReport};
use crate::segment::{Segment2D, SegmentArena};
use crate::spatial::AabbTree;
use crate::SliceSettings;

/// A set of polygons (outer boundary plus holes) for one plane.
///
/// Created empty, filled with [`Shape2D::add_model_segment`], then turned
/// into polygons by [`Shape2D::optimize`]. After that the shape is only
/// read.
#[derive(Debug, Clone, Serialize)]
pub struct Shape2D {
    #[serde(rename = "raw_segments")]
    raw: SegmentArena,
    #[serde(skip)]
    index: AabbTree<u32>,
    polygons: Vec<Polygon>,
    #[serde(skip)]
    outer: Option<usize>,
    #[serde(skip)]
    margin: f64,
    rejected: usize,
    report: Option<ReconstructionReport>,
}

impl Shape2D {
    /// Empty shape whose segment AABBs are padded by `margin`.
    pub fn new(margin: f64) -> Self {
        Self {
            raw: SegmentArena::new(),
            index: AabbTree::new(),
            polygons: Vec::new(),
            outer: None,
            margin,
            rejected: 0,
            report: None,
        }
    }

    /// Empty shape padded per `settings`.
    pub fn with_settings(settings: &SliceSettings) -> Self {
        Self::new(settings.aabb_margin)
    }

    /// Build a shape from a list of already-oriented segments.
    pub fn from_segments<'a>(
        segments: impl IntoIterator<Item = &'a Segment2D>,
        margin: f64,
    ) -> Self {
        let mut shape = Self::new(margin);
        for s in segments {
            shape.add_model_segment(s.start(), s.end());
        }
        shape
    }

    /// Add one unlinked segment. Zero-length segments are counted and
    /// refused; returns whether the segment was kept.
    pub fn add_model_segment(&mut self, start: Vector2, end: Vector2) -> bool {
        match Segment2D::new(start, end, self.margin) {
            Some(seg) => {
                let i = self.raw.push(seg);
                if let Some(s) = self.raw.get(i) {
                    self.index.insert(i, s);
                }
                true
            }
            None => {
                self.rejected += 1;
                false
            }
        }
    }

    /// Reconstruct closed polygons from the raw segments.
    ///
    /// The largest polygon (by perimeter, then bounding area) is placed
    /// first and cached as the outer boundary. Running this again redoes
    /// the reconstruction from the current raw segments.
    pub fn optimize(&mut self, settings: &SliceSettings, z: f64) -> Result<&ReconstructionReport> {
        self.polygons.clear();
        self.outer = None;
        self.report = None;

        let (mut polygons, mut report) = reconstruct(&mut self.raw, &mut self.index, settings, z)?;
        report.input_segments += self.rejected;
        report.rejected_segments = self.rejected;

        polygons.sort_by(|a, b| {
            b.perimeter()
                .total_cmp(&a.perimeter())
                .then(b.bounds().area().total_cmp(&a.bounds().area()))
                .then_with(|| match (a.segments().first(), b.segments().first()) {
                    (Some(sa), Some(sb)) => sa.start().lex_cmp(&sb.start()),
                    _ => std::cmp::Ordering::Equal,
                })
        });
        self.outer = if polygons.is_empty() { None } else { Some(0) };
        self.polygons = polygons;

        Ok(&*self.report.insert(report))
    }

    /// Raw segments in insertion order. After [`Shape2D::optimize`] these
    /// carry the snapped endpoints and links.
    pub fn raw_segments(&self) -> &[Segment2D] {
        self.raw.as_slice()
    }

    /// Number of raw segments kept.
    pub fn raw_len(&self) -> usize {
        self.raw.len()
    }

    /// Zero-length segments refused so far.
    pub fn rejected_segments(&self) -> usize {
        self.rejected
    }

    /// Polygons, outer boundary first.
    pub fn polygons(&self) -> &[Polygon] {
        &self.polygons
    }

    /// The outer boundary, if any polygon was produced.
    pub fn outer(&self) -> Option<&Polygon> {
        self.outer.and_then(|i| self.polygons.get(i))
    }

    /// Every polygon except the outer boundary.
    pub fn holes(&self) -> impl Iterator<Item = &Polygon> {
        let outer = self.outer;
        self.polygons
            .iter()
            .enumerate()
            .filter(move |(i, _)| Some(*i) != outer)
            .map(|(_, p)| p)
    }

    /// Outer area minus the area of all holes.
    pub fn area(&self) -> f64 {
        let outer = self.outer().map_or(0.0, Polygon::area);
        outer - self.holes().map(Polygon::area).sum::<f64>()
    }

    /// Union of all polygon bounds (raw segment bounds before optimizing).
    pub fn bounds(&self) -> Aabb2 {
        if self.polygons.is_empty() {
            return self.index.bounds().unwrap_or_default();
        }
        self.polygons
            .iter()
            .fold(Aabb2::empty(), |acc, p| acc.union(&p.bounds()))
    }

    /// Sum of all polygon perimeters.
    pub fn total_perimeter(&self) -> f64 {
        self.polygons.iter().map(Polygon::perimeter).sum()
    }

    /// Report of the last reconstruction.
    pub fn report(&self) -> Option<&ReconstructionReport> {
        self.report.as_ref()
    }

    /// True once [`Shape2D::optimize`] has succeeded.
    pub fn is_optimized(&self) -> bool {
        self.report.is_some()
    }

    /// Segments of all polygons, in polygon order.
    pub fn polygon_segments(&self) -> impl Iterator<Item = &Segment2D> {
        self.polygons.iter().flat_map(|p| p.segments().iter())
    }
}

impl Default for Shape2D {
    fn default() -> Self {
        Self::new(SliceSettings::default().aabb_margin)
    }
}
