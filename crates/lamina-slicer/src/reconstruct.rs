//! Polygon reconstruction from unordered segments.
//!
//! Three passes over a shape's segment arena:
//!
//! 1. **Stitching** links each free segment end to the nearest compatible
//!    endpoint found through the spatial index, snapping the residual gap.
//! 2. **Cycle extraction** walks the links. Chains that return to their
//!    start become polygons; open chains are non-manifold and discarded.
//! 3. **Collapse** merges near-colinear neighbours in each cycle.
//!
//! Segment accounting is exact: every input segment ends up in a polygon,
//! merged into a neighbour, or discarded, and the report says which.

use lamina_math::{Tolerance, Vector2};
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::aabb::Aabb2;
use crate::error::Result;
use crate::polygon::Polygon;
use crate::segment::{Segment2D, SegmentArena};
use crate::spatial::AabbTree;
use crate::SliceSettings;

/// Outcome and segment accounting of one reconstruction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconstructionReport {
    /// Segments offered to the shape, including rejected ones.
    pub input_segments: usize,
    /// Zero-length segments refused on insertion.
    pub rejected_segments: usize,
    /// Segments making up the produced polygons.
    pub polygon_segments: usize,
    /// Segments absorbed into a neighbour by colinear collapse.
    pub collapsed_segments: usize,
    /// Segments dropped with non-manifold or degenerate chains.
    pub discarded_segments: usize,
    /// Number of open chains found.
    pub non_manifold_chains: usize,
    /// Closed cycles too short to bound an area (fewer than 3 segments).
    pub degenerate_cycles: usize,
    /// Number of polygons produced.
    pub polygons: usize,
    /// Number of endpoint links made by stitching.
    pub links: usize,
}

impl ReconstructionReport {
    /// True if every chain closed.
    pub fn is_manifold(&self) -> bool {
        self.non_manifold_chains == 0
    }

    /// True if every input segment is accounted for.
    pub fn is_conserved(&self) -> bool {
        self.input_segments
            == self.rejected_segments
                + self.polygon_segments
                + self.collapsed_segments
                + self.discarded_segments
    }
}

/// Which free end of a segment is being matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum End {
    Start,
    End,
}

/// Link every free segment end to its nearest compatible partner.
///
/// Returns the number of links made.
pub(crate) fn stitch(
    arena: &mut SegmentArena,
    index: &mut AabbTree<u32>,
    settings: &SliceSettings,
    tol: &Tolerance,
) -> usize {
    let mut links = 0;
    for i in 0..arena.len() as u32 {
        let seg = &arena.as_slice()[i as usize];

        if seg.prev().is_none() {
            let target = seg.start();
            if let Some(c) = best_candidate(arena, index, i, &target, End::Start, settings, tol) {
                let snapped = arena.as_slice()[c as usize].end();
                arena.get_mut(i).set_start(snapped);
                reindex(arena, index, i);
                arena.link(c, i);
                links += 1;
            }
        }

        let seg = &arena.as_slice()[i as usize];
        if seg.next().is_none() {
            let target = seg.end();
            if let Some(c) = best_candidate(arena, index, i, &target, End::End, settings, tol) {
                let snapped = arena.as_slice()[c as usize].start();
                arena.get_mut(i).set_end(snapped);
                reindex(arena, index, i);
                arena.link(i, c);
                links += 1;
            }
        }
    }
    links
}

fn reindex(arena: &SegmentArena, index: &mut AabbTree<u32>, i: u32) {
    if let Some(s) = arena.get(i) {
        index.insert(i, s);
    }
}

/// Nearest candidate for the given free end of segment `i`.
///
/// For a free start we want a segment whose end is free and coincides with
/// it; for a free end, a segment whose start is free. Ties on squared
/// distance go to the lower arena index.
fn best_candidate(
    arena: &SegmentArena,
    index: &AabbTree<u32>,
    i: u32,
    target: &Vector2,
    end: End,
    settings: &SliceSettings,
    tol: &Tolerance,
) -> Option<u32> {
    let mut best: Option<(f64, u32)> = None;

    index.query_with(&Aabb2::around(target, tol.epsilon), |j| {
        if j == i {
            return;
        }
        let Some(c) = arena.get(j) else {
            return;
        };
        let point = match end {
            End::Start if c.next().is_none() => c.end(),
            End::End if c.prev().is_none() => c.start(),
            _ => return,
        };
        if !tol.points_equal(&point, target) {
            return;
        }
        let d2 = point.distance_squared(target);
        if d2 >= settings.max_match_distance_sq {
            trace!(segment = i, candidate = j, d2, "candidate beyond match ceiling");
            return;
        }
        let better = match best {
            None => true,
            Some((bd, bj)) => d2 < bd || (d2 == bd && j < bj),
        };
        if better {
            best = Some((d2, j));
        }
    });

    best.map(|(_, j)| j)
}

/// Cycles and discards found by walking the links.
#[derive(Debug, Default)]
pub(crate) struct Extraction {
    pub cycles: Vec<Vec<u32>>,
    pub discarded_segments: usize,
    pub non_manifold_chains: usize,
    pub degenerate_cycles: usize,
}

/// Walk `next` links from every unvisited segment.
///
/// A walk that returns to its start is a manifold cycle. A walk that runs
/// off an unlinked end (or into an already visited segment) is an open
/// chain; it is completed backwards and discarded as a whole.
pub(crate) fn extract_cycles(arena: &SegmentArena, z: f64) -> Extraction {
    let n = arena.len();
    let segs = arena.as_slice();
    let mut visited = vec![false; n];
    let mut out = Extraction::default();

    for first in 0..n as u32 {
        if visited[first as usize] {
            continue;
        }
        visited[first as usize] = true;
        let mut chain = vec![first];
        let mut cur = first;

        let closed = loop {
            match segs[cur as usize].next() {
                Some(nx) if nx == first => break true,
                Some(nx) if !visited[nx as usize] => {
                    visited[nx as usize] = true;
                    chain.push(nx);
                    cur = nx;
                }
                _ => break false,
            }
        };

        if closed {
            if chain.len() < 3 {
                debug!(z, len = chain.len(), "dropping degenerate cycle");
                out.degenerate_cycles += 1;
                out.discarded_segments += chain.len();
            } else {
                out.cycles.push(chain);
            }
            continue;
        }

        let mut cur = first;
        while let Some(pv) = segs[cur as usize].prev() {
            if visited[pv as usize] {
                break;
            }
            visited[pv as usize] = true;
            chain.push(pv);
            cur = pv;
        }

        let head = segs[cur as usize].start();
        warn!(
            z,
            segments = chain.len(),
            near = %head,
            "discarding non-manifold chain"
        );
        out.non_manifold_chains += 1;
        out.discarded_segments += chain.len();
    }
    out
}

/// Rotate so the segment with the lexicographically smallest start comes
/// first. Makes polygon output independent of input order.
fn canonical_rotation(segments: &mut [Segment2D]) {
    if let Some(pos) = segments
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.start().lex_cmp(&b.start()))
        .map(|(i, _)| i)
    {
        segments.rotate_left(pos);
    }
}

/// Merge consecutive segments whose normals are nearly parallel, until no
/// such pair remains. Never drops below three segments.
///
/// Returns the number of segments absorbed.
pub(crate) fn collapse_colinear(
    segments: &mut Vec<Segment2D>,
    settings: &SliceSettings,
    tol: &Tolerance,
) -> usize {
    let threshold = settings.collinear_cos_threshold;
    let mut merged = 0;
    let mut i = 0;
    let mut quiet = 0;

    while segments.len() > 3 && quiet < segments.len() {
        let j = (i + 1) % segments.len();
        let (a, b) = (&segments[i], &segments[j]);
        let mergeable = tol.is_zero(a.length())
            || tol.is_zero(b.length())
            || a.normal().dot(&b.normal()) > threshold;

        if mergeable {
            if let Some(m) = Segment2D::new(a.start(), b.end(), settings.aabb_margin) {
                segments[i] = m;
                segments.remove(j);
                if j < i {
                    i -= 1;
                }
                merged += 1;
                quiet = 0;
                continue;
            }
        }
        quiet += 1;
        i = (i + 1) % segments.len();
    }
    merged
}

/// Full reconstruction of one arena into polygons.
///
/// Links are reset first, so running this again on the same arena is
/// safe. A broken link invariant aborts with the offending segment.
pub(crate) fn reconstruct(
    arena: &mut SegmentArena,
    index: &mut AabbTree<u32>,
    settings: &SliceSettings,
    z: f64,
) -> Result<(Vec<Polygon>, ReconstructionReport)> {
    let tol = settings.tolerance()?;
    arena.clear_links();
    let links = stitch(arena, index, settings, &tol);
    arena.check_links()?;

    let extraction = extract_cycles(arena, z);

    let mut report = ReconstructionReport {
        input_segments: arena.len(),
        discarded_segments: extraction.discarded_segments,
        non_manifold_chains: extraction.non_manifold_chains,
        degenerate_cycles: extraction.degenerate_cycles,
        links,
        ..Default::default()
    };

    let mut polygons = Vec::with_capacity(extraction.cycles.len());
    for cycle in extraction.cycles {
        let mut segments: Vec<Segment2D> = cycle
            .iter()
            .filter_map(|&i| arena.get(i).cloned())
            .collect();
        if segments.len() != cycle.len() {
            let missing = cycle
                .iter()
                .copied()
                .find(|&i| arena.get(i).is_none())
                .unwrap_or(0);
            return Err(arena.invariant(missing, "cycle references missing segment".into()));
        }
        canonical_rotation(&mut segments);
        report.collapsed_segments += collapse_colinear(&mut segments, settings, &tol);
        canonical_rotation(&mut segments);

        report.polygon_segments += segments.len();
        if let Some(poly) = Polygon::from_cycle(segments) {
            polygons.push(poly);
        }
    }
    report.polygons = polygons.len();

    debug!(
        z,
        polygons = report.polygons,
        links = report.links,
        discarded = report.discarded_segments,
        collapsed = report.collapsed_segments,
        "reconstructed shape"
    );
    Ok((polygons, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn p(x: f64, y: f64) -> Vector2 {
        Vector2::new(x, y).unwrap()
    }

    fn arena_of(segs: &[((f64, f64), (f64, f64))], margin: f64) -> (SegmentArena, AabbTree<u32>) {
        let mut arena = SegmentArena::new();
        let mut index = AabbTree::new();
        for &(a, b) in segs {
            let s = Segment2D::new(p(a.0, a.1), p(b.0, b.1), margin).unwrap();
            let i = arena.push(s);
            index.insert(i, arena.get(i).unwrap());
        }
        (arena, index)
    }

    fn no_collapse() -> SliceSettings {
        SliceSettings {
            collinear_cos_threshold: 2.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_stitch_closes_shuffled_square() {
        let (mut arena, mut index) = arena_of(
            &[
                ((1.0, 1.0), (0.0, 1.0)),
                ((0.0, 0.0), (1.0, 0.0)),
                ((0.0, 1.0), (0.0, 0.0)),
                ((1.0, 0.0), (1.0, 1.0)),
            ],
            1e-4,
        );
        let (polys, report) = reconstruct(&mut arena, &mut index, &no_collapse(), 0.0).unwrap();
        assert_eq!(polys.len(), 1);
        assert!(report.is_manifold());
        assert!(report.is_conserved());
        assert_relative_eq!(polys[0].signed_area(), 1.0);
        // Canonical start is the lexicographically smallest vertex
        assert_eq!(polys[0].points()[0], p(0.0, 0.0));
    }

    #[test]
    fn test_snap_removes_micro_gap() {
        let (mut arena, mut index) = arena_of(
            &[
                ((0.0, 0.0), (1.0, 0.0)),
                ((1.0 + 4e-6, 0.0), (1.0, 1.0)),
                ((1.0, 1.0), (0.0, 0.0)),
            ],
            1e-4,
        );
        let (polys, _) = reconstruct(&mut arena, &mut index, &no_collapse(), 0.0).unwrap();
        assert_eq!(polys.len(), 1);
        assert!(polys[0].is_closed(1e-12));
        assert!(index.is_consistent());
    }

    #[test]
    fn test_nearest_candidate_wins() {
        // Two open ends near (1, 0): the closer one must be chosen
        let settings = SliceSettings {
            accuracy_epsilon: 0.1,
            max_match_distance_sq: 1.0,
            ..no_collapse()
        };
        let (mut arena, mut index) = arena_of(
            &[
                ((0.0, 0.0), (1.0, 0.0)),
                ((1.02, 0.0), (2.0, 1.0)),
                ((1.005, 0.0), (2.0, -1.0)),
            ],
            1e-3,
        );
        stitch(&mut arena, &mut index, &settings, &settings.tolerance().unwrap());
        assert_eq!(arena.get(0).unwrap().next(), Some(2));
        assert_eq!(arena.get(1).unwrap().prev(), None);
    }

    #[test]
    fn test_exact_tie_goes_to_lower_index() {
        let settings = SliceSettings {
            accuracy_epsilon: 0.1,
            max_match_distance_sq: 1.0,
            ..no_collapse()
        };
        let (mut arena, mut index) = arena_of(
            &[
                ((0.0, 0.0), (1.0, 0.0)),
                ((1.0, 0.0), (2.0, 1.0)),
                ((1.0, 0.0), (2.0, -1.0)),
            ],
            1e-3,
        );
        stitch(&mut arena, &mut index, &settings, &settings.tolerance().unwrap());
        assert_eq!(arena.get(0).unwrap().next(), Some(1));
        assert_eq!(arena.get(2).unwrap().prev(), None);
    }

    #[test]
    fn test_tolerance_boundary() {
        let settings = SliceSettings {
            accuracy_epsilon: 0.5,
            max_match_distance_sq: 1.0,
            ..no_collapse()
        };
        // Gap of exactly epsilon: rejected
        let (mut arena, mut index) = arena_of(
            &[((0.0, 0.0), (1.0, 0.0)), ((1.5, 0.0), (3.0, 3.0))],
            1e-3,
        );
        stitch(&mut arena, &mut index, &settings, &settings.tolerance().unwrap());
        assert_eq!(arena.get(0).unwrap().next(), None);

        // Just inside epsilon: matched
        let (mut arena, mut index) = arena_of(
            &[((0.0, 0.0), (1.0, 0.0)), ((1.375, 0.0), (3.0, 3.0))],
            1e-3,
        );
        stitch(&mut arena, &mut index, &settings, &settings.tolerance().unwrap());
        assert_eq!(arena.get(0).unwrap().next(), Some(1));
        assert_eq!(arena.get(0).unwrap().end(), p(1.375, 0.0));
    }

    #[test]
    fn test_match_ceiling_rejects_close_enough_by_epsilon() {
        let settings = SliceSettings {
            accuracy_epsilon: 0.5,
            max_match_distance_sq: 0.01,
            ..no_collapse()
        };
        let (mut arena, mut index) = arena_of(
            &[((0.0, 0.0), (1.0, 0.0)), ((1.25, 0.0), (3.0, 3.0))],
            1e-3,
        );
        stitch(&mut arena, &mut index, &settings, &settings.tolerance().unwrap());
        assert_eq!(arena.get(0).unwrap().next(), None);
    }

    #[test]
    fn test_open_chain_is_discarded_and_counted() {
        // Closed triangle plus a dangling two-segment path
        let (mut arena, mut index) = arena_of(
            &[
                ((0.0, 0.0), (1.0, 0.0)),
                ((5.0, 5.0), (6.0, 5.0)),
                ((1.0, 0.0), (0.0, 1.0)),
                ((6.0, 5.0), (6.0, 6.0)),
                ((0.0, 1.0), (0.0, 0.0)),
            ],
            1e-4,
        );
        let (polys, report) = reconstruct(&mut arena, &mut index, &no_collapse(), 1.0).unwrap();
        assert_eq!(polys.len(), 1);
        assert_eq!(report.non_manifold_chains, 1);
        assert_eq!(report.discarded_segments, 2);
        assert_eq!(report.polygon_segments, 3);
        assert!(!report.is_manifold());
        assert!(report.is_conserved());
    }

    #[test]
    fn test_collapse_merges_colinear_runs() {
        // Square with every side split in two
        let (mut arena, mut index) = arena_of(
            &[
                ((0.0, 0.0), (0.5, 0.0)),
                ((0.5, 0.0), (1.0, 0.0)),
                ((1.0, 0.0), (1.0, 0.5)),
                ((1.0, 0.5), (1.0, 1.0)),
                ((1.0, 1.0), (0.5, 1.0)),
                ((0.5, 1.0), (0.0, 1.0)),
                ((0.0, 1.0), (0.0, 0.5)),
                ((0.0, 0.5), (0.0, 0.0)),
            ],
            1e-4,
        );
        let (polys, report) =
            reconstruct(&mut arena, &mut index, &SliceSettings::default(), 0.0).unwrap();
        assert_eq!(polys.len(), 1);
        assert_eq!(polys[0].len(), 4);
        assert_eq!(report.collapsed_segments, 4);
        assert!(report.is_conserved());
        assert_relative_eq!(polys[0].area(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_collapse_keeps_three_segments() {
        let settings = SliceSettings {
            collinear_cos_threshold: -1.0,
            ..Default::default()
        };
        let mut segs: Vec<Segment2D> = [
            ((0.0, 0.0), (1.0, 0.0)),
            ((1.0, 0.0), (1.0, 1.0)),
            ((1.0, 1.0), (0.5, 1.0)),
            ((0.5, 1.0), (0.0, 0.0)),
        ]
        .iter()
        .map(|&(a, b)| Segment2D::new(p(a.0, a.1), p(b.0, b.1), 0.0).unwrap())
        .collect();
        let merged = collapse_colinear(&mut segs, &settings, &settings.tolerance().unwrap());
        assert_eq!(merged, 1);
        assert_eq!(segs.len(), 3);
    }

    #[test]
    fn test_two_segment_cycle_is_degenerate() {
        let (mut arena, mut index) = arena_of(
            &[((0.0, 0.0), (1.0, 0.0)), ((1.0, 0.0), (0.0, 0.0))],
            1e-4,
        );
        let (polys, report) = reconstruct(&mut arena, &mut index, &no_collapse(), 0.0).unwrap();
        assert!(polys.is_empty());
        assert_eq!(report.degenerate_cycles, 1);
        assert!(report.is_conserved());
    }
}
