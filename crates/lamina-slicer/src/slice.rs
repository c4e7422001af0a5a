//! Mesh slicing: intersect triangles with horizontal planes and rebuild
//! each plane's outline.
//!
//! Two parallel stages. Triangles are split into batches and intersected
//! against every plane their z-range spans; each batch returns its own
//! buffer and buffers are merged in batch order, so a slice's raw segments
//! always come out in triangle order regardless of scheduling. Slices are
//! then reconstructed independently.

use std::time::Instant;

use lamina_math::Vector2;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn, Level};

use crate::error::{Result, SlicerError};
use crate::intersect::intersect_triangle;
use crate::mesh::Triangle;
use crate::progress::{ProgressCounter, SliceObserver, Stage};
use crate::reconstruct::ReconstructionReport;
use crate::shape::Shape2D;
use crate::SliceSettings;

/// How reconstruction of a slice went.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SliceStatus {
    /// Every segment closed into a polygon.
    Complete,
    /// The plane missed the mesh.
    Empty,
    /// Polygons were produced but some chains were dropped.
    Degraded,
    /// Segments were present but none closed into a polygon.
    NoManifold,
    /// Reconstruction stopped on a broken link invariant.
    InvariantViolation,
}

/// The outline of the mesh at one altitude.
#[derive(Debug, Clone, Serialize)]
pub struct Slice {
    /// Plane altitude.
    pub z: f64,
    /// Position in the requested altitude list.
    pub index: usize,
    /// Polygons and raw segments.
    pub shape: Shape2D,
    /// Outcome of reconstruction.
    pub status: SliceStatus,
    /// Human-readable problems found while reconstructing.
    pub warnings: Vec<String>,
}

impl Slice {
    fn reconstruct(index: usize, z: f64, mut shape: Shape2D, settings: &SliceSettings) -> Self {
        let had_segments = shape.raw_len() > 0;
        let mut warnings = Vec::new();

        let status = match shape.optimize(settings, z).cloned() {
            Err(e) => {
                warn!(z, index, error = %e, "slice reconstruction aborted");
                warnings.push(e.to_string());
                SliceStatus::InvariantViolation
            }
            Ok(report) => classify(&report, had_segments, &mut warnings),
        };

        Self {
            z,
            index,
            shape,
            status,
            warnings,
        }
    }

    /// True if the slice lost its outline (no polygon from present
    /// segments, or an aborted reconstruction).
    pub fn is_flagged(&self) -> bool {
        matches!(
            self.status,
            SliceStatus::NoManifold | SliceStatus::InvariantViolation
        )
    }
}

fn classify(
    report: &ReconstructionReport,
    had_segments: bool,
    warnings: &mut Vec<String>,
) -> SliceStatus {
    if report.non_manifold_chains > 0 {
        warnings.push(format!(
            "discarded {} non-manifold chain(s)",
            report.non_manifold_chains
        ));
    }
    if report.degenerate_cycles > 0 {
        warnings.push(format!(
            "discarded {} degenerate cycle(s)",
            report.degenerate_cycles
        ));
    }

    if report.polygons == 0 {
        if had_segments {
            warnings.push(format!(
                "no closed polygon from {} segment(s)",
                report.input_segments
            ));
            SliceStatus::NoManifold
        } else {
            SliceStatus::Empty
        }
    } else if report.discarded_segments > 0 {
        SliceStatus::Degraded
    } else {
        SliceStatus::Complete
    }
}

/// Result of slicing a mesh.
#[derive(Debug, Clone, Serialize)]
pub struct SliceRun {
    /// One slice per requested altitude, in request order.
    pub slices: Vec<Slice>,
    /// Triangles processed.
    pub triangles: usize,
    /// Triangles spanning at least one plane that produced no segment.
    pub skipped_triangles: usize,
    /// Raw segments produced over all slices.
    pub segments: usize,
    /// Slices with [`Slice::is_flagged`] set.
    pub flagged: usize,
}

impl SliceRun {
    /// Iterate over flagged slices.
    pub fn flagged_slices(&self) -> impl Iterator<Item = &Slice> {
        self.slices.iter().filter(|s| s.is_flagged())
    }
}

/// Segments a batch of triangles produced, tagged with their slice.
#[derive(Default)]
struct BatchHits {
    hits: Vec<(u32, Vector2, Vector2)>,
    skipped: usize,
}

/// Slice `triangles` at every altitude in `altitudes`.
///
/// Returns one [`Slice`] per altitude in the given order, including
/// duplicates. A slice whose reconstruction fails is flagged rather than
/// failing the run; only bad settings, an empty mesh and cancellation
/// return an error.
pub fn slice_mesh(
    triangles: &[Triangle],
    altitudes: &[f64],
    settings: &SliceSettings,
    observer: &dyn SliceObserver,
) -> Result<SliceRun> {
    settings.validate()?;
    if triangles.is_empty() {
        return Err(SlicerError::EmptyMesh);
    }
    if let Some(bad) = altitudes.iter().find(|z| !z.is_finite()) {
        return Err(SlicerError::InvalidSettings(format!(
            "plane altitude {bad} is not finite"
        )));
    }

    match settings.threads {
        Some(n) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .map_err(|e| SlicerError::ThreadPool(e.to_string()))?;
            pool.install(|| run(triangles, altitudes, settings, observer))
        }
        None => run(triangles, altitudes, settings, observer),
    }
}

fn run(
    triangles: &[Triangle],
    altitudes: &[f64],
    settings: &SliceSettings,
    observer: &dyn SliceObserver,
) -> Result<SliceRun> {
    let started = Instant::now();
    info!(
        triangles = triangles.len(),
        planes = altitudes.len(),
        threads = rayon::current_num_threads(),
        "slicing mesh"
    );

    // Sorted view of the altitudes so each triangle finds its planes by
    // binary search; `order[k]` maps back to the requested slice.
    let mut order: Vec<u32> = (0..altitudes.len() as u32).collect();
    order.sort_by(|&a, &b| altitudes[a as usize].total_cmp(&altitudes[b as usize]));
    let sorted: Vec<f64> = order.iter().map(|&i| altitudes[i as usize]).collect();

    let counter = ProgressCounter::new(
        Stage::Intersect,
        triangles.len() as u64,
        settings.progress_interval,
    );
    let tol = settings.tolerance()?;

    let batches = triangles
        .par_chunks(settings.triangle_batch_size)
        .map(|chunk| {
            if observer.is_cancelled() {
                return Err(SlicerError::Cancelled);
            }
            let mut out = BatchHits::default();
            for tri in chunk {
                // Planes with z_min < z <= z_max, matching the half-open
                // vertex classification of the intersection
                let lo = sorted.partition_point(|&z| z <= tri.z_min());
                let hi = sorted.partition_point(|&z| z <= tri.z_max());
                if lo >= hi {
                    continue;
                }
                let before = out.hits.len();
                for k in lo..hi {
                    if let Some((a, b)) = intersect_triangle(tri, sorted[k], &tol) {
                        out.hits.push((order[k], a, b));
                    }
                }
                if out.hits.len() == before {
                    out.skipped += 1;
                }
            }
            counter.add(chunk.len() as u64, observer);
            Ok(out)
        })
        .collect::<Result<Vec<_>>>()?;

    let mut shapes: Vec<Shape2D> = (0..altitudes.len())
        .map(|_| Shape2D::with_settings(settings))
        .collect();
    let mut skipped_triangles = 0;
    let mut segments = 0;
    for batch in batches {
        skipped_triangles += batch.skipped;
        for (slice, a, b) in batch.hits {
            if shapes[slice as usize].add_model_segment(a, b) {
                segments += 1;
            }
        }
    }

    let counter = ProgressCounter::new(Stage::Reconstruct, altitudes.len() as u64, 1);
    let slices = shapes
        .into_par_iter()
        .enumerate()
        .map(|(index, shape)| {
            if observer.is_cancelled() {
                return Err(SlicerError::Cancelled);
            }
            let slice = Slice::reconstruct(index, altitudes[index], shape, settings);
            counter.add(1, observer);
            Ok(slice)
        })
        .collect::<Result<Vec<_>>>()?;

    let mut flagged = 0;
    for slice in slices.iter().filter(|s| s.is_flagged()) {
        flagged += 1;
        observer.message(
            Level::WARN,
            &format!(
                "slice {} at z={}: {}",
                slice.index,
                slice.z,
                slice.warnings.join("; ")
            ),
        );
    }

    info!(
        slices = slices.len(),
        segments,
        skipped_triangles,
        flagged,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "slicing finished"
    );

    Ok(SliceRun {
        slices,
        triangles: triangles.len(),
        skipped_triangles,
        segments,
        flagged,
    })
}
