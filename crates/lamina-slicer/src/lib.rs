#![warn(missing_docs)]

//! Mesh slicing kernel.
//!
//! This crate intersects a triangle mesh with horizontal planes and
//! reconstructs the resulting unordered segments into closed, oriented
//! polygons: one [`Slice`] per requested altitude.
//!
//! # Example
//!
//! ```ignore
//! use lamina_slicer::{slice_mesh, IndexedMesh, Planes, SliceSettings, NoopObserver};
//!
//! let mesh: IndexedMesh = // ... load vertices/indices
//! let triangles = mesh.triangles()?;
//! let altitudes = Planes::Uniform { start: 0.5, pitch: 1.0, count: 10 }.altitudes(None)?;
//! let run = slice_mesh(&triangles, &altitudes, &SliceSettings::default(), &NoopObserver)?;
//!
//! for slice in &run.slices {
//!     println!("z={} polygons={}", slice.z, slice.shape.polygons().len());
//! }
//! ```

pub mod aabb;
pub mod error;
pub mod intersect;
pub mod mesh;
pub mod planes;
pub mod polygon;
pub mod progress;
pub mod reconstruct;
pub mod segment;
pub mod shape;
pub mod slice;
pub mod spatial;

pub use aabb::Aabb2;
pub use error::{Result, SlicerError};
pub use intersect::intersect_triangle;
pub use mesh::{mesh_bounds, IndexedMesh, Triangle};
pub use planes::{generate_layer_heights, Planes};
pub use polygon::Polygon;
pub use progress::{NoopObserver, ProgressCounter, SliceObserver, Stage, TracingObserver};
pub use reconstruct::ReconstructionReport;
pub use segment::{Segment2D, SegmentArena};
pub use shape::Shape2D;
pub use slice::{slice_mesh, Slice, SliceRun, SliceStatus};
pub use spatial::{AabbTree, Bounded};

pub use lamina_math::{Tolerance, Vector2, Vector3};

use serde::{Deserialize, Serialize};

/// Tolerances and tuning knobs for slicing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SliceSettings {
    /// L1 distance below which two endpoints are the same point.
    pub accuracy_epsilon: f64,
    /// Squared distance ceiling for endpoint matches (model units squared).
    pub max_match_distance_sq: f64,
    /// Consecutive segments whose normals' dot product exceeds this are
    /// merged. Values above 1.0 disable merging.
    pub collinear_cos_threshold: f64,
    /// Padding added to every segment AABB.
    pub aabb_margin: f64,
    /// Triangles per parallel intersection batch.
    pub triangle_batch_size: usize,
    /// Worker threads. `None` uses the global rayon pool.
    pub threads: Option<usize>,
    /// Progress is reported every this many triangles.
    pub progress_interval: u64,
}

impl Default for SliceSettings {
    fn default() -> Self {
        Self {
            accuracy_epsilon: Tolerance::DEFAULT.epsilon,
            max_match_distance_sq: 0.01,
            collinear_cos_threshold: 0.9999,
            aabb_margin: 1e-4,
            triangle_batch_size: 4096,
            threads: None,
            progress_interval: 1024,
        }
    }
}

impl SliceSettings {
    /// Validate settings.
    pub fn validate(&self) -> Result<()> {
        if !(self.accuracy_epsilon.is_finite() && self.accuracy_epsilon > 0.0) {
            return Err(SlicerError::InvalidSettings(
                "accuracy_epsilon must be finite and positive".into(),
            ));
        }
        if !(self.max_match_distance_sq.is_finite() && self.max_match_distance_sq > 0.0) {
            return Err(SlicerError::InvalidSettings(
                "max_match_distance_sq must be finite and positive".into(),
            ));
        }
        if self.collinear_cos_threshold.is_nan() || self.collinear_cos_threshold < 0.0 {
            return Err(SlicerError::InvalidSettings(
                "collinear_cos_threshold must be at least 0".into(),
            ));
        }
        if !(self.aabb_margin.is_finite() && self.aabb_margin >= 0.0) {
            return Err(SlicerError::InvalidSettings(
                "aabb_margin must be finite and non-negative".into(),
            ));
        }
        if self.triangle_batch_size == 0 {
            return Err(SlicerError::InvalidSettings(
                "triangle_batch_size must be positive".into(),
            ));
        }
        if self.threads == Some(0) {
            return Err(SlicerError::InvalidSettings(
                "threads must be positive when set".into(),
            ));
        }
        Ok(())
    }

    /// The point-equality tolerance.
    pub fn tolerance(&self) -> Result<Tolerance> {
        Ok(Tolerance::new(self.accuracy_epsilon)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_valid() {
        assert!(SliceSettings::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_settings() {
        let settings = SliceSettings {
            accuracy_epsilon: -0.1,
            ..Default::default()
        };
        assert!(settings.validate().is_err());

        let settings = SliceSettings {
            triangle_batch_size: 0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());

        let settings = SliceSettings {
            threads: Some(0),
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_settings_partial_json() {
        let settings: SliceSettings =
            serde_json::from_str(r#"{"accuracy_epsilon": 0.001}"#).unwrap();
        assert!((settings.accuracy_epsilon - 0.001).abs() < 1e-15);
        assert_eq!(settings.triangle_batch_size, 4096);
    }
}
