//! Error types for the slicer.

use lamina_math::{MathError, Vector2};
use thiserror::Error;

/// Errors that can occur during slicing.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SlicerError {
    /// Mesh has no triangles.
    #[error("mesh is empty")]
    EmptyMesh,

    /// Mesh buffers are malformed (bad index, truncated vertex array).
    #[error("invalid mesh: {0}")]
    InvalidMesh(String),

    /// Invalid slice settings or plane configuration.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// Segment links became inconsistent during reconstruction.
    ///
    /// This is a bug in the reconstruction pass, not bad input.
    #[error("link invariant broken at segment {index} {start} -> {end}: {detail}")]
    LinkInvariant {
        /// Arena index of the offending segment.
        index: u32,
        /// Start point of the offending segment.
        start: Vector2,
        /// End point of the offending segment.
        end: Vector2,
        /// What was inconsistent.
        detail: String,
    },

    /// The observer requested cancellation.
    #[error("slicing cancelled")]
    Cancelled,

    /// The worker pool could not be created.
    #[error("failed to build thread pool: {0}")]
    ThreadPool(String),

    /// A coordinate failed validation.
    #[error(transparent)]
    Math(#[from] MathError),
}

/// Result type for slicer operations.
pub type Result<T> = std::result::Result<T, SlicerError>;
