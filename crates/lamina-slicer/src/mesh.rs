//! Triangle input for slicing.

use lamina_math::Vector3;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SlicerError};

/// A mesh triangle with counter-clockwise winding seen from outside.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Triangle {
    /// The three corners, in winding order.
    pub vertices: [Vector3; 3],
}

impl Triangle {
    /// Create a triangle from three corners.
    pub fn new(a: Vector3, b: Vector3, c: Vector3) -> Self {
        Self {
            vertices: [a, b, c],
        }
    }

    /// Lowest corner altitude.
    pub fn z_min(&self) -> f64 {
        let [a, b, c] = &self.vertices;
        a.z().min(b.z()).min(c.z())
    }

    /// Highest corner altitude.
    pub fn z_max(&self) -> f64 {
        let [a, b, c] = &self.vertices;
        a.z().max(b.z()).max(c.z())
    }

    /// Unnormalized face normal `(b - a) x (c - a)`.
    pub fn normal(&self) -> Vector3 {
        let [a, b, c] = self.vertices;
        (b - a).cross(&(c - a))
    }

    /// The three edges in winding order.
    pub fn edges(&self) -> [(Vector3, Vector3); 3] {
        let [a, b, c] = self.vertices;
        [(a, b), (b, c), (c, a)]
    }
}

/// An indexed triangle mesh: flat `f32` vertex coordinates and `u32`
/// triangle indices, three per triangle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexedMesh {
    /// Vertex positions `[x0, y0, z0, x1, y1, z1, ...]`.
    pub vertices: Vec<f32>,
    /// Triangle corner indices `[i0, i1, i2, ...]`.
    pub indices: Vec<u32>,
}

impl IndexedMesh {
    /// Number of vertices.
    pub fn num_vertices(&self) -> usize {
        self.vertices.len() / 3
    }

    /// Number of triangles described by the index buffer.
    pub fn num_triangles(&self) -> usize {
        self.indices.len() / 3
    }

    /// Resolve indices into triangles.
    ///
    /// Buffers whose length is not a multiple of three and indices past
    /// the vertex array are errors. Triangles touching a NaN coordinate are
    /// skipped.
    pub fn triangles(&self) -> Result<Vec<Triangle>> {
        if self.vertices.len() % 3 != 0 {
            return Err(SlicerError::InvalidMesh(format!(
                "vertex buffer length {} is not a multiple of 3",
                self.vertices.len()
            )));
        }
        if self.indices.len() % 3 != 0 {
            return Err(SlicerError::InvalidMesh(format!(
                "index buffer length {} is not a multiple of 3",
                self.indices.len()
            )));
        }

        let n = self.num_vertices();
        let mut triangles = Vec::with_capacity(self.num_triangles());
        let mut skipped = 0usize;

        for (t, idx) in self.indices.chunks_exact(3).enumerate() {
            if let Some(&bad) = idx.iter().find(|&&i| i as usize >= n) {
                return Err(SlicerError::InvalidMesh(format!(
                    "triangle {t} references vertex {bad} of {n}"
                )));
            }
            match (self.vertex(idx[0]), self.vertex(idx[1]), self.vertex(idx[2])) {
                (Ok(a), Ok(b), Ok(c)) => triangles.push(Triangle::new(a, b, c)),
                _ => skipped += 1,
            }
        }

        if skipped > 0 {
            debug!(skipped, "skipped triangles with NaN coordinates");
        }
        Ok(triangles)
    }

    fn vertex(&self, i: u32) -> std::result::Result<Vector3, lamina_math::MathError> {
        let i = i as usize * 3;
        Vector3::new(
            self.vertices[i] as f64,
            self.vertices[i + 1] as f64,
            self.vertices[i + 2] as f64,
        )
    }
}

/// Bounding box of a triangle set as `(min, max)`, or `None` if empty.
pub fn mesh_bounds(triangles: &[Triangle]) -> Option<([f64; 3], [f64; 3])> {
    if triangles.is_empty() {
        return None;
    }

    let mut min = [f64::MAX; 3];
    let mut max = [f64::MIN; 3];
    for v in triangles.iter().flat_map(|t| t.vertices.iter()) {
        for (axis, c) in [v.x(), v.y(), v.z()].into_iter().enumerate() {
            min[axis] = min[axis].min(c);
            max[axis] = max[axis].max(c);
        }
    }
    Some((min, max))
}
