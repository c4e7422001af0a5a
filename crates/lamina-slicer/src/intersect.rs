//! Triangle / horizontal plane intersection.

use lamina_math::{Tolerance, Vector2};

use crate::mesh::Triangle;

/// Intersect a triangle with the plane at altitude `z`.
///
/// Vertices are classified half-open: below when `v.z < z`, above
/// otherwise, so a vertex lying in the plane counts as above. Only edges
/// joining a below vertex to an above one are interpolated, and crossing
/// points that `tol` considers equal are merged. Exactly two distinct
/// points give a directed segment, oriented so that the triangle's outward
/// side is on its right.
///
/// An edge lying in the plane is therefore produced by the triangle under
/// it and never by the one resting on it, so a plane through a ring of
/// vertices still sees every outline edge once. A vertex touch, an in-plane
/// or degenerate triangle, or a miss gives `None`.
pub fn intersect_triangle(tri: &Triangle, z: f64, tol: &Tolerance) -> Option<(Vector2, Vector2)> {
    if !(tri.z_min() < z && z <= tri.z_max()) {
        return None;
    }

    let mut points: Vec<Vector2> = Vec::with_capacity(3);
    for (a, b) in tri.edges() {
        if (a.z() < z) == (b.z() < z) {
            continue;
        }
        let t = (z - a.z()) / (b.z() - a.z());
        let p = a.xy().lerp(&b.xy(), t);
        if !points.iter().any(|q| tol.points_equal(q, &p)) {
            points.push(p);
        }
    }

    let &[p, q] = points.as_slice() else {
        return None;
    };

    // Material lies opposite the face normal; put it on the left
    let n = tri.normal();
    let along = Vector2::new(-n.y(), n.x()).ok()?;
    if (q - p).dot(&along) < 0.0 {
        Some((q, p))
    } else {
        Some((p, q))
    }
}
